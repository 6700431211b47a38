//! Schema 初始化子模块
//!
//! ## 职责
//! - 创建 `images` 表（三元组 + 创建时间）
//! - 通过 `PRAGMA user_version` 记录 Schema 版本
//!
//! ## 输入/输出
//! - 输入：`&Connection`
//! - 输出：`Result<(), AppError>`
//!
//! ## 错误语义
//! - DDL 失败统一映射为 `AppError::Storage`

use rusqlite::Connection;

use crate::error::AppError;

pub(super) const SCHEMA_VERSION: i64 = 1;

fn get_user_version(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| AppError::Storage(format!("读取数据库版本失败: {}", e)))
}

fn set_user_version(conn: &Connection, version: i64) -> Result<(), AppError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| AppError::Storage(format!("写入数据库版本失败: {}", e)))
}

fn create_base_tables(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image BLOB NOT NULL,
            histogram BLOB NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        );"
    ).map_err(|e| AppError::Storage(format!("创建图片表失败: {}", e)))
}

pub(super) fn initialize_schema(conn: &Connection) -> Result<(), AppError> {
    let version = get_user_version(conn)?;
    if version > SCHEMA_VERSION {
        return Err(AppError::Storage(format!(
            "数据库版本 {} 高于当前程序支持的版本 {}",
            version, SCHEMA_VERSION
        )));
    }

    create_base_tables(conn)?;

    if version < SCHEMA_VERSION {
        set_user_version(conn, SCHEMA_VERSION)?;
        log::info!("数据库 Schema 已升级: v{} -> v{}", version, SCHEMA_VERSION);
    }
    Ok(())
}
