//! 数据库模块（持久化图片仓库）
//!
//! # 设计思路
//!
//! 所有图片记录集中存放在单个 SQLite 数据库中，使用 `rusqlite` 直接操作。
//! 每条记录是一个不可拆分的三元组：原图、直方图、元数据，三者在同一条 INSERT 中写入，
//! 不存在“只写了一半”的记录。
//!
//! # 约束
//!
//! - **id 单调递增且永不复用**：表使用 `AUTOINCREMENT`，删除后也不会回收 id。
//! - **快照读取**：`get_all` / `get` 返回的是值拷贝，调用方持有的数据与数据库互不影响。
//! - **插入不是 upsert**：每次 `insert` 都产生新的身份。

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

mod images;
mod schema;

// ============================================================================
// 数据模型
// ============================================================================

/// 图片宽高（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 图片元数据（由外部服务生成的键值记录，可为空）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageMetadata(Map<String, Value>);

impl ImageMetadata {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// 仅接受 JSON 对象；其他类型视为格式错误。
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// 读取 `dimensions: { width, height }`。
    ///
    /// 缺失或任一分量不是非负整数时返回 `None`。
    pub fn dimensions(&self) -> Option<Dimensions> {
        let dims = self.0.get("dimensions")?.as_object()?;
        let width = u32::try_from(dims.get("width")?.as_u64()?).ok()?;
        let height = u32::try_from(dims.get("height")?.as_u64()?).ok()?;
        Some(Dimensions { width, height })
    }

    /// 以缩进 JSON 输出，空元数据输出 `{}`。
    pub fn to_pretty_json(&self) -> String {
        if self.0.is_empty() {
            return "{}".to_string();
        }
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// 图片三元组：原图 + 直方图 + 元数据
///
/// `Bytes` 不可变且克隆为引用计数，复制三元组即得到独立的值快照。
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTriple {
    pub image: Bytes,
    pub histogram: Bytes,
    pub metadata: ImageMetadata,
}

impl ImageTriple {
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.metadata.dimensions()
    }
}

/// 持久化的图片记录
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub triple: ImageTriple,
    /// 创建时间（UTC 毫秒）
    pub created_at: i64,
}

impl ImageRecord {
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.triple.dimensions()
    }
}

// ============================================================================
// 图片仓库
// ============================================================================

/// 图片仓库，封装 SQLite 连接
pub struct ImageStore(Mutex<Connection>);

impl ImageStore {
    /// 打开（或创建）文件数据库并初始化 Schema。
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("创建数据库目录失败: {}", e))
            })?;
        }
        log::info!("数据库路径: {}", db_path.display());

        let conn = Connection::open(db_path).map_err(|e| {
            AppError::Storage(format!("打开数据库失败: {}", e))
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| AppError::Storage(format!("设置 WAL 模式失败: {}", e)))?;

        schema::initialize_schema(&conn)?;
        Ok(Self(Mutex::new(conn)))
    }

    /// 内存数据库，主要用于测试。
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AppError::Storage(format!("打开内存数据库失败: {}", e))
        })?;
        schema::initialize_schema(&conn)?;
        Ok(Self(Mutex::new(conn)))
    }

    pub(crate) fn with_conn<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self.0.lock().map_err(|e| {
            AppError::Storage(format!("获取数据库锁失败: {}", e))
        })?;
        op(&conn)
    }
}
