//! 图片记录 CRUD 子模块
//!
//! ## 职责
//! - `insert`：写入一个完整三元组，返回新分配的 id
//! - `get_all` / `get`：按插入顺序读取记录快照
//! - `delete_by_id`：按 id 删除，未知 id 报告 `NotFound`
//!
//! ## 错误语义
//! - SQL 失败统一映射为 `AppError::Storage`，失败时数据库状态不变

use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppError;

use super::{ImageMetadata, ImageRecord, ImageStore, ImageTriple};

const SELECT_COLUMNS: &str = "SELECT id, image, histogram, metadata, created_at FROM images";

fn read_record(row: &Row<'_>) -> rusqlite::Result<(i64, Vec<u8>, Vec<u8>, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_record(
    (id, image, histogram, metadata_json, created_at): (i64, Vec<u8>, Vec<u8>, String, i64),
) -> Result<ImageRecord, AppError> {
    let metadata: ImageMetadata = serde_json::from_str(&metadata_json).map_err(|e| {
        AppError::Storage(format!("记录 {} 的元数据无法解析: {}", id, e))
    })?;
    Ok(ImageRecord {
        id,
        triple: ImageTriple {
            image: Bytes::from(image),
            histogram: Bytes::from(histogram),
            metadata,
        },
        created_at,
    })
}

fn insert(conn: &Connection, triple: &ImageTriple) -> Result<i64, AppError> {
    let metadata_json = serde_json::to_string(&triple.metadata).map_err(|e| {
        AppError::Storage(format!("序列化元数据失败: {}", e))
    })?;
    let now = chrono::Utc::now().timestamp_millis();

    conn.execute(
        "INSERT INTO images (image, histogram, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&triple.image[..], &triple.histogram[..], metadata_json, now],
    ).map_err(|e| AppError::Storage(format!("插入图片记录失败: {}", e)))?;

    Ok(conn.last_insert_rowid())
}

fn get_all(conn: &Connection) -> Result<Vec<ImageRecord>, AppError> {
    let mut stmt = conn
        .prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
        .map_err(|e| AppError::Storage(format!("准备查询失败: {}", e)))?;

    let rows = stmt
        .query_map([], read_record)
        .map_err(|e| AppError::Storage(format!("查询图片列表失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Storage(format!("读取行失败: {}", e)))?;

    rows.into_iter().map(into_record).collect()
}

fn get(conn: &Connection, id: i64) -> Result<ImageRecord, AppError> {
    let row = conn
        .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], read_record)
        .optional()
        .map_err(|e| AppError::Storage(format!("查询图片记录失败: {}", e)))?;

    match row {
        Some(row) => into_record(row),
        None => Err(AppError::NotFound(id)),
    }
}

fn delete_by_id(conn: &Connection, id: i64) -> Result<(), AppError> {
    let affected = conn
        .execute("DELETE FROM images WHERE id = ?1", params![id])
        .map_err(|e| AppError::Storage(format!("删除图片记录失败: {}", e)))?;

    if affected == 0 {
        return Err(AppError::NotFound(id));
    }
    Ok(())
}

fn count(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
        .map_err(|e| AppError::Storage(format!("查询记录总数失败: {}", e)))
}

impl ImageStore {
    /// 写入新三元组，返回数据库分配的 id。
    pub fn insert(&self, triple: &ImageTriple) -> Result<i64, AppError> {
        let id = self.with_conn(|conn| insert(conn, triple))?;
        log::info!("🗄️ 已保存图片记录 id={} ({} 字节)", id, triple.image.len());
        Ok(id)
    }

    /// 按插入顺序返回全部记录的快照。
    pub fn get_all(&self) -> Result<Vec<ImageRecord>, AppError> {
        self.with_conn(get_all)
    }

    pub fn get(&self, id: i64) -> Result<ImageRecord, AppError> {
        self.with_conn(|conn| get(conn, id))
    }

    /// 删除记录；id 不存在时返回 `NotFound`，不影响其他数据。
    pub fn delete_by_id(&self, id: i64) -> Result<(), AppError> {
        self.with_conn(|conn| delete_by_id(conn, id))?;
        log::info!("🗑️ 已删除图片记录 id={}", id);
        Ok(())
    }

    pub fn count(&self) -> Result<i64, AppError> {
        self.with_conn(count)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn triple(tag: u8, width: u32, height: u32) -> ImageTriple {
        ImageTriple {
            image: Bytes::from(vec![tag; 8]),
            histogram: Bytes::from(vec![tag.wrapping_add(1); 4]),
            metadata: ImageMetadata::from_value(json!({
                "dimensions": { "width": width, "height": height }
            }))
            .expect("object metadata"),
        }
    }

    #[test]
    fn insert_assigns_increasing_ids_and_get_all_keeps_order() {
        let store = ImageStore::open_in_memory().expect("open store");

        let first = store.insert(&triple(1, 10, 10)).expect("insert first");
        let second = store.insert(&triple(2, 20, 20)).expect("insert second");
        assert!(second > first);

        let records = store.get_all().expect("get all");
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(records[1].triple, triple(2, 20, 20));
    }

    #[test]
    fn insert_identical_triple_creates_new_identity() {
        let store = ImageStore::open_in_memory().expect("open store");
        let t = triple(3, 5, 5);

        let a = store.insert(&t).expect("insert a");
        let b = store.insert(&t).expect("insert b");

        assert_ne!(a, b);
        assert_eq!(store.count().expect("count"), 2);
    }

    #[test]
    fn ids_are_never_reused_after_delete() {
        let store = ImageStore::open_in_memory().expect("open store");

        let first = store.insert(&triple(1, 1, 1)).expect("insert first");
        let second = store.insert(&triple(2, 1, 1)).expect("insert second");
        store.delete_by_id(second).expect("delete second");

        let third = store.insert(&triple(3, 1, 1)).expect("insert third");
        assert!(third > second, "AUTOINCREMENT 不应复用已删除的 id");
        assert!(third > first);
    }

    #[test]
    fn delete_unknown_id_reports_not_found_and_keeps_state() {
        let store = ImageStore::open_in_memory().expect("open store");
        let id = store.insert(&triple(1, 1, 1)).expect("insert");

        let result = store.delete_by_id(id + 100);
        assert!(matches!(result, Err(AppError::NotFound(missing)) if missing == id + 100));
        assert_eq!(store.count().expect("count"), 1);

        store.delete_by_id(id).expect("delete existing");
        assert!(matches!(store.delete_by_id(id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn get_returns_snapshot_or_not_found() {
        let store = ImageStore::open_in_memory().expect("open store");
        let id = store.insert(&triple(9, 64, 32)).expect("insert");

        let record = store.get(id).expect("get existing");
        assert_eq!(record.dimensions().map(|d| (d.width, d.height)), Some((64, 32)));
        assert!(record.created_at > 0);

        assert!(matches!(store.get(id + 1), Err(AppError::NotFound(_))));
    }

    #[test]
    fn unreadable_metadata_surfaces_as_storage_error() {
        let store = ImageStore::open_in_memory().expect("open store");
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO images (image, histogram, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![vec![1_u8], vec![2_u8], "not-json", 1_i64],
                )
                .map_err(|e| AppError::Storage(e.to_string()))
            })
            .expect("insert corrupt row");

        assert!(matches!(store.get_all(), Err(AppError::Storage(_))));
    }
}
