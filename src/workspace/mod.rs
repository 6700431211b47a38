//! # 工作区暂存引擎
//!
//! ## 设计思路
//!
//! 工作区是唯一的“当前图片”，永远存在：启动与重置后是空白占位图。
//!
//! | 状态 | 含义 |
//! |------|------|
//! | `Blank` | 占位图 |
//! | `Loaded` | 仓库记录的值快照，未修改 |
//! | `Dirty` | 变换结果，尚未持久化 |
//!
//! 状态迁移：
//! - `select`：任意状态 → `Loaded`，按值复制记录三元组（未保存的结果直接丢弃）。
//! - `begin_transformation` + `commit`：`Loaded|Dirty` → `Dirty`，替换三元组并追加一条历史。
//! - `mark_saved`：`Dirty` → `Loaded`。
//! - `reset`：任意状态 → `Blank`，释放显示句柄、清空历史。
//!
//! ## 实现思路
//!
//! - 变换分两步：`begin_transformation` 占用单飞守卫并拿到输入快照，外部调用完成后
//!   `commit` 才真正修改状态。调用失败时直接丢弃凭证，工作区没有任何变化。
//! - 每次 `select` / `reset` 递增纪元；凭证纪元落后说明请求期间工作区已被替换，
//!   结果作废。
//! - 工作区图片与直方图的显示句柄只在这里赋值，赋新值前先释放旧句柄。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::db::{Dimensions, ImageMetadata, ImageRecord, ImageTriple};
use crate::error::AppError;
use crate::handles::{HandleManager, HandleSlot};

mod flight;
mod placeholder;

pub use flight::{FlightGuard, FlightTicket};
pub use placeholder::build_placeholder;

/// 工作区状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceStatus {
    Blank,
    Loaded,
    Dirty,
}

/// 工作区
#[derive(Debug)]
pub struct Workspace {
    source_id: Option<i64>,
    triple: ImageTriple,
    status: WorkspaceStatus,
    history: Vec<String>,
    flight: Arc<AtomicBool>,
    epoch: u64,
    placeholder: ImageTriple,
}

impl Workspace {
    /// 以占位三元组初始化，并为其分配显示句柄。
    pub fn new(placeholder: ImageTriple, handles: &mut HandleManager) -> Self {
        let workspace = Self {
            source_id: None,
            triple: placeholder.clone(),
            status: WorkspaceStatus::Blank,
            history: Vec::new(),
            flight: Arc::new(AtomicBool::new(false)),
            epoch: 0,
            placeholder,
        };
        workspace.display(handles);
        workspace
    }

    pub fn status(&self) -> WorkspaceStatus {
        self.status
    }

    pub fn source_id(&self) -> Option<i64> {
        self.source_id
    }

    pub fn triple(&self) -> &ImageTriple {
        &self.triple
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.triple.metadata
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.triple.dimensions()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// 自上次持久化以来是否有未保存的变换结果。
    pub fn is_modified(&self) -> bool {
        self.status == WorkspaceStatus::Dirty
    }

    /// 是否有变换请求在途。
    pub fn is_busy(&self) -> bool {
        self.flight.load(Ordering::SeqCst)
    }

    /// 载入仓库记录的值快照。
    pub fn select(&mut self, record: &ImageRecord, handles: &mut HandleManager) {
        if self.is_modified() {
            log::warn!("⚠️ 工作区有未保存的变换结果，载入记录 {} 时被丢弃", record.id);
        }
        self.triple = record.triple.clone();
        self.source_id = Some(record.id);
        self.status = WorkspaceStatus::Loaded;
        self.epoch += 1;
        self.display(handles);
        log::info!("📥 工作区已载入记录 id={}", record.id);
    }

    /// 开始一次变换：占用单飞守卫并返回携带输入快照的凭证。
    pub fn begin_transformation(&self) -> Result<FlightTicket, AppError> {
        if self.status == WorkspaceStatus::Blank {
            return Err(AppError::WorkspaceEmpty);
        }
        let guard = FlightGuard::try_acquire(&self.flight)?;
        Ok(FlightTicket::new(
            guard,
            self.epoch,
            self.triple.image.clone(),
            self.dimensions(),
        ))
    }

    /// 提交变换结果：替换三元组、追加一条历史、进入 `Dirty`。
    pub fn commit(
        &mut self,
        ticket: FlightTicket,
        result: ImageTriple,
        history_entry: String,
        handles: &mut HandleManager,
    ) -> Result<(), AppError> {
        if !ticket.guard.guards(&self.flight) || ticket.epoch != self.epoch {
            log::warn!("⏭️ 变换结果已过期，丢弃");
            return Err(AppError::StaleTransformation);
        }

        self.triple = result;
        self.source_id = None;
        self.status = WorkspaceStatus::Dirty;
        log::info!("✨ {}", history_entry);
        self.history.push(history_entry);
        self.display(handles);
        drop(ticket);
        Ok(())
    }

    /// 持久化成功后回到 `Loaded`，来源指向新记录。
    pub fn mark_saved(&mut self, record_id: i64) {
        self.source_id = Some(record_id);
        self.status = WorkspaceStatus::Loaded;
    }

    /// 重置为空白占位图。
    pub fn reset(&mut self, handles: &mut HandleManager) {
        handles.release_slot(HandleSlot::WorkspaceImage);
        handles.release_slot(HandleSlot::WorkspaceHistogram);

        self.triple = self.placeholder.clone();
        self.source_id = None;
        self.status = WorkspaceStatus::Blank;
        self.history.clear();
        self.epoch += 1;
        self.display(handles);
        log::info!("🧹 工作区已重置为空白占位图");
    }

    fn display(&self, handles: &mut HandleManager) {
        handles.assign(HandleSlot::WorkspaceImage, &self.triple.image);
        handles.assign(HandleSlot::WorkspaceHistogram, &self.triple.histogram);
    }
}
