//! 显示句柄生命周期管理模块
//!
//! # 设计思路
//!
//! 渲染二进制图片需要一个临时“显示句柄”（类似浏览器的 blob URL）。句柄本身不拥有数据，
//! 但若不显式释放，映射会一直存活到会话结束，造成资源泄漏。
//!
//! 本模块把“申请 / 释放”集中到 `HandleManager`：
//! - **槽位纪律**：工作区图片、工作区直方图、画廊缩略图等可被重新赋值的位置都是一个
//!   `HandleSlot`，`assign` 在申请新句柄之前一定先释放该槽位的旧句柄。
//! - **幂等释放**：重复释放、释放其他管理器签发的句柄都是 no-op，不报错。
//!
//! # 实现思路
//!
//! - 每个管理器有全局唯一编号，句柄携带签发者编号，借此识别“外来”句柄。
//! - 句柄映射到 `Bytes` 的引用计数克隆，相当于浏览器 blob URL 对 Blob 的引用：
//!   数据的所有者仍是仓库记录或工作区三元组，管理器从不复制、修改或派生数据，
//!   句柄释放后这份引用随之归还。
//! - `data_url` 将句柄渲染为 `data:<mime>;base64,...`，MIME 由 `infer` 嗅探。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// 临时显示句柄（不拥有数据）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle {
    manager: u64,
    seq: u64,
}

impl DisplayHandle {
    /// 句柄的展示地址，仅用于前端引用。
    pub fn url(&self) -> String {
        format!("blob:image-workbench/{}-{}", self.manager, self.seq)
    }
}

/// 可被重新赋值的显示位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleSlot {
    WorkspaceImage,
    WorkspaceHistogram,
    /// 画廊缩略图（按记录 id）
    Thumbnail(i64),
    /// 多图选择弹窗中的候选图（按记录 id）
    Candidate(i64),
}

/// 显示句柄管理器
#[derive(Debug)]
pub struct HandleManager {
    id: u64,
    next_seq: u64,
    live: HashMap<DisplayHandle, Bytes>,
    slots: HashMap<HandleSlot, DisplayHandle>,
}

impl Default for HandleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleManager {
    pub fn new() -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            next_seq: 1,
            live: HashMap::new(),
            slots: HashMap::new(),
        }
    }

    /// 为二进制对象签发新句柄。
    pub fn acquire(&mut self, blob: &Bytes) -> DisplayHandle {
        let handle = DisplayHandle { manager: self.id, seq: self.next_seq };
        self.next_seq += 1;
        self.live.insert(handle, blob.clone());
        handle
    }

    /// 释放句柄；返回是否真的释放了一个存活句柄。
    ///
    /// 重复释放或释放外来句柄返回 `false`，不会报错。
    pub fn release(&mut self, handle: DisplayHandle) -> bool {
        if handle.manager != self.id {
            log::debug!("忽略外来句柄释放: {}", handle.url());
            return false;
        }
        let released = self.live.remove(&handle).is_some();
        if released {
            self.slots.retain(|_, assigned| *assigned != handle);
        }
        released
    }

    /// 为槽位赋新句柄，旧句柄先释放。
    pub fn assign(&mut self, slot: HandleSlot, blob: &Bytes) -> DisplayHandle {
        self.release_slot(slot);
        let handle = self.acquire(blob);
        self.slots.insert(slot, handle);
        handle
    }

    /// 释放槽位当前的句柄（若有）。
    pub fn release_slot(&mut self, slot: HandleSlot) -> bool {
        match self.slots.remove(&slot) {
            Some(previous) => self.release(previous),
            None => false,
        }
    }

    /// 按条件批量释放槽位，返回释放数量。
    pub fn release_slots_where(&mut self, mut predicate: impl FnMut(&HandleSlot) -> bool) -> usize {
        let targets: Vec<HandleSlot> = self.slots.keys().filter(|slot| predicate(slot)).copied().collect();
        targets.into_iter().filter(|slot| self.release_slot(*slot)).count()
    }

    /// 会话结束时释放全部句柄。
    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        self.slots.clear();
        count
    }

    pub fn slot_handle(&self, slot: HandleSlot) -> Option<DisplayHandle> {
        self.slots.get(&slot).copied()
    }

    pub fn resolve(&self, handle: DisplayHandle) -> Option<&Bytes> {
        self.live.get(&handle)
    }

    pub fn is_live(&self, handle: DisplayHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// 将句柄渲染为 data URL，句柄已失效时返回 `None`。
    pub fn data_url(&self, handle: DisplayHandle) -> Option<String> {
        let blob = self.resolve(handle)?;
        let mime = infer::get(blob)
            .map(|kind| kind.mime_type())
            .unwrap_or("image/png");
        Some(format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(blob)))
    }
}
