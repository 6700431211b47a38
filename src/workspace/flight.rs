//! 单飞守卫
//!
//! 每个工作区同一时刻最多一个在途变换请求。守卫构造时原子地占用标志，
//! `Drop` 时释放，因此请求无论成功、失败还是被丢弃，标志都会复位。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::db::Dimensions;
use crate::error::AppError;

/// 在途标志的 RAII 守卫
#[derive(Debug)]
pub struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    /// 尝试占用标志；已被占用时返回 `WorkspaceBusy`。
    pub fn try_acquire(flag: &Arc<AtomicBool>) -> Result<Self, AppError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::WorkspaceBusy)?;
        log::debug!("🛫 变换请求开始，工作区进入在途状态");
        Ok(Self { flag: Arc::clone(flag) })
    }

    pub(super) fn guards(&self, flag: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.flag, flag)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        log::debug!("🛬 变换请求结束，工作区解除在途状态");
    }
}

/// 一次变换请求的凭证
///
/// 携带发起时的工作区纪元与输入图片快照；提交结果时纪元不一致即视为过期。
#[derive(Debug)]
pub struct FlightTicket {
    pub(super) guard: FlightGuard,
    pub(super) epoch: u64,
    image: Bytes,
    dimensions: Option<Dimensions>,
}

impl FlightTicket {
    pub(super) fn new(guard: FlightGuard, epoch: u64, image: Bytes, dimensions: Option<Dimensions>) -> Self {
        Self { guard, epoch, image, dimensions }
    }

    /// 发起请求时工作区图片的快照。
    pub fn image(&self) -> &Bytes {
        &self.image
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_first_drops() {
        let flag = Arc::new(AtomicBool::new(false));

        let first = FlightGuard::try_acquire(&flag).expect("first acquire");
        assert!(matches!(FlightGuard::try_acquire(&flag), Err(AppError::WorkspaceBusy)));

        drop(first);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(FlightGuard::try_acquire(&flag).is_ok());
    }

    #[test]
    fn guard_knows_its_flag() {
        let mine = Arc::new(AtomicBool::new(false));
        let other = Arc::new(AtomicBool::new(false));
        let guard = FlightGuard::try_acquire(&mine).expect("acquire");

        assert!(guard.guards(&mine));
        assert!(!guard.guards(&other));
    }
}
