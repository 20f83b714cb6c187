//! # Ownership Store
//!
//! 批次帳本儲存、工作單元與髒標記追蹤

pub mod dirty_tracking;
pub mod memory;
pub mod unit_of_work;

// Re-export 主要類型
pub use dirty_tracking::DirtyTracker;
pub use memory::InMemoryLedgerStore;
pub use unit_of_work::UnitOfWork;

use ownership_core::{BucketKey, LotId, NewLot, OwnershipLot};
use std::sync::Arc;

/// 提交結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub bucket: BucketKey,
    /// 提交後的分組版本
    pub version: u64,
    /// 實際寫入的批次數
    pub lots_written: usize,
}

/// 批次帳本儲存
///
/// 純資料存取，不含業務規則。同一分組的多筆批次透過 [`UnitOfWork`]
/// 一次載入、在記憶體中修改、再以樂觀版本一次提交。
pub trait LedgerStore: Send + Sync {
    /// 寫入新批次（進貨）
    fn insert_lot(&self, request: NewLot) -> ownership_core::Result<OwnershipLot>;

    /// 開始工作單元：載入分組內所有批次與目前版本
    fn begin(&self, bucket: &BucketKey) -> ownership_core::Result<UnitOfWork>;

    /// 提交工作單元；版本已變動時回傳並行衝突
    fn commit(&self, unit: UnitOfWork) -> ownership_core::Result<CommitReceipt>;

    /// 分組內的有效批次（舊的在前）
    fn get_lots(&self, bucket: &BucketKey) -> ownership_core::Result<Vec<OwnershipLot>>;

    /// 依ID查詢批次
    fn get_lot(&self, lot_id: LotId) -> ownership_core::Result<OwnershipLot>;

    /// 所有分組鍵
    fn bucket_keys(&self) -> ownership_core::Result<Vec<BucketKey>>;
}

impl<S: LedgerStore + ?Sized> LedgerStore for Arc<S> {
    fn insert_lot(&self, request: NewLot) -> ownership_core::Result<OwnershipLot> {
        (**self).insert_lot(request)
    }

    fn begin(&self, bucket: &BucketKey) -> ownership_core::Result<UnitOfWork> {
        (**self).begin(bucket)
    }

    fn commit(&self, unit: UnitOfWork) -> ownership_core::Result<CommitReceipt> {
        (**self).commit(unit)
    }

    fn get_lots(&self, bucket: &BucketKey) -> ownership_core::Result<Vec<OwnershipLot>> {
        (**self).get_lots(bucket)
    }

    fn get_lot(&self, lot_id: LotId) -> ownership_core::Result<OwnershipLot> {
        (**self).get_lot(lot_id)
    }

    fn bucket_keys(&self) -> ownership_core::Result<Vec<BucketKey>> {
        (**self).bucket_keys()
    }
}
