//! 工作單元

use ownership_core::{BucketKey, LotId, OwnershipLot};

use crate::DirtyTracker;

/// 單一分組的工作單元
///
/// 載入時的批次快照與版本。所有修改只發生在記憶體中，
/// 直到 [`crate::LedgerStore::commit`] 一次寫回；未提交即丟棄等同回滾。
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    bucket: BucketKey,
    version: u64,
    /// 依建立時間排序（舊的在前）
    lots: Vec<OwnershipLot>,
    dirty: DirtyTracker,
}

impl UnitOfWork {
    /// 創建工作單元
    pub fn new(bucket: BucketKey, version: u64, mut lots: Vec<OwnershipLot>) -> Self {
        lots.sort_by(|a, b| a.cmp_by_age(b));
        Self {
            bucket,
            version,
            lots,
            dirty: DirtyTracker::new(),
        }
    }

    pub fn bucket(&self) -> &BucketKey {
        &self.bucket
    }

    /// 載入時的分組版本
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 所有批次（含已停用）
    pub fn lots(&self) -> &[OwnershipLot] {
        &self.lots
    }

    /// 有效批次
    pub fn active_lots(&self) -> impl Iterator<Item = &OwnershipLot> {
        self.lots.iter().filter(|lot| lot.is_active)
    }

    /// 取得可修改的批次並標記為髒
    pub fn lot_mut(&mut self, index: usize) -> Option<&mut OwnershipLot> {
        let lot = self.lots.get_mut(index)?;
        self.dirty.mark_dirty(lot.id);
        Some(lot)
    }

    /// 依ID尋找批次位置
    pub fn position(&self, lot_id: LotId) -> Option<usize> {
        self.lots.iter().position(|lot| lot.id == lot_id)
    }

    /// 符合條件的批次位置（建立時間順序）
    pub fn positions_where<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&OwnershipLot) -> bool,
    {
        self.lots
            .iter()
            .enumerate()
            .filter(|(_, lot)| predicate(lot))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// 拆解為提交所需的內容：分組鍵、載入版本、被修改的批次
    pub fn into_changes(self) -> (BucketKey, u64, Vec<OwnershipLot>) {
        let dirty = self.dirty;
        let changed = self
            .lots
            .into_iter()
            .filter(|lot| dirty.is_dirty(&lot.id))
            .collect();
        (self.bucket, self.version, changed)
    }
}
