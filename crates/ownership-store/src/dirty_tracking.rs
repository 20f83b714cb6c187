//! 髒標記追蹤

use ownership_core::LotId;
use std::collections::HashSet;

/// 髒標記追蹤器（記錄工作單元內被修改的批次）
#[derive(Debug, Clone)]
pub struct DirtyTracker {
    dirty_lots: HashSet<LotId>,
}

impl DirtyTracker {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self {
            dirty_lots: HashSet::new(),
        }
    }

    /// 標記批次為髒
    pub fn mark_dirty(&mut self, lot_id: LotId) {
        self.dirty_lots.insert(lot_id);
    }

    /// 檢查批次是否為髒
    pub fn is_dirty(&self, lot_id: &LotId) -> bool {
        self.dirty_lots.contains(lot_id)
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_lots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirty_lots.len()
    }
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}
