//! 批次分組鍵

use serde::{Deserialize, Serialize};
use std::fmt;

/// 批次分組鍵（物料 + 分店 + 供應商）
///
/// 沒有供應商的分組代表自有/系統庫存，不需要付款週期。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    /// 物料ID（產品或原料成色）
    pub item_id: String,

    /// 分店ID
    pub branch_id: String,

    /// 供應商ID
    pub supplier_id: Option<String>,
}

impl BucketKey {
    /// 創建自有庫存的分組鍵
    pub fn new(item_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            branch_id: branch_id.into(),
            supplier_id: None,
        }
    }

    /// 建構器模式：設置供應商
    pub fn with_supplier(mut self, supplier_id: impl Into<String>) -> Self {
        self.supplier_id = Some(supplier_id.into());
        self
    }

    /// 是否為自有庫存
    pub fn is_self_owned(&self) -> bool {
        self.supplier_id.is_none()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.supplier_id {
            Some(supplier) => write!(f, "{}@{}/{}", self.item_id, self.branch_id, supplier),
            None => write!(f, "{}@{}/self", self.item_id, self.branch_id),
        }
    }
}
