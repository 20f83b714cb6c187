//! # Ownership Core
//!
//! 賒購批次所有權的核心資料模型與類型定義

pub mod allocation;
pub mod bucket;
pub mod config;
pub mod lot;

// Re-export 主要類型
pub use allocation::{AllocationKind, LotAllocation};
pub use bucket::BucketKey;
pub use config::{DepletionClosePolicy, OwnershipConfig};
pub use lot::{ownership_percent, LotId, LotKind, Measure, NewLot, OwnershipLot, PaymentStatus};

use rust_decimal::Decimal;

/// 所有權錯誤類型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OwnershipError {
    #[error("找不到資料: {0}")]
    NotFound(String),

    #[error("可用所有權不足：需要 {requested}, 可用 {available}")]
    InsufficientOwnership { requested: Decimal, available: Decimal },

    #[error("付款金額超過未付餘額：付款 {payment}, 未付 {outstanding}")]
    OverpaymentRejected { payment: Decimal, outstanding: Decimal },

    #[error("無效的數量: {0}")]
    InvalidQuantity(String),

    #[error("無效的批次: {0}")]
    InvalidLot(String),

    #[error("並行衝突：預期版本 {expected}, 實際版本 {found}")]
    ConcurrencyConflict { expected: u64, found: u64 },

    #[error("計算不一致: {0}")]
    CalculationInconsistency(String),

    #[error("儲存錯誤: {0}")]
    Storage(String),
}

impl OwnershipError {
    /// 呼叫端是否可以重試（僅限並行衝突）
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// 拒絕非正數的輸入
    pub fn ensure_positive(value: Decimal, what: &str) -> Result<()> {
        if value <= Decimal::ZERO {
            return Err(Self::InvalidQuantity(format!("{} 必須大於 0，收到 {}", what, value)));
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, OwnershipError>;
