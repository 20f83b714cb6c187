//! # Ownership Calculation Engine
//!
//! 付款分攤、出貨扣減、成本計算與銷售檢查

pub mod consumption;
pub mod costing;
pub mod ledger;
pub mod payment;
pub mod validation;

// Re-export 主要類型
pub use consumption::ConsumptionAllocator;
pub use costing::{
    CostSource, CostingComparison, CostingEngine, CostingMethod, CostingRecommendation,
    LayeredCost, LotContribution, WeightedAverageCost,
};
pub use ledger::OwnershipLedger;
pub use payment::PaymentAllocator;
pub use validation::{BucketSummary, PaymentWarning, SaleValidation, ValidationGuard};

use serde::{Deserialize, Serialize};

/// 警告嚴重度（皆不阻擋交易）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningSeverity {
    Info,
    Warning,
}
