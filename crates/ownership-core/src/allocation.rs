//! 批次分配記錄

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{LotId, OwnershipLot};

/// 分配類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationKind {
    /// 付款分攤
    Payment,
    /// 出貨/生產消耗
    Depletion,
}

/// 單一批次的分配結果
///
/// 付款時 `amount` 為分攤金額，`quantity`/`weight` 為新增的擁有量；
/// 出貨時 `amount` 為 0，`quantity`/`weight` 為扣減量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub lot_id: LotId,
    pub source_reference: String,
    pub kind: AllocationKind,

    pub amount: Decimal,
    pub quantity: Decimal,
    pub weight: Decimal,

    /// 分配後的批次狀態
    pub ownership_percentage: Decimal,
    pub outstanding_amount: Decimal,
    pub owned_quantity: Decimal,
    pub owned_weight: Decimal,
    pub is_active: bool,
}

impl LotAllocation {
    /// 付款分攤記錄
    pub fn payment(lot: &OwnershipLot, amount: Decimal, quantity: Decimal, weight: Decimal) -> Self {
        Self::snapshot(lot, AllocationKind::Payment, amount, quantity, weight)
    }

    /// 出貨扣減記錄
    pub fn depletion(lot: &OwnershipLot, quantity: Decimal, weight: Decimal) -> Self {
        Self::snapshot(lot, AllocationKind::Depletion, Decimal::ZERO, quantity, weight)
    }

    fn snapshot(
        lot: &OwnershipLot,
        kind: AllocationKind,
        amount: Decimal,
        quantity: Decimal,
        weight: Decimal,
    ) -> Self {
        Self {
            lot_id: lot.id,
            source_reference: lot.source_reference.clone(),
            kind,
            amount,
            quantity,
            weight,
            ownership_percentage: lot.ownership_percentage,
            outstanding_amount: lot.outstanding_amount,
            owned_quantity: lot.owned_quantity,
            owned_weight: lot.owned_weight,
            is_active: lot.is_active,
        }
    }
}
