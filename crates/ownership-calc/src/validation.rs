//! 銷售前檢查與分組摘要

use ownership_core::{
    BucketKey, LotId, Measure, OwnershipError, OwnershipLot, PaymentStatus, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::WarningSeverity;

/// 供應商付款警告（僅供提示，不阻擋銷售）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentWarning {
    pub lot_id: LotId,
    pub source_reference: String,
    pub supplier_id: Option<String>,
    pub status: PaymentStatus,
    pub outstanding_amount: Decimal,
    pub ownership_percentage: Decimal,
    pub severity: WarningSeverity,
    pub message: String,
}

impl PaymentWarning {
    fn for_lot(lot: &OwnershipLot) -> Option<Self> {
        let status = lot.payment_status();
        let supplier = lot.bucket.supplier_id.as_deref().unwrap_or("自有");
        let (severity, message) = match status {
            PaymentStatus::FullyPaid => return None,
            PaymentStatus::Unpaid => (
                WarningSeverity::Warning,
                format!(
                    "批次 {}（供應商 {}）完全未付款，未付 {}",
                    lot.source_reference, supplier, lot.outstanding_amount
                ),
            ),
            PaymentStatus::PartiallyPaid => (
                WarningSeverity::Info,
                format!(
                    "批次 {}（供應商 {}）部分付款，未付 {}",
                    lot.source_reference, supplier, lot.outstanding_amount
                ),
            ),
        };

        Some(Self {
            lot_id: lot.id,
            source_reference: lot.source_reference.clone(),
            supplier_id: lot.bucket.supplier_id.clone(),
            status,
            outstanding_amount: lot.outstanding_amount,
            ownership_percentage: lot.ownership_percentage,
            severity,
            message,
        })
    }
}

/// 銷售檢查結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleValidation {
    pub can_sell: bool,
    pub requested_quantity: Decimal,
    pub available_quantity: Decimal,
    pub message: String,
    pub warnings: Vec<PaymentWarning>,
}

impl SaleValidation {
    /// 不足的數量
    pub fn shortfall(&self) -> Decimal {
        (self.requested_quantity - self.available_quantity).max(Decimal::ZERO)
    }
}

/// 分組所有權摘要（報表/提醒用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub bucket: BucketKey,
    pub active_lots: usize,
    pub total_quantity: Decimal,
    pub owned_quantity: Decimal,
    pub owned_weight: Decimal,
    pub total_cost: Decimal,
    pub amount_paid: Decimal,
    pub outstanding_amount: Decimal,
    pub unpaid_lots: usize,
    pub partially_paid_lots: usize,
    pub fully_paid_lots: usize,
    /// 已付 / 成本，介於 [0, 1]
    pub ownership_ratio: Decimal,
}

/// 銷售前檢查
pub struct ValidationGuard;

impl ValidationGuard {
    /// 檢查是否可銷售
    ///
    /// 只有擁有數量不足才會拒絕；未付款只產生警告。
    pub fn validate_sale(lots: &[OwnershipLot], requested_quantity: Decimal) -> Result<SaleValidation> {
        OwnershipError::ensure_positive(requested_quantity, "銷售數量")?;

        let available_quantity: Decimal = lots
            .iter()
            .filter(|l| Measure::Quantity.has_owned(l))
            .map(|l| l.owned_quantity)
            .sum();

        if available_quantity < requested_quantity {
            return Ok(SaleValidation {
                can_sell: false,
                requested_quantity,
                available_quantity,
                message: format!(
                    "擁有數量不足：需要 {}, 可用 {}, 短缺 {}",
                    requested_quantity,
                    available_quantity,
                    requested_quantity - available_quantity
                ),
                warnings: Vec::new(),
            });
        }

        let warnings: Vec<PaymentWarning> = lots
            .iter()
            .filter(|l| l.has_outstanding())
            .filter_map(PaymentWarning::for_lot)
            .collect();

        let message = if warnings.is_empty() {
            "可銷售".to_string()
        } else {
            format!("可銷售，{} 個批次尚有未付款", warnings.len())
        };

        Ok(SaleValidation {
            can_sell: true,
            requested_quantity,
            available_quantity,
            message,
            warnings,
        })
    }

    /// 分組摘要
    pub fn summarize(bucket: &BucketKey, lots: &[OwnershipLot]) -> BucketSummary {
        let active: Vec<&OwnershipLot> = lots.iter().filter(|l| l.is_active).collect();

        let count = |status: PaymentStatus| {
            active.iter().filter(|l| l.payment_status() == status).count()
        };
        let total_cost: Decimal = active.iter().map(|l| l.total_cost).sum();
        let amount_paid: Decimal = active.iter().map(|l| l.amount_paid).sum();

        BucketSummary {
            bucket: bucket.clone(),
            active_lots: active.len(),
            total_quantity: active.iter().map(|l| l.total_quantity).sum(),
            owned_quantity: active.iter().map(|l| l.owned_quantity).sum(),
            owned_weight: active.iter().map(|l| l.owned_weight).sum(),
            total_cost,
            amount_paid,
            outstanding_amount: active.iter().map(|l| l.outstanding_amount).sum(),
            unpaid_lots: count(PaymentStatus::Unpaid),
            partially_paid_lots: count(PaymentStatus::PartiallyPaid),
            fully_paid_lots: count(PaymentStatus::FullyPaid),
            ownership_ratio: if total_cost.is_zero() {
                Decimal::ONE
            } else {
                amount_paid / total_cost
            },
        }
    }
}
