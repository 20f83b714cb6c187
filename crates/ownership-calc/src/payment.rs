//! 付款分攤

use ownership_core::{LotAllocation, OwnershipConfig, OwnershipError, Result};
use ownership_store::UnitOfWork;
use rust_decimal::{Decimal, RoundingStrategy};

/// 付款分攤器
///
/// 將一筆付款按未付餘額比例分攤到分組內所有未付清的有效批次。
pub struct PaymentAllocator;

impl PaymentAllocator {
    /// 分攤付款
    ///
    /// 驗證失敗（金額非正、無未付批次、超額付款）時不修改任何批次。
    pub fn allocate(
        unit: &mut UnitOfWork,
        payment: Decimal,
        config: &OwnershipConfig,
    ) -> Result<Vec<LotAllocation>> {
        OwnershipError::ensure_positive(payment, "付款金額")?;

        let targets = unit.positions_where(|lot| lot.has_outstanding());
        if targets.is_empty() {
            return Err(OwnershipError::NotFound(format!(
                "分組 {} 沒有未付款的批次",
                unit.bucket()
            )));
        }

        let outstanding: Vec<Decimal> = targets
            .iter()
            .map(|&idx| unit.lots()[idx].outstanding_amount)
            .collect();
        let total_outstanding: Decimal = outstanding.iter().copied().sum();

        if payment > total_outstanding {
            tracing::warn!(
                "分組 {} 付款 {} 超過未付總額 {}，整筆拒絕",
                unit.bucket(),
                payment,
                total_outstanding
            );
            return Err(OwnershipError::OverpaymentRejected {
                payment,
                outstanding: total_outstanding,
            });
        }

        let shares = Self::split(payment, &outstanding, config.currency_scale);

        let mut allocations = Vec::with_capacity(targets.len());
        for (&idx, share) in targets.iter().zip(shares) {
            if share.is_zero() {
                continue;
            }
            let lot = unit.lot_mut(idx).ok_or_else(|| {
                OwnershipError::CalculationInconsistency(format!("批次位置 {} 不存在", idx))
            })?;

            let (gained_quantity, gained_weight) = lot.apply_payment(share);
            lot.check_invariants()?;

            tracing::debug!(
                "批次 {} 分攤 {}，比例 {}，擁有數量 {}",
                lot.source_reference,
                share,
                lot.ownership_percentage,
                lot.owned_quantity
            );
            allocations.push(LotAllocation::payment(lot, share, gained_quantity, gained_weight));
        }

        Self::verify(payment, &allocations)?;
        Ok(allocations)
    }

    /// 按未付餘額比例拆分金額
    ///
    /// 每份先無條件捨去到 `scale` 位，捨入餘數依份額由大到小補足
    /// （同額時後面的批次優先），且不超過該批次的未付餘額，
    /// 因此各份總和恆等於 `payment`（前提 `payment <= Σ outstanding`）。
    pub fn split(payment: Decimal, outstanding: &[Decimal], scale: u32) -> Vec<Decimal> {
        let total: Decimal = outstanding.iter().copied().sum();
        if total.is_zero() {
            return vec![Decimal::ZERO; outstanding.len()];
        }

        let mut shares: Vec<Decimal> = outstanding
            .iter()
            .map(|o| (payment * *o / total).round_dp_with_strategy(scale, RoundingStrategy::ToZero))
            .collect();

        let mut remainder = payment - shares.iter().copied().sum::<Decimal>();
        if remainder.is_zero() {
            return shares;
        }

        let mut order: Vec<usize> = (0..shares.len()).collect();
        order.sort_by(|&a, &b| shares[b].cmp(&shares[a]).then(b.cmp(&a)));

        for idx in order {
            if remainder <= Decimal::ZERO {
                break;
            }
            let headroom = outstanding[idx] - shares[idx];
            let top_up = remainder.min(headroom);
            shares[idx] += top_up;
            remainder -= top_up;
        }

        shares
    }

    fn verify(payment: Decimal, allocations: &[LotAllocation]) -> Result<()> {
        let allocated: Decimal = allocations.iter().map(|a| a.amount).sum();
        if allocated != payment {
            tracing::error!("付款分攤總和 {} 不等於付款 {}", allocated, payment);
            return Err(OwnershipError::CalculationInconsistency(format!(
                "付款分攤總和 {} 不等於付款 {}",
                allocated, payment
            )));
        }
        Ok(())
    }
}
