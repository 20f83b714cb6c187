//! 出貨/生產消耗扣減

use ownership_core::{
    DepletionClosePolicy, LotAllocation, Measure, OwnershipConfig, OwnershipError, OwnershipLot,
    Result,
};
use ownership_store::UnitOfWork;
use rust_decimal::Decimal;

fn label(measure: Measure) -> &'static str {
    match measure {
        Measure::Quantity => "扣減數量",
        Measure::Weight => "扣減重量",
    }
}

/// 消耗扣減器
///
/// 永遠從最舊的批次開始扣減擁有量，與成本法的選擇無關。
/// 擁有量不足時整筆拒絕，不修改任何批次。
pub struct ConsumptionAllocator;

impl ConsumptionAllocator {
    /// 按數量扣減（銷售）
    pub fn deplete(
        unit: &mut UnitOfWork,
        quantity: Decimal,
        config: &OwnershipConfig,
    ) -> Result<Vec<LotAllocation>> {
        Self::run(unit, quantity, Measure::Quantity, config)
    }

    /// 按重量扣減（原料投入生產）
    pub fn deplete_weight(
        unit: &mut UnitOfWork,
        weight: Decimal,
        config: &OwnershipConfig,
    ) -> Result<Vec<LotAllocation>> {
        Self::run(unit, weight, Measure::Weight, config)
    }

    fn run(
        unit: &mut UnitOfWork,
        requested: Decimal,
        measure: Measure,
        config: &OwnershipConfig,
    ) -> Result<Vec<LotAllocation>> {
        OwnershipError::ensure_positive(requested, label(measure))?;

        let candidates = unit.positions_where(|lot| measure.has_owned(lot));

        let available: Decimal = candidates
            .iter()
            .map(|&idx| measure.owned(&unit.lots()[idx]))
            .sum();

        if available < requested {
            tracing::warn!(
                "分組 {} 擁有量不足：需要 {}, 可用 {}",
                unit.bucket(),
                requested,
                available
            );
            return Err(OwnershipError::InsufficientOwnership {
                requested,
                available,
            });
        }

        // 先規劃，再一次套用
        let mut plan = Vec::new();
        let mut remaining = requested;
        for &idx in &candidates {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(measure.owned(&unit.lots()[idx]));
            plan.push((idx, take));
            remaining -= take;
        }

        let mut allocations = Vec::with_capacity(plan.len());
        for (idx, take) in plan {
            let lot = unit.lot_mut(idx).ok_or_else(|| {
                OwnershipError::CalculationInconsistency(format!("批次位置 {} 不存在", idx))
            })?;

            let (quantity, weight) = match measure {
                Measure::Quantity => (take, lot.take_quantity(take)),
                Measure::Weight => (lot.take_weight(take), take),
            };
            Self::close_if_exhausted(lot, config.close_policy);
            lot.check_invariants()?;

            tracing::debug!(
                "批次 {} 扣減數量 {} 重量 {}，剩餘擁有數量 {}",
                lot.source_reference,
                quantity,
                weight,
                lot.owned_quantity
            );
            allocations.push(LotAllocation::depletion(lot, quantity, weight));
        }

        let taken: Decimal = allocations
            .iter()
            .map(|a| match measure {
                Measure::Quantity => a.quantity,
                Measure::Weight => a.weight,
            })
            .sum();
        if taken != requested {
            tracing::error!("扣減總和 {} 不等於需求 {}", taken, requested);
            return Err(OwnershipError::CalculationInconsistency(format!(
                "扣減總和 {} 不等於需求 {}",
                taken, requested
            )));
        }

        Ok(allocations)
    }

    fn close_if_exhausted(lot: &mut OwnershipLot, policy: DepletionClosePolicy) {
        if !lot.owned_quantity.is_zero() || !lot.owned_weight.is_zero() {
            return;
        }
        let close = match policy {
            DepletionClosePolicy::Immediately => true,
            DepletionClosePolicy::WhenSettled => lot.outstanding_amount.is_zero(),
        };
        if close {
            lot.deactivate();
        }
    }
}
