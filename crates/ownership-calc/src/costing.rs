//! 成本計算（加權平均、先進先出、後進先出）
//!
//! 全部為唯讀查詢，不修改任何批次。只計入有效且仍有擁有庫存的批次：
//! 成品按擁有數量，原料（或沒有件數的批次）按擁有重量。

use chrono::{DateTime, Utc};
use ownership_core::{LotId, Measure, OwnershipConfig, OwnershipError, OwnershipLot, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 成本法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostingMethod {
    /// 加權平均
    WeightedAverage,
    /// 先進先出
    Fifo,
    /// 後進先出
    Lifo,
}

/// 單一批次對加權平均的貢獻
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotContribution {
    pub lot_id: LotId,
    pub source_reference: String,
    pub owned_quantity: Decimal,
    pub owned_weight: Decimal,
    pub owned_cost_share: Decimal,
    /// 占總擁有量的比例 [0, 1]，計量同 `WeightedAverageCost::measure`
    pub contribution: Decimal,
}

/// 加權平均成本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedAverageCost {
    /// 分組的估值計量
    pub measure: Measure,
    /// 按重量估值的分組為 None
    pub cost_per_unit: Option<Decimal>,
    /// 沒有擁有重量時為 None
    pub cost_per_weight_unit: Option<Decimal>,
    pub total_owned_cost: Decimal,
    pub total_owned_quantity: Decimal,
    pub total_owned_weight: Decimal,
    pub breakdown: Vec<LotContribution>,
}

/// FIFO/LIFO 使用的批次來源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSource {
    pub lot_id: LotId,
    pub source_reference: String,
    pub created_at: DateTime<Utc>,
    pub quantity_used: Decimal,
    pub weight_used: Decimal,
    /// 每件或每單位重量的成本
    pub unit_cost: Decimal,
    pub cost_used: Decimal,
}

/// 分層計價結果（FIFO/LIFO）
///
/// `requested`、`fulfilled` 與 `cost_per_unit` 依 `measure` 為件數或重量。
/// 擁有量不足時 `success = false`，仍回傳已組出的部分來源，由呼叫端決定是否接受。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredCost {
    pub method: CostingMethod,
    pub measure: Measure,
    pub requested: Decimal,
    pub fulfilled: Decimal,
    pub total_cost: Decimal,
    pub cost_per_unit: Decimal,
    pub sources_used: Vec<CostSource>,
    pub success: bool,
}

impl LayeredCost {
    /// 不足的量
    pub fn shortfall(&self) -> Decimal {
        (self.requested - self.fulfilled).max(Decimal::ZERO)
    }
}

/// 成本法建議
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostingRecommendation {
    pub method: CostingMethod,
    pub reason: String,
}

/// 三種成本法並列比較
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostingComparison {
    /// 沒有擁有庫存時為 None
    pub weighted_average: Option<WeightedAverageCost>,
    pub fifo: LayeredCost,
    pub lifo: LayeredCost,
    pub recommendation: CostingRecommendation,
}

/// 成本計算引擎
pub struct CostingEngine;

impl CostingEngine {
    /// 分組的估值計量
    ///
    /// 有任何按件數估值的有效批次即按件數，否則按重量。
    pub fn bucket_measure(lots: &[OwnershipLot]) -> Measure {
        let active: Vec<&OwnershipLot> = lots.iter().filter(|l| l.is_active).collect();
        if active.is_empty() || active.iter().any(|l| l.valuation_measure() == Measure::Quantity) {
            Measure::Quantity
        } else {
            Measure::Weight
        }
    }

    /// 加權平均成本
    pub fn weighted_average(lots: &[OwnershipLot]) -> Result<WeightedAverageCost> {
        let owned: Vec<&OwnershipLot> = lots.iter().filter(|l| l.has_owned_stock()).collect();
        if owned.is_empty() {
            return Err(OwnershipError::NotFound(
                "沒有擁有庫存的批次".to_string(),
            ));
        }

        let measure = if owned.iter().all(|l| l.valuation_measure() == Measure::Quantity) {
            Measure::Quantity
        } else {
            Measure::Weight
        };
        let total_owned_quantity: Decimal = owned.iter().map(|l| l.owned_quantity).sum();
        let total_owned_weight: Decimal = owned.iter().map(|l| l.owned_weight).sum();
        let total_owned = match measure {
            Measure::Quantity => total_owned_quantity,
            Measure::Weight => total_owned_weight,
        };

        let breakdown: Vec<LotContribution> = owned
            .iter()
            .map(|lot| LotContribution {
                lot_id: lot.id,
                source_reference: lot.source_reference.clone(),
                owned_quantity: lot.owned_quantity,
                owned_weight: lot.owned_weight,
                owned_cost_share: lot.owned_cost_share(),
                contribution: if total_owned.is_zero() {
                    Decimal::ZERO
                } else {
                    measure.owned(lot) / total_owned
                },
            })
            .collect();
        let total_owned_cost: Decimal = breakdown.iter().map(|c| c.owned_cost_share).sum();

        let cost_per_unit = match measure {
            Measure::Quantity => Some(total_owned_cost / total_owned_quantity),
            Measure::Weight => None,
        };
        let cost_per_weight_unit = if total_owned_weight.is_zero() {
            None
        } else {
            Some(total_owned_cost / total_owned_weight)
        };

        Ok(WeightedAverageCost {
            measure,
            cost_per_unit,
            cost_per_weight_unit,
            total_owned_cost,
            total_owned_quantity,
            total_owned_weight,
            breakdown,
        })
    }

    /// 先進先出計價（按件數）
    pub fn fifo(lots: &[OwnershipLot], requested_quantity: Decimal) -> Result<LayeredCost> {
        Self::layered(lots, requested_quantity, CostingMethod::Fifo, Measure::Quantity)
    }

    /// 後進先出計價（按件數）
    pub fn lifo(lots: &[OwnershipLot], requested_quantity: Decimal) -> Result<LayeredCost> {
        Self::layered(lots, requested_quantity, CostingMethod::Lifo, Measure::Quantity)
    }

    /// 先進先出計價（按重量）
    pub fn fifo_by_weight(lots: &[OwnershipLot], requested_weight: Decimal) -> Result<LayeredCost> {
        Self::layered(lots, requested_weight, CostingMethod::Fifo, Measure::Weight)
    }

    /// 後進先出計價（按重量）
    pub fn lifo_by_weight(lots: &[OwnershipLot], requested_weight: Decimal) -> Result<LayeredCost> {
        Self::layered(lots, requested_weight, CostingMethod::Lifo, Measure::Weight)
    }

    fn layered(
        lots: &[OwnershipLot],
        requested: Decimal,
        method: CostingMethod,
        measure: Measure,
    ) -> Result<LayeredCost> {
        OwnershipError::ensure_positive(requested, "計價數量")?;

        let mut ordered: Vec<&OwnershipLot> =
            lots.iter().filter(|l| measure.has_owned(l)).collect();
        ordered.sort_by(|a, b| a.cmp_by_age(b));
        if method == CostingMethod::Lifo {
            ordered.reverse();
        }

        let mut remaining = requested;
        let mut sources = Vec::new();
        for lot in ordered {
            if remaining.is_zero() {
                break;
            }
            let owned = measure.owned(lot);
            let used = remaining.min(owned);
            let (quantity_used, weight_used) = match measure {
                Measure::Quantity if used == owned => (used, lot.owned_weight),
                Measure::Quantity => (used, used * lot.owned_weight / owned),
                Measure::Weight if used == owned => (lot.owned_quantity, used),
                Measure::Weight => (used * lot.owned_quantity / owned, used),
            };
            let unit_cost = lot.unit_cost(measure).ok_or_else(|| {
                OwnershipError::CalculationInconsistency(format!(
                    "批次 {} 有擁有量但整批量為 0",
                    lot.source_reference
                ))
            })?;

            sources.push(CostSource {
                lot_id: lot.id,
                source_reference: lot.source_reference.clone(),
                created_at: lot.created_at,
                quantity_used,
                weight_used,
                unit_cost,
                cost_used: unit_cost * used,
            });
            remaining -= used;
        }

        let fulfilled = requested - remaining;
        let total_cost: Decimal = sources.iter().map(|s| s.cost_used).sum();
        let cost_per_unit = if fulfilled.is_zero() {
            Decimal::ZERO
        } else {
            total_cost / fulfilled
        };

        let success = remaining.is_zero();
        if !success {
            tracing::debug!(
                "{:?} 計價不足：需要 {}, 只組出 {}",
                method,
                requested,
                fulfilled
            );
        }

        Ok(LayeredCost {
            method,
            measure,
            requested,
            fulfilled,
            total_cost,
            cost_per_unit,
            sources_used: sources,
            success,
        })
    }

    /// 成本法建議
    ///
    /// 業務預設，不是統計選擇：黃金等高波動商品以加權平均估值，
    /// FIFO/LIFO 僅供比較與稽核。
    pub fn recommend_method(
        weighted: Option<&WeightedAverageCost>,
        fifo: &LayeredCost,
        _lifo: &LayeredCost,
        config: &OwnershipConfig,
    ) -> CostingRecommendation {
        if config.volatile_commodity {
            return CostingRecommendation {
                method: CostingMethod::WeightedAverage,
                reason: "高波動商品以加權平均維持估值穩定，FIFO/LIFO 僅供比較".to_string(),
            };
        }

        if fifo.success || weighted.is_none() {
            CostingRecommendation {
                method: CostingMethod::Fifo,
                reason: "價格穩定的商品依進貨順序計價".to_string(),
            }
        } else {
            CostingRecommendation {
                method: CostingMethod::WeightedAverage,
                reason: "擁有量不足以完整分層計價，改用加權平均".to_string(),
            }
        }
    }

    /// 三種成本法並列比較
    ///
    /// 分層計價的計量依 [`Self::bucket_measure`]，原料分組的需求量視為重量。
    pub fn compare(
        lots: &[OwnershipLot],
        requested_quantity: Decimal,
        config: &OwnershipConfig,
    ) -> Result<CostingComparison> {
        let weighted_average = match Self::weighted_average(lots) {
            Ok(weighted) => Some(weighted),
            Err(OwnershipError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let measure = Self::bucket_measure(lots);
        let fifo = Self::layered(lots, requested_quantity, CostingMethod::Fifo, measure)?;
        let lifo = Self::layered(lots, requested_quantity, CostingMethod::Lifo, measure)?;
        let recommendation =
            Self::recommend_method(weighted_average.as_ref(), &fifo, &lifo, config);

        Ok(CostingComparison {
            weighted_average,
            fifo,
            lifo,
            recommendation,
        })
    }
}
