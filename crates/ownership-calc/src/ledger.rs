//! 所有權帳本主入口

use ownership_core::{
    BucketKey, LotAllocation, LotId, NewLot, OwnershipConfig, OwnershipError, OwnershipLot, Result,
};
use ownership_store::{LedgerStore, UnitOfWork};
use rayon::prelude::*;
use rust_decimal::Decimal;

use crate::{
    BucketSummary, ConsumptionAllocator, CostingComparison, CostingEngine, LayeredCost,
    PaymentAllocator, SaleValidation, ValidationGuard, WeightedAverageCost,
};

/// 所有權帳本
///
/// 每個寫入操作都在單一分組的工作單元內完成：載入、在記憶體中修改、一次提交。
/// 版本衝突時依配置重試；不同分組之間互不協調。
pub struct OwnershipLedger<S: LedgerStore> {
    store: S,
    config: OwnershipConfig,
}

impl<S: LedgerStore> OwnershipLedger<S> {
    /// 創建新的帳本
    pub fn new(store: S, config: OwnershipConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &OwnershipConfig {
        &self.config
    }

    /// 進貨建立批次
    pub fn receive_lot(&self, request: NewLot) -> Result<OwnershipLot> {
        let lot = self.store.insert_lot(request)?;
        tracing::info!(
            "建立批次 {} ({})：數量 {}，重量 {}，成本 {}，比例 {}",
            lot.id,
            lot.source_reference,
            lot.total_quantity,
            lot.total_weight,
            lot.total_cost,
            lot.ownership_percentage
        );
        Ok(lot)
    }

    /// 分攤付款
    pub fn allocate_payment(&self, bucket: &BucketKey, payment: Decimal) -> Result<Vec<LotAllocation>> {
        let allocations = self.in_unit(bucket, |unit| {
            PaymentAllocator::allocate(unit, payment, &self.config)
        })?;
        tracing::info!(
            "分組 {} 付款 {} 分攤至 {} 個批次",
            bucket,
            payment,
            allocations.len()
        );
        Ok(allocations)
    }

    /// 按數量扣減擁有量
    pub fn deplete(&self, bucket: &BucketKey, quantity: Decimal) -> Result<Vec<LotAllocation>> {
        let allocations = self.in_unit(bucket, |unit| {
            ConsumptionAllocator::deplete(unit, quantity, &self.config)
        })?;
        tracing::info!("分組 {} 扣減數量 {}，涉及 {} 個批次", bucket, quantity, allocations.len());
        Ok(allocations)
    }

    /// 按重量扣減擁有量（原料投入生產）
    pub fn deplete_weight(&self, bucket: &BucketKey, weight: Decimal) -> Result<Vec<LotAllocation>> {
        let allocations = self.in_unit(bucket, |unit| {
            ConsumptionAllocator::deplete_weight(unit, weight, &self.config)
        })?;
        tracing::info!("分組 {} 扣減重量 {}，涉及 {} 個批次", bucket, weight, allocations.len());
        Ok(allocations)
    }

    /// 銷售：同一工作單元內先檢查再扣減
    ///
    /// 檢查不通過時不扣減，回傳檢查結果與空的分配清單。
    pub fn sell(
        &self,
        bucket: &BucketKey,
        quantity: Decimal,
    ) -> Result<(SaleValidation, Vec<LotAllocation>)> {
        self.in_unit(bucket, |unit| {
            let validation = ValidationGuard::validate_sale(unit.lots(), quantity)?;
            if !validation.can_sell {
                return Ok((validation, Vec::new()));
            }
            let allocations = ConsumptionAllocator::deplete(unit, quantity, &self.config)?;
            Ok((validation, allocations))
        })
    }

    /// 取消批次（進貨沖銷）
    pub fn cancel_lot(&self, bucket: &BucketKey, lot_id: LotId) -> Result<OwnershipLot> {
        let lot = self.in_unit(bucket, |unit| {
            let idx = unit
                .position(lot_id)
                .ok_or_else(|| OwnershipError::NotFound(format!("批次 {} 不在分組 {}", lot_id, bucket)))?;
            let lot = unit.lot_mut(idx).ok_or_else(|| {
                OwnershipError::CalculationInconsistency(format!("批次位置 {} 不存在", idx))
            })?;
            lot.deactivate();
            Ok(lot.clone())
        })?;
        tracing::info!("取消批次 {} ({})", lot.id, lot.source_reference);
        Ok(lot)
    }

    /// 銷售前檢查（唯讀）
    pub fn validate_sale(&self, bucket: &BucketKey, quantity: Decimal) -> Result<SaleValidation> {
        ValidationGuard::validate_sale(&self.store.get_lots(bucket)?, quantity)
    }

    /// 分組內的有效批次
    pub fn get_lots(&self, bucket: &BucketKey) -> Result<Vec<OwnershipLot>> {
        self.store.get_lots(bucket)
    }

    /// 分組摘要
    pub fn summary(&self, bucket: &BucketKey) -> Result<BucketSummary> {
        Ok(ValidationGuard::summarize(bucket, &self.store.get_lots(bucket)?))
    }

    pub fn weighted_average_cost(&self, bucket: &BucketKey) -> Result<WeightedAverageCost> {
        CostingEngine::weighted_average(&self.store.get_lots(bucket)?)
    }

    pub fn fifo_cost(&self, bucket: &BucketKey, quantity: Decimal) -> Result<LayeredCost> {
        CostingEngine::fifo(&self.store.get_lots(bucket)?, quantity)
    }

    pub fn lifo_cost(&self, bucket: &BucketKey, quantity: Decimal) -> Result<LayeredCost> {
        CostingEngine::lifo(&self.store.get_lots(bucket)?, quantity)
    }

    /// 按重量的先進先出計價（原料）
    pub fn fifo_weight_cost(&self, bucket: &BucketKey, weight: Decimal) -> Result<LayeredCost> {
        CostingEngine::fifo_by_weight(&self.store.get_lots(bucket)?, weight)
    }

    /// 按重量的後進先出計價（原料）
    pub fn lifo_weight_cost(&self, bucket: &BucketKey, weight: Decimal) -> Result<LayeredCost> {
        CostingEngine::lifo_by_weight(&self.store.get_lots(bucket)?, weight)
    }

    pub fn compare_methods(&self, bucket: &BucketKey, quantity: Decimal) -> Result<CostingComparison> {
        CostingEngine::compare(&self.store.get_lots(bucket)?, quantity, &self.config)
    }

    /// 並行計算多個分組的加權平均成本
    pub fn value_buckets(&self, buckets: &[BucketKey]) -> Vec<(BucketKey, Result<WeightedAverageCost>)> {
        buckets
            .par_iter()
            .map(|bucket| (bucket.clone(), self.weighted_average_cost(bucket)))
            .collect()
    }

    /// 在工作單元內執行操作並提交，版本衝突時重試
    ///
    /// 操作回傳錯誤時直接丟棄工作單元，不會寫入任何修改。
    fn in_unit<T, F>(&self, bucket: &BucketKey, mut op: F) -> Result<T>
    where
        F: FnMut(&mut UnitOfWork) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let mut unit = self.store.begin(bucket)?;
            let output = op(&mut unit)?;

            match self.store.commit(unit) {
                Ok(receipt) => {
                    tracing::debug!(
                        "分組 {} 提交版本 {}，寫入 {} 個批次",
                        receipt.bucket,
                        receipt.version,
                        receipt.lots_written
                    );
                    return Ok(output);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_commit_retries => {
                    attempt += 1;
                    tracing::warn!("分組 {} 提交衝突，第 {} 次重試: {}", bucket, attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
