//! 記憶體帳本儲存

use std::collections::HashMap;
use std::sync::RwLock;

use ownership_core::{BucketKey, LotId, NewLot, OwnershipError, OwnershipLot, Result};

use crate::{CommitReceipt, LedgerStore, UnitOfWork};

#[derive(Debug, Default)]
struct BucketRecord {
    version: u64,
    lots: Vec<OwnershipLot>,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: HashMap<BucketKey, BucketRecord>,
    lot_index: HashMap<LotId, BucketKey>,
    next_sequence: u64,
}

/// 記憶體帳本儲存
///
/// 每個分組有獨立版本號；不同分組之間互不影響。適用於測試與單機部署。
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> OwnershipError {
        OwnershipError::Storage("lock poisoned".to_string())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_lot(&self, request: NewLot) -> Result<OwnershipLot> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        let sequence = inner.next_sequence + 1;
        let lot = OwnershipLot::from_receipt(request, sequence)?;
        inner.next_sequence = sequence;

        inner.lot_index.insert(lot.id, lot.bucket.clone());
        let record = inner.buckets.entry(lot.bucket.clone()).or_default();
        record.lots.push(lot.clone());
        record.version += 1;

        tracing::debug!(
            "新增批次 {} ({}) 至分組 {}，版本 {}",
            lot.id,
            lot.source_reference,
            lot.bucket,
            record.version
        );

        Ok(lot)
    }

    fn begin(&self, bucket: &BucketKey) -> Result<UnitOfWork> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let record = inner
            .buckets
            .get(bucket)
            .ok_or_else(|| OwnershipError::NotFound(format!("分組 {} 沒有任何批次", bucket)))?;

        Ok(UnitOfWork::new(
            bucket.clone(),
            record.version,
            record.lots.clone(),
        ))
    }

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt> {
        let (bucket, expected, changed) = unit.into_changes();

        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let record = inner
            .buckets
            .get_mut(&bucket)
            .ok_or_else(|| OwnershipError::NotFound(format!("分組 {} 沒有任何批次", bucket)))?;

        if record.version != expected {
            tracing::warn!(
                "分組 {} 提交衝突：預期版本 {}, 實際版本 {}",
                bucket,
                expected,
                record.version
            );
            return Err(OwnershipError::ConcurrencyConflict {
                expected,
                found: record.version,
            });
        }

        if changed.is_empty() {
            return Ok(CommitReceipt {
                bucket,
                version: record.version,
                lots_written: 0,
            });
        }

        // 先確認全部批次都屬於此分組，再一次寫入
        let mut positions = Vec::with_capacity(changed.len());
        for lot in &changed {
            let pos = record
                .lots
                .iter()
                .position(|stored| stored.id == lot.id && lot.bucket == bucket)
                .ok_or_else(|| {
                    OwnershipError::Storage(format!("批次 {} 不屬於分組 {}", lot.id, bucket))
                })?;
            positions.push(pos);
        }

        let lots_written = changed.len();
        for (pos, lot) in positions.into_iter().zip(changed) {
            record.lots[pos] = lot;
        }
        record.version += 1;

        Ok(CommitReceipt {
            bucket,
            version: record.version,
            lots_written,
        })
    }

    fn get_lots(&self, bucket: &BucketKey) -> Result<Vec<OwnershipLot>> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut lots: Vec<_> = inner
            .buckets
            .get(bucket)
            .map(|record| record.lots.iter().filter(|lot| lot.is_active).cloned().collect())
            .unwrap_or_default();
        lots.sort_by(|a, b| a.cmp_by_age(b));
        Ok(lots)
    }

    fn get_lot(&self, lot_id: LotId) -> Result<OwnershipLot> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        inner
            .lot_index
            .get(&lot_id)
            .and_then(|bucket| inner.buckets.get(bucket))
            .and_then(|record| record.lots.iter().find(|lot| lot.id == lot_id))
            .cloned()
            .ok_or_else(|| OwnershipError::NotFound(format!("批次 {}", lot_id)))
    }

    fn bucket_keys(&self) -> Result<Vec<BucketKey>> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut keys: Vec<_> = inner.buckets.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
