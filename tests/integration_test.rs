//! 集成測試

use chrono::{DateTime, Duration, TimeZone, Utc};
use ownership::calc::CostingMethod;
use ownership::model::{DepletionClosePolicy, LotKind, PaymentStatus};
use ownership::store::LedgerStore;
use ownership::{BucketKey, InMemoryLedgerStore, NewLot, OwnershipConfig, OwnershipError, OwnershipLedger};
use rstest::rstest;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;

fn supplier_bucket() -> BucketKey {
    BucketKey::new("RING-18K", "BR-01").with_supplier("SUP-GOLDSMITH")
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap() + Duration::days(n)
}

fn credit_lot(reference: &str, at: i64, quantity: i64, cost: Decimal) -> NewLot {
    NewLot::new(supplier_bucket(), LotKind::Product, reference, day(at))
        .with_quantity(Decimal::from(quantity))
        .with_weight(Decimal::from(quantity * 4))
        .with_cost(cost)
}

fn ledger() -> OwnershipLedger<InMemoryLedgerStore> {
    OwnershipLedger::new(InMemoryLedgerStore::new(), OwnershipConfig::default())
}

#[test]
fn test_half_payment_grants_half_ownership() {
    // 場景 A：10 件、成本 1000、未付款，付款 500
    let ledger = ledger();
    let lot = ledger
        .receive_lot(credit_lot("GRN-A1", 1, 10, Decimal::from(1000)))
        .unwrap();

    let allocations = ledger
        .allocate_payment(&supplier_bucket(), Decimal::from(500))
        .unwrap();

    assert_eq!(allocations.len(), 1);
    let l1 = ledger.store().get_lot(lot.id).unwrap();
    assert_eq!(l1.amount_paid, Decimal::from(500));
    assert_eq!(l1.ownership_percentage, Decimal::new(5, 1));
    assert_eq!(l1.owned_quantity, Decimal::from(5));
}

#[test]
fn test_payment_split_by_outstanding() {
    // 場景 B：未付 300 與 700，付款 100 → 30 / 70
    let ledger = ledger();
    ledger
        .receive_lot(credit_lot("GRN-B1", 1, 3, Decimal::from(300)))
        .unwrap();
    ledger
        .receive_lot(credit_lot("GRN-B2", 2, 7, Decimal::from(700)))
        .unwrap();

    let allocations = ledger
        .allocate_payment(&supplier_bucket(), Decimal::from(100))
        .unwrap();

    assert_eq!(allocations[0].source_reference, "GRN-B1");
    assert_eq!(allocations[0].amount, Decimal::from(30));
    assert_eq!(allocations[1].amount, Decimal::from(70));
}

/// 場景 C/D 的分組：L1 擁有 5（較舊），L2 擁有 3（較新）
fn depletion_ledger() -> OwnershipLedger<InMemoryLedgerStore> {
    let ledger = ledger();
    ledger
        .receive_lot(credit_lot("GRN-L2", 5, 3, Decimal::from(360)).fully_owned())
        .unwrap();
    ledger
        .receive_lot(credit_lot("GRN-L1", 1, 5, Decimal::from(500)).fully_owned())
        .unwrap();
    ledger
}

fn owned_by_reference(ledger: &OwnershipLedger<InMemoryLedgerStore>) -> Vec<(String, Decimal)> {
    // 工作單元包含已關閉的批次，依建立時間排序
    let unit = ledger.store().begin(&supplier_bucket()).unwrap();
    unit.lots()
        .iter()
        .map(|l| (l.source_reference.clone(), l.owned_quantity))
        .collect()
}

#[test]
fn test_oldest_lot_depleted_first() {
    // 場景 C：扣減 6 → L1 歸零，L2 剩 2
    let ledger = depletion_ledger();
    ledger.deplete(&supplier_bucket(), Decimal::from(6)).unwrap();

    assert_eq!(
        owned_by_reference(&ledger),
        vec![
            ("GRN-L1".to_string(), Decimal::ZERO),
            ("GRN-L2".to_string(), Decimal::from(2)),
        ]
    );
}

#[test]
fn test_insufficient_ownership_is_all_or_nothing() {
    // 場景 D：扣減 100 → 拒絕，L1/L2 維持 5/3
    let ledger = depletion_ledger();
    let result = ledger.deplete(&supplier_bucket(), Decimal::from(100));

    assert!(matches!(
        result,
        Err(OwnershipError::InsufficientOwnership { .. })
    ));
    assert_eq!(
        owned_by_reference(&ledger),
        vec![
            ("GRN-L1".to_string(), Decimal::from(5)),
            ("GRN-L2".to_string(), Decimal::from(3)),
        ]
    );
}

#[test]
fn test_weighted_average_cost() {
    // 場景 E：5 件 @100 與 3 件 @120 → (500 + 360) / 8 = 107.5
    let ledger = depletion_ledger();
    let result = ledger.weighted_average_cost(&supplier_bucket()).unwrap();

    assert_eq!(result.cost_per_unit, Some(Decimal::new(1075, 1)));
    assert_eq!(result.breakdown.len(), 2);
}

#[rstest]
#[case(Decimal::from(4), true, Decimal::from(400), Decimal::from(460))]
#[case(Decimal::from(7), true, Decimal::from(740), Decimal::from(760))]
#[case(Decimal::from(9), false, Decimal::from(860), Decimal::from(860))]
fn test_fifo_and_lifo_pricing(
    #[case] quantity: Decimal,
    #[case] success: bool,
    #[case] fifo_cost: Decimal,
    #[case] lifo_cost: Decimal,
) {
    let ledger = depletion_ledger();
    let bucket = supplier_bucket();

    let fifo = ledger.fifo_cost(&bucket, quantity).unwrap();
    let lifo = ledger.lifo_cost(&bucket, quantity).unwrap();

    assert_eq!(fifo.success, success);
    assert_eq!(lifo.success, success);
    assert_eq!(fifo.total_cost, fifo_cost);
    assert_eq!(lifo.total_cost, lifo_cost);

    // 計價查詢不扣減
    assert_eq!(
        ledger.summary(&bucket).unwrap().owned_quantity,
        Decimal::from(8)
    );
}

#[test]
fn test_compare_methods_defaults_to_weighted_average() {
    let ledger = depletion_ledger();
    let comparison = ledger
        .compare_methods(&supplier_bucket(), Decimal::from(6))
        .unwrap();

    assert_eq!(
        comparison.recommendation.method,
        CostingMethod::WeightedAverage
    );
    assert_eq!(comparison.fifo.total_cost, Decimal::from(620));
    assert_eq!(comparison.lifo.total_cost, Decimal::from(660));
}

#[test]
fn test_zero_payment_rejected_and_state_unchanged() {
    let ledger = ledger();
    ledger
        .receive_lot(credit_lot("GRN-Z1", 1, 10, Decimal::from(1000)))
        .unwrap();
    let before = ledger.get_lots(&supplier_bucket()).unwrap();

    let result = ledger.allocate_payment(&supplier_bucket(), Decimal::ZERO);

    assert!(matches!(result, Err(OwnershipError::InvalidQuantity(_))));
    assert_eq!(ledger.get_lots(&supplier_bucket()).unwrap(), before);
}

#[test]
fn test_uneven_split_conserves_payment() {
    // 三個未付 50 的批次，付款 100 無法整除
    let ledger = ledger();
    for i in 1..=3 {
        ledger
            .receive_lot(credit_lot(&format!("GRN-U{}", i), i, 1, Decimal::from(50)))
            .unwrap();
    }

    let allocations = ledger
        .allocate_payment(&supplier_bucket(), Decimal::from(100))
        .unwrap();

    let total: Decimal = allocations.iter().map(|a| a.amount).sum();
    assert_eq!(total, Decimal::from(100));
    assert!(allocations
        .iter()
        .all(|a| a.amount == Decimal::new(3333, 2) || a.amount == Decimal::new(3334, 2)));
}

#[test]
fn test_depleted_credit_lot_deactivated_by_default() {
    // 10 件、成本 1000，付 500 後賣出擁有的 5 件
    let ledger = ledger();
    let lot = ledger
        .receive_lot(credit_lot("GRN-D1", 1, 10, Decimal::from(1000)))
        .unwrap();
    ledger.allocate_payment(&supplier_bucket(), Decimal::from(500)).unwrap();

    ledger.deplete(&supplier_bucket(), Decimal::from(5)).unwrap();

    assert!(ledger.get_lots(&supplier_bucket()).unwrap().is_empty());
    let stored = ledger.store().get_lot(lot.id).unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.owned_quantity, Decimal::ZERO);
    assert_eq!(stored.outstanding_amount, Decimal::from(500));

    let summary = ledger.summary(&supplier_bucket()).unwrap();
    assert_eq!(summary.active_lots, 0);
    assert_eq!(summary.outstanding_amount, Decimal::ZERO);
}

#[test]
fn test_when_settled_lifecycle_keeps_invariants() {
    // 進貨 → 部分付款 → 銷售 → 付清 → 再銷售
    let config = OwnershipConfig::default().with_close_policy(DepletionClosePolicy::WhenSettled);
    let ledger = OwnershipLedger::new(InMemoryLedgerStore::new(), config);
    let bucket = supplier_bucket();
    ledger
        .receive_lot(credit_lot("GRN-F1", 1, 10, Decimal::new(123_456, 2)))
        .unwrap();
    ledger
        .receive_lot(credit_lot("GRN-F2", 2, 6, Decimal::new(78_901, 2)))
        .unwrap();

    ledger.allocate_payment(&bucket, Decimal::new(50_000, 2)).unwrap();
    let (validation, _) = ledger.sell(&bucket, Decimal::from(3)).unwrap();
    assert!(validation.can_sell);
    assert!(validation
        .warnings
        .iter()
        .all(|w| w.status == PaymentStatus::PartiallyPaid));

    let outstanding = ledger.summary(&bucket).unwrap().outstanding_amount;
    ledger.allocate_payment(&bucket, outstanding).unwrap();

    let summary = ledger.summary(&bucket).unwrap();
    assert_eq!(summary.outstanding_amount, Decimal::ZERO);
    assert_eq!(summary.fully_paid_lots, 2);
    assert_eq!(summary.owned_quantity, Decimal::from(13));

    let (validation, _) = ledger.sell(&bucket, Decimal::from(13)).unwrap();
    assert!(validation.can_sell);
    assert!(validation.warnings.is_empty());
    assert!(ledger.get_lots(&bucket).unwrap().is_empty());

    for lot in ledger.store().begin(&bucket).unwrap().lots() {
        assert!(lot.check_invariants().is_ok());
        assert!(lot.owned_quantity <= lot.total_quantity);
    }
}

#[test]
fn test_raw_material_consumed_by_weight() {
    let ledger = ledger();
    let bucket = BucketKey::new("GOLD-24K", "BR-01").with_supplier("SUP-REFINERY");
    ledger
        .receive_lot(
            NewLot::new(bucket.clone(), LotKind::RawMaterial, "GRN-R1", day(1))
                .with_weight(Decimal::new(1_000_000, 3))
                .with_cost(Decimal::from(60_000)),
        )
        .unwrap();

    ledger.allocate_payment(&bucket, Decimal::from(30_000)).unwrap();
    let summary = ledger.summary(&bucket).unwrap();
    assert_eq!(summary.owned_weight, Decimal::from(500));
    assert_eq!(summary.owned_quantity, Decimal::ZERO);

    // 部分付款的原料按擁有重量估值
    let valuation = ledger.weighted_average_cost(&bucket).unwrap();
    assert_eq!(valuation.cost_per_unit, None);
    assert_eq!(valuation.total_owned_cost, Decimal::from(30_000));
    assert_eq!(valuation.cost_per_weight_unit, Some(Decimal::from(60)));
    assert_eq!(
        ledger.fifo_weight_cost(&bucket, Decimal::from(100)).unwrap().total_cost,
        Decimal::from(6_000)
    );

    ledger.deplete_weight(&bucket, Decimal::from(200)).unwrap();
    assert_eq!(
        ledger.summary(&bucket).unwrap().owned_weight,
        Decimal::from(300)
    );

    assert!(matches!(
        ledger.deplete_weight(&bucket, Decimal::from(301)),
        Err(OwnershipError::InsufficientOwnership { .. })
    ));
}

#[test]
fn test_self_owned_stock_needs_no_payment() {
    let ledger = ledger();
    let bucket = BucketKey::new("CHAIN-21K", "BR-02");
    ledger
        .receive_lot(
            NewLot::new(bucket.clone(), LotKind::Product, "SYS-OPENING", day(0))
                .with_quantity(Decimal::from(12))
                .with_weight(Decimal::from(60))
                .with_cost(Decimal::from(24_000))
                .fully_owned(),
        )
        .unwrap();

    let validation = ledger.validate_sale(&bucket, Decimal::from(12)).unwrap();
    assert!(validation.can_sell);
    assert!(validation.warnings.is_empty());
    assert!(matches!(
        ledger.allocate_payment(&bucket, Decimal::ONE),
        Err(OwnershipError::NotFound(_))
    ));
}

#[test]
fn test_concurrent_payments_on_same_bucket_are_serialized() {
    let config = OwnershipConfig::default().with_max_commit_retries(10_000);
    let ledger = Arc::new(OwnershipLedger::new(InMemoryLedgerStore::new(), config));
    ledger
        .receive_lot(credit_lot("GRN-C1", 1, 10, Decimal::from(1000)))
        .unwrap();
    ledger
        .receive_lot(credit_lot("GRN-C2", 2, 10, Decimal::from(1000)))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for _ in 0..5 {
                    ledger
                        .allocate_payment(&supplier_bucket(), Decimal::from(10))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let summary = ledger.summary(&supplier_bucket()).unwrap();
    assert_eq!(summary.amount_paid, Decimal::from(400));
    assert_eq!(summary.outstanding_amount, Decimal::from(1600));
    assert_eq!(summary.owned_quantity, Decimal::from(4));
}

#[test]
fn test_buckets_are_independent() {
    let ledger = ledger();
    let other = BucketKey::new("RING-18K", "BR-01").with_supplier("SUP-OTHER");
    ledger
        .receive_lot(credit_lot("GRN-1", 1, 10, Decimal::from(1000)))
        .unwrap();
    ledger
        .receive_lot(
            NewLot::new(other.clone(), LotKind::Product, "GRN-X", day(1))
                .with_quantity(Decimal::from(5))
                .with_cost(Decimal::from(500)),
        )
        .unwrap();

    ledger.allocate_payment(&other, Decimal::from(500)).unwrap();

    assert_eq!(
        ledger.summary(&supplier_bucket()).unwrap().amount_paid,
        Decimal::ZERO
    );
    assert_eq!(ledger.summary(&other).unwrap().owned_quantity, Decimal::from(5));
    assert_eq!(ledger.store().bucket_keys().unwrap().len(), 2);
}
