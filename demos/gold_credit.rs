//! 賒購金飾所有權示例

use chrono::{TimeZone, Utc};
use ownership::model::{ownership_percent, LotKind};
use ownership::{BucketKey, InMemoryLedgerStore, NewLot, OwnershipConfig, OwnershipLedger};
use rust_decimal::Decimal;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== 賒購金飾所有權示例 ===\n");

    let ledger = OwnershipLedger::new(InMemoryLedgerStore::new(), OwnershipConfig::default());
    let bucket = BucketKey::new("RING-18K", "BR-01").with_supplier("SUP-GOLDSMITH");

    // 兩批賒購進貨
    for (reference, day, quantity, cost) in [("GRN-001", 1, 5, 500), ("GRN-002", 8, 3, 360)] {
        ledger.receive_lot(
            NewLot::new(
                bucket.clone(),
                LotKind::Product,
                reference,
                Utc.with_ymd_and_hms(2025, 6, day, 10, 0, 0)
                    .single()
                    .ok_or_else(|| anyhow::anyhow!("無效日期"))?,
            )
            .with_quantity(Decimal::from(quantity))
            .with_weight(Decimal::from(quantity * 4))
            .with_cost(Decimal::from(cost)),
        )?;
    }

    // 付款分攤
    let allocations = ledger.allocate_payment(&bucket, Decimal::from(430))?;
    println!("付款 430 分攤:");
    for a in &allocations {
        println!(
            "  - {}: 金額 {}, 新增擁有 {} 件, 擁有比例 {}%",
            a.source_reference,
            a.amount,
            a.quantity,
            ownership_percent(a.ownership_percentage)
        );
    }

    // 銷售
    let (validation, sold) = ledger.sell(&bucket, Decimal::from(3))?;
    println!("\n銷售 3 件: {}", validation.message);
    for w in &validation.warnings {
        println!("  ! {}", w.message);
    }
    for a in &sold {
        println!("  - {} 扣減 {} 件", a.source_reference, a.quantity);
    }

    // 成本法比較
    let comparison = ledger.compare_methods(&bucket, Decimal::ONE)?;
    if let Some(cost) = comparison
        .weighted_average
        .as_ref()
        .and_then(|avg| avg.cost_per_unit)
    {
        println!("\n加權平均單位成本: {}", cost.round_dp(2));
    }
    println!("FIFO 1 件成本: {}", comparison.fifo.total_cost);
    println!("LIFO 1 件成本: {}", comparison.lifo.total_cost);
    println!(
        "建議: {:?}（{}）",
        comparison.recommendation.method, comparison.recommendation.reason
    );

    let summary = ledger.summary(&bucket)?;
    println!(
        "\n分組 {}: 擁有 {} 件, 未付 {}, 擁有比例 {}%",
        summary.bucket,
        summary.owned_quantity,
        summary.outstanding_amount,
        ownership_percent(summary.ownership_ratio)
    );

    Ok(())
}
