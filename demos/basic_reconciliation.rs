//! Basic reconciliation usage example

use reconciliation_core::utils::{EnhancedImportValidator, MemoryStore};
use reconciliation_core::{
    FixedClock, ImportItemResult, MatchingEngine, Payment, PaymentStatus, RawTransaction,
    Reconciler,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::sync::Arc;

fn expected_payment(id: &str, amount: i64, due: NaiveDate) -> Payment {
    let created = due.and_hms_opt(0, 0, 0).unwrap();
    Payment {
        id: id.to_string(),
        owner_id: "landlord-42".to_string(),
        property_id: "maple-street-12".to_string(),
        unit_id: None,
        tenant_id: format!("tenant-{}", id),
        amount: BigDecimal::from(amount),
        due_date: due,
        status: PaymentStatus::Pending,
        paid_at: None,
        created_at: created,
        updated_at: created,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🏦 Reconciliation Core - Basic Reconciliation Example\n");

    // A pinned clock keeps the walkthrough reproducible
    let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
    let clock = Arc::new(FixedClock(today.and_hms_opt(9, 0, 0).unwrap()));

    // Expected rent for March, as the payment subsystem would record it
    let mut store = MemoryStore::new();
    store.insert_payment(expected_payment(
        "unit-1",
        1200,
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
    ));
    store.insert_payment(expected_payment(
        "unit-2",
        800,
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
    ));
    store.insert_payment(expected_payment(
        "unit-3",
        950,
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
    ));
    store.insert_payment(expected_payment(
        "unit-4",
        700,
        NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
    ));

    let mut reconciler = Reconciler::with_components(
        store,
        MatchingEngine::default(),
        Box::new(EnhancedImportValidator),
        clock,
    );

    // 1. Import the bank feed
    println!("📥 Importing the bank feed...");
    let report = reconciler
        .import_transactions(
            "landlord-42",
            "acct-main",
            vec![
                RawTransaction {
                    external_id: "FEED-1001".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
                    amount: BigDecimal::from(1200),
                    description: "Rent March unit 1".to_string(),
                    payer_name: Some("M. Okafor".to_string()),
                    reference: None,
                },
                RawTransaction {
                    external_id: "FEED-1002".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
                    amount: BigDecimal::from(798),
                    description: "Rent transfer unit 2".to_string(),
                    payer_name: None,
                    reference: Some("REF-5521".to_string()),
                },
                RawTransaction {
                    external_id: "FEED-1003".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
                    amount: BigDecimal::from(2500),
                    description: "Unknown wire transfer".to_string(),
                    payer_name: None,
                    reference: None,
                },
                RawTransaction {
                    external_id: "FEED-1004".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
                    amount: BigDecimal::from(950),
                    description: "Transfer ref 223".to_string(),
                    payer_name: None,
                    reference: None,
                },
            ],
        )
        .await?;

    println!(
        "  Imported {} transactions, {} duplicates\n",
        report.imported_count, report.duplicate_count
    );
    for result in &report.results {
        match result {
            ImportItemResult::Imported {
                transaction_id,
                status,
                confidence,
                strategy,
            } => println!(
                "  ✓ {} -> {:?} (confidence {}, strategy {})",
                transaction_id, status, confidence, strategy
            ),
            ImportItemResult::Duplicate { transaction_id } => {
                println!("  ↻ already imported as {}", transaction_id)
            }
        }
    }

    // 2. An operator resolves what automation could not
    println!("\n🔎 Resolving the leftovers by hand...");

    // The 950 transfer is unit 3 paying weeks late, outside every date window
    let late_rent_id = imported_id(&report.results[3]);
    let matched = reconciler
        .manual_match(
            "landlord-42",
            &late_rent_id,
            "unit-3",
            Some("late February rent, confirmed with tenant".to_string()),
        )
        .await?;
    println!(
        "  ✓ Matched {} to unit-3 (discrepancy: {:?})",
        late_rent_id, matched.discrepancy
    );

    // The unknown wire will never reconcile against rent
    let unknown_wire_id = imported_id(&report.results[2]);
    reconciler
        .write_off(
            "landlord-42",
            &unknown_wire_id,
            "one-off deposit, tracked outside rent",
        )
        .await?;
    println!("  ✓ Wrote off {}", unknown_wire_id);

    // 3. Reports
    println!("\n📊 Summary for the trailing 30 days:");
    let summary = reconciler.get_summary("landlord-42", 30).await?;
    println!("  Transactions: {}", summary.total_transactions);
    println!("  Match rate:   {:.0}%", summary.match_rate * 100.0);
    for (status, row) in &summary.by_status {
        println!("    {:?}: {} totalling ${}", status, row.count, row.total_amount);
    }
    for (kind, count) in &summary.discrepancies {
        println!("    flagged {}: {}", kind, count);
    }

    println!("\n⏰ Missing payments (default grace window):");
    let missing = reconciler.get_missing_payments("landlord-42", None).await?;
    for item in &missing {
        println!(
            "  {} for ${} is {} days overdue",
            item.payment.id, item.payment.amount, item.days_overdue
        );
    }

    println!("\n💹 Variance for March:");
    let variance = reconciler
        .get_report(
            "landlord-42",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .await?;
    println!("  Observed:  ${}", variance.transaction_total);
    println!("  Expected:  ${}", variance.expected_total);
    println!("  Variance:  ${}", variance.variance);

    println!("\n🎉 Example completed successfully!");
    Ok(())
}

fn imported_id(result: &ImportItemResult) -> String {
    match result {
        ImportItemResult::Imported { transaction_id, .. } => transaction_id.clone(),
        ImportItemResult::Duplicate { transaction_id } => transaction_id.clone(),
    }
}
