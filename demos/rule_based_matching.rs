//! Rule-driven matching example

use reconciliation_core::utils::{EnhancedImportValidator, MemoryStore};
use reconciliation_core::{
    FixedClock, ImportItemResult, MatchingEngine, NewRule, Payment, PaymentStatus, PaymentStore,
    RawTransaction, Reconciler, RuleActions, RuleConditions,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::sync::Arc;

fn expected_payment(id: &str, amount: i64, property_id: &str, tenant_id: &str) -> Payment {
    let due = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    let created = due.and_hms_opt(0, 0, 0).unwrap();
    Payment {
        id: id.to_string(),
        owner_id: "landlord-42".to_string(),
        property_id: property_id.to_string(),
        unit_id: None,
        tenant_id: tenant_id.to_string(),
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
    println!("🧮 Reconciliation Core - Rule Based Matching Example\n");

    let clock = Arc::new(FixedClock(
        NaiveDate::from_ymd_opt(2024, 4, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
    ));

    // Two identical rents on different properties plus a utility bill
    let mut store = MemoryStore::new();
    store.insert_payment(expected_payment("pay-101", 1500, "prop-a", "tenant-alice"));
    store.insert_payment(expected_payment("pay-102", 1500, "prop-b", "tenant-bob"));
    store.insert_payment(expected_payment("pay-utility", 230, "prop-a", "tenant-alice"));

    let mut reconciler = Reconciler::with_components(
        store.clone(),
        MatchingEngine::default(),
        Box::new(EnhancedImportValidator),
        clock,
    );

    // 1. Author the matching rules
    println!("📏 Creating matching rules...");

    // Alice pays by name; the tenant restriction disambiguates the twin rents
    let alice_rule = reconciler
        .create_rule(
            "landlord-42",
            NewRule {
                name: "Alice rent by payer".to_string(),
                priority: 5,
                is_active: true,
                conditions: RuleConditions {
                    description_pattern: Some(r"rent".to_string()),
                    payer_pattern: Some(r"alice".to_string()),
                    ..RuleConditions::default()
                },
                actions: RuleActions {
                    tenant_id: Some("tenant-alice".to_string()),
                    category: Some("rent".to_string()),
                    auto_match: true,
                    tolerance: BigDecimal::from(100),
                    ..RuleActions::default()
                },
            },
        )
        .await?;
    println!("  ✓ {} (priority {})", alice_rule.name, alice_rule.priority);

    let utility_rule = reconciler
        .create_rule(
            "landlord-42",
            NewRule {
                name: "Utility bills".to_string(),
                priority: 10,
                is_active: true,
                conditions: RuleConditions {
                    description_pattern: Some(r"power|utilities".to_string()),
                    ..RuleConditions::default()
                },
                actions: RuleActions {
                    category: Some("utilities".to_string()),
                    auto_match: true,
                    tolerance: BigDecimal::from(20),
                    ..RuleActions::default()
                },
            },
        )
        .await?;
    println!("  ✓ {} (priority {})", utility_rule.name, utility_rule.priority);

    // A pattern that does not compile never reaches the store
    let rejected = reconciler
        .create_rule(
            "landlord-42",
            NewRule {
                name: "Broken".to_string(),
                priority: 1,
                is_active: true,
                conditions: RuleConditions {
                    description_pattern: Some(r"rent[".to_string()),
                    ..RuleConditions::default()
                },
                actions: RuleActions::default(),
            },
        )
        .await;
    if let Err(err) = rejected {
        println!("  ✗ rejected: {}", err);
    }

    // 2. Import a feed and watch the rules work
    println!("\n📥 Importing the bank feed...");
    let report = reconciler
        .import_transactions(
            "landlord-42",
            "acct-main",
            vec![
                RawTransaction {
                    external_id: "FEED-A".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                    amount: BigDecimal::from(1450),
                    description: "Monthly rent".to_string(),
                    payer_name: Some("ALICE J".to_string()),
                    reference: None,
                },
                RawTransaction {
                    external_id: "FEED-B".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 4, 3).unwrap(),
                    amount: BigDecimal::from(1500),
                    description: "Monthly rent transfer".to_string(),
                    payer_name: None,
                    reference: None,
                },
                RawTransaction {
                    external_id: "FEED-C".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 4, 6).unwrap(),
                    amount: BigDecimal::from(245),
                    description: "City power utilities".to_string(),
                    payer_name: None,
                    reference: None,
                },
                RawTransaction {
                    external_id: "FEED-D".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 4, 7).unwrap(),
                    amount: BigDecimal::from(95),
                    description: "Gym membership refund".to_string(),
                    payer_name: None,
                    reference: None,
                },
            ],
        )
        .await?;

    for result in &report.results {
        match result {
            ImportItemResult::Imported {
                transaction_id,
                status,
                confidence,
                strategy,
            } => {
                let transaction = reconciler
                    .get_transaction("landlord-42", transaction_id)
                    .await?
                    .expect("transaction was just imported");
                println!(
                    "  ✓ {} ({}) -> {:?} via {} at confidence {}, category {:?}",
                    transaction.external_id,
                    transaction.description,
                    status,
                    strategy,
                    confidence,
                    transaction.category
                );
            }
            ImportItemResult::Duplicate { transaction_id } => {
                println!("  ↻ already imported as {}", transaction_id)
            }
        }
    }

    // Alice's short payment went to her own expectation, not Bob's twin
    println!("\n👥 Twin rents stayed on their own tenants:");
    for payment_id in ["pay-101", "pay-102"] {
        let payment = store
            .get_payment(payment_id)
            .await?
            .expect("seeded above");
        println!(
            "  {} ({}): {:?}",
            payment.id, payment.tenant_id, payment.status
        );
    }

    // 3. Rules remain editable after the fact
    println!("\n📜 Active rules in evaluation order:");
    for rule in reconciler.list_rules("landlord-42").await? {
        println!("  {} (priority {})", rule.name, rule.priority);
    }

    reconciler
        .delete_rule("landlord-42", &utility_rule.id)
        .await?;
    println!("\n🗑  Deleted '{}'", utility_rule.name);
    println!(
        "  {} rule(s) remain",
        reconciler.list_rules("landlord-42").await?.len()
    );

    println!("\n🎉 Example completed successfully!");
    Ok(())
}
