//! Reconciliation reporting

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Default overdue threshold for the missing-payment report, in days
pub const DEFAULT_MISSING_PAYMENT_DAYS: i64 = 7;

/// Count and amount rolled up for one transaction status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub count: usize,
    pub total_amount: BigDecimal,
}

/// Reconciliation position over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    /// Principal the summary was computed for
    pub owner_id: String,
    /// Trailing window length in days
    pub period_days: i64,
    /// Transactions inside the window
    pub total_transactions: usize,
    /// Per-status counts and amounts
    pub by_status: HashMap<TransactionStatus, StatusBreakdown>,
    /// Open discrepancy counts by kind
    pub discrepancies: HashMap<DiscrepancyKind, usize>,
    /// Share of transactions sitting in `Matched` or `PartialMatch`
    pub match_rate: f64,
}

/// A pending payment that should have arrived by now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingPayment {
    pub payment: Payment,
    pub days_overdue: i64,
}

/// Money observed against money expected over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub owner_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Imported transactions dated inside the range
    pub transaction_count: usize,
    pub transaction_total: BigDecimal,
    /// Payments completed inside the range
    pub expected_count: usize,
    pub expected_total: BigDecimal,
    /// `transaction_total - expected_total`
    pub variance: BigDecimal,
}

/// Fold a window of transactions into a summary
pub fn summarize(
    owner_id: &str,
    period_days: i64,
    transactions: &[BankTransaction],
) -> ReconciliationSummary {
    let mut by_status: HashMap<TransactionStatus, StatusBreakdown> = HashMap::new();
    let mut discrepancies: HashMap<DiscrepancyKind, usize> = HashMap::new();
    let mut matched = 0usize;

    for txn in transactions {
        let entry = by_status.entry(txn.status).or_insert_with(|| StatusBreakdown {
            count: 0,
            total_amount: BigDecimal::from(0),
        });
        entry.count += 1;
        entry.total_amount += &txn.amount;

        if let Some(discrepancy) = &txn.discrepancy {
            *discrepancies.entry(discrepancy.kind()).or_insert(0) += 1;
        }

        if matches!(
            txn.status,
            TransactionStatus::Matched | TransactionStatus::PartialMatch
        ) {
            matched += 1;
        }
    }

    let match_rate = if transactions.is_empty() {
        0.0
    } else {
        matched as f64 / transactions.len() as f64
    };

    ReconciliationSummary {
        owner_id: owner_id.to_string(),
        period_days,
        total_transactions: transactions.len(),
        by_status,
        discrepancies,
        match_rate,
    }
}

/// Select pending payments overdue by strictly more than `days_overdue` days
///
/// A payment due exactly `days_overdue` days ago is not missing yet; the
/// report lists the most overdue first.
pub fn missing_payments(
    payments: &[Payment],
    today: NaiveDate,
    days_overdue: i64,
) -> Vec<MissingPayment> {
    let mut missing: Vec<MissingPayment> = payments
        .iter()
        .filter(|payment| payment.status == PaymentStatus::Pending)
        .filter_map(|payment| {
            let days = (today - payment.due_date).num_days();
            (days > days_overdue).then(|| MissingPayment {
                payment: payment.clone(),
                days_overdue: days,
            })
        })
        .collect();
    missing.sort_by(|a, b| {
        b.days_overdue
            .cmp(&a.days_overdue)
            .then_with(|| a.payment.id.cmp(&b.payment.id))
    });
    missing
}

/// Compare observed transactions against completed payments for a range
pub fn variance(
    owner_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    transactions: &[BankTransaction],
    completed: &[Payment],
) -> VarianceReport {
    let transaction_total: BigDecimal = transactions.iter().map(|txn| &txn.amount).sum();
    let expected_total: BigDecimal = completed.iter().map(|payment| &payment.amount).sum();
    let variance = &transaction_total - &expected_total;

    VarianceReport {
        owner_id: owner_id.to_string(),
        start,
        end,
        transaction_count: transactions.len(),
        transaction_total,
        expected_count: completed.len(),
        expected_total,
        variance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn transaction(external_id: &str, amount: i64) -> BankTransaction {
        let raw = RawTransaction {
            external_id: external_id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            amount: BigDecimal::from(amount),
            description: "Deposit".to_string(),
            payer_name: None,
            reference: None,
        };
        BankTransaction::from_import("owner-1", "acct-1", raw, fixed_now())
    }

    fn payment(id: &str, amount: i64, due: NaiveDate) -> Payment {
        Payment {
            id: id.to_string(),
            owner_id: "owner-1".to_string(),
            property_id: "prop-1".to_string(),
            unit_id: None,
            tenant_id: "tenant-1".to_string(),
            amount: BigDecimal::from(amount),
            due_date: due,
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn test_summarize_folds_counts_amounts_and_discrepancies() {
        let mut matched = transaction("FEED-1", 1000);
        matched.record_match("pay-1", 100, None, "system", fixed_now());

        let mut partial = transaction("FEED-2", 950);
        partial.record_match(
            "pay-2",
            95,
            Some(Discrepancy::Partial {
                expected_amount: BigDecimal::from(1000),
                actual_amount: BigDecimal::from(950),
            }),
            "system",
            fixed_now(),
        );

        let mut unmatched = transaction("FEED-3", 500);
        unmatched.clear_match(
            Some(Discrepancy::Unexpected {
                actual_amount: BigDecimal::from(500),
            }),
            fixed_now(),
        );

        let mut written_off = transaction("FEED-4", 25);
        written_off.record_write_off("bank fee", "owner-1", fixed_now());

        let summary = summarize(
            "owner-1",
            30,
            &[matched, partial, unmatched, written_off],
        );

        assert_eq!(summary.total_transactions, 4);
        assert_eq!(summary.match_rate, 0.5);

        let matched_row = &summary.by_status[&TransactionStatus::Matched];
        assert_eq!(matched_row.count, 1);
        assert_eq!(matched_row.total_amount, BigDecimal::from(1000));

        let partial_row = &summary.by_status[&TransactionStatus::PartialMatch];
        assert_eq!(partial_row.count, 1);
        assert_eq!(partial_row.total_amount, BigDecimal::from(950));

        assert_eq!(summary.discrepancies[&DiscrepancyKind::Partial], 1);
        assert_eq!(summary.discrepancies[&DiscrepancyKind::Unexpected], 2);
        assert!(!summary.discrepancies.contains_key(&DiscrepancyKind::DateMismatch));
    }

    #[test]
    fn test_summarize_handles_an_empty_window() {
        let summary = summarize("owner-1", 30, &[]);

        assert_eq!(summary.total_transactions, 0);
        assert_eq!(summary.match_rate, 0.0);
        assert!(summary.by_status.is_empty());
        assert!(summary.discrepancies.is_empty());
    }

    #[test]
    fn test_missing_payments_threshold_is_strict() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let payments = vec![
            // Exactly 7 days overdue: not missing yet
            payment("pay-1", 1000, NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()),
            // 8 days overdue
            payment("pay-2", 900, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()),
            // 30 days overdue
            payment("pay-3", 800, NaiveDate::from_ymd_opt(2024, 2, 19).unwrap()),
        ];

        let missing = missing_payments(&payments, today, DEFAULT_MISSING_PAYMENT_DAYS);

        let ids: Vec<&str> = missing.iter().map(|m| m.payment.id.as_str()).collect();
        assert_eq!(ids, vec!["pay-3", "pay-2"]);
        assert_eq!(missing[0].days_overdue, 30);
        assert_eq!(missing[1].days_overdue, 8);
    }

    #[test]
    fn test_missing_payments_skips_completed_ones() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let mut completed = payment("pay-1", 1000, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        completed.mark_completed(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), fixed_now());

        let missing = missing_payments(&[completed], today, DEFAULT_MISSING_PAYMENT_DAYS);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_variance_subtracts_expected_from_observed() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();

        let transactions = vec![transaction("FEED-1", 1000), transaction("FEED-2", 500)];
        let mut paid = payment("pay-1", 1000, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        paid.mark_completed(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(), fixed_now());

        let report = variance("owner-1", start, end, &transactions, &[paid]);

        assert_eq!(report.transaction_count, 2);
        assert_eq!(report.transaction_total, BigDecimal::from(1500));
        assert_eq!(report.expected_count, 1);
        assert_eq!(report.expected_total, BigDecimal::from(1000));
        assert_eq!(report.variance, BigDecimal::from(500));
    }
}
