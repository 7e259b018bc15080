//! Discrepancy classification between observed money and expected payments

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::{Discrepancy, Payment};

/// Dates further apart than this are flagged even when the amounts agree
pub const DATE_MISMATCH_WINDOW_DAYS: i64 = 14;

/// Cent-level tolerance below which amounts are considered equal
pub fn amount_tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Classify the mismatch between an observed transaction and its expectation
///
/// Returns `None` when the observation is consistent with the expectation.
/// Pure and deterministic; the thresholds are fixed policy constants, not
/// configuration.
pub fn classify(
    observed_amount: &BigDecimal,
    observed_date: NaiveDate,
    expectation: Option<&Payment>,
) -> Option<Discrepancy> {
    let payment = match expectation {
        Some(payment) => payment,
        None => {
            return Some(Discrepancy::Unexpected {
                actual_amount: observed_amount.clone(),
            })
        }
    };

    let amount_diff = (&payment.amount - observed_amount).abs();
    if amount_diff > amount_tolerance() {
        if observed_amount < &payment.amount {
            return Some(Discrepancy::Partial {
                expected_amount: payment.amount.clone(),
                actual_amount: observed_amount.clone(),
            });
        }
        return Some(Discrepancy::AmountMismatch {
            expected_amount: payment.amount.clone(),
            actual_amount: observed_amount.clone(),
        });
    }

    let days_apart = (observed_date - payment.due_date).num_days().abs();
    if days_apart > DATE_MISMATCH_WINDOW_DAYS {
        return Some(Discrepancy::DateMismatch);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentStatus;
    use chrono::NaiveDateTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn timestamp() -> NaiveDateTime {
        date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap()
    }

    fn payment_of(amount: BigDecimal, due_date: NaiveDate) -> Payment {
        Payment {
            id: "pay-1".to_string(),
            owner_id: "owner-1".to_string(),
            property_id: "prop-1".to_string(),
            unit_id: None,
            tenant_id: "tenant-1".to_string(),
            amount,
            due_date,
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: timestamp(),
            updated_at: timestamp(),
        }
    }

    #[test]
    fn test_missing_expectation_is_unexpected() {
        let result = classify(&BigDecimal::from(950), date(2024, 3, 1), None);
        assert_eq!(
            result,
            Some(Discrepancy::Unexpected {
                actual_amount: BigDecimal::from(950),
            })
        );
    }

    #[test]
    fn test_shortfall_is_partial() {
        let payment = payment_of(BigDecimal::from(1000), date(2024, 3, 1));
        let result = classify(&BigDecimal::from(950), date(2024, 3, 1), Some(&payment));
        assert_eq!(
            result,
            Some(Discrepancy::Partial {
                expected_amount: BigDecimal::from(1000),
                actual_amount: BigDecimal::from(950),
            })
        );
    }

    #[test]
    fn test_overpayment_is_amount_mismatch() {
        let payment = payment_of(BigDecimal::from(1000), date(2024, 3, 1));
        let result = classify(&BigDecimal::from(1050), date(2024, 3, 1), Some(&payment));
        assert_eq!(
            result,
            Some(Discrepancy::AmountMismatch {
                expected_amount: BigDecimal::from(1000),
                actual_amount: BigDecimal::from(1050),
            })
        );
    }

    #[test]
    fn test_equal_amounts_far_apart_are_date_mismatch() {
        let payment = payment_of(BigDecimal::from(1000), date(2024, 3, 1));

        let result = classify(&BigDecimal::from(1000), date(2024, 3, 21), Some(&payment));
        assert_eq!(result, Some(Discrepancy::DateMismatch));

        // 14 days is inside the window, 15 is out
        let result = classify(&BigDecimal::from(1000), date(2024, 3, 15), Some(&payment));
        assert_eq!(result, None);
        let result = classify(&BigDecimal::from(1000), date(2024, 3, 16), Some(&payment));
        assert_eq!(result, Some(Discrepancy::DateMismatch));
    }

    #[test]
    fn test_close_amount_and_date_is_clean() {
        let payment = payment_of(BigDecimal::from(1000), date(2024, 3, 1));
        let result = classify(&BigDecimal::from(1000), date(2024, 3, 6), Some(&payment));
        assert_eq!(result, None);
    }

    #[test]
    fn test_cent_tolerance_is_inclusive() {
        let payment = payment_of(BigDecimal::from(1000), date(2024, 3, 1));
        // 1000.01 differs by exactly the tolerance, so it is not flagged
        let observed = BigDecimal::from(100001) / BigDecimal::from(100);
        let result = classify(&observed, date(2024, 3, 1), Some(&payment));
        assert_eq!(result, None);

        // one more cent crosses the line
        let observed = BigDecimal::from(100002) / BigDecimal::from(100);
        let result = classify(&observed, date(2024, 3, 1), Some(&payment));
        assert_eq!(
            result.map(|d| d.kind()),
            Some(crate::types::DiscrepancyKind::AmountMismatch)
        );
    }
}
