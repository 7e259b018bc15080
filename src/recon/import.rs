//! Bank feed import and automatic matching

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::matching::classify::classify;
use crate::matching::engine::{MatchStrategy, MatchingEngine};
use crate::traits::*;
use crate::types::*;

/// Operator recorded on matches applied automatically during import
pub const SYSTEM_OPERATOR: &str = "system";

/// Outcome of one imported feed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportItemResult {
    /// The item was new and has been persisted
    Imported {
        transaction_id: String,
        status: TransactionStatus,
        confidence: u8,
        strategy: MatchStrategy,
    },
    /// The item was already imported for this account
    Duplicate { transaction_id: String },
}

/// Summary of one import batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Items persisted as new transactions
    pub imported_count: usize,
    /// Items skipped because the bank row was already known
    pub duplicate_count: usize,
    /// Per-item outcomes, in input order
    pub results: Vec<ImportItemResult>,
}

/// Manager for feed imports and the automatic half of the lifecycle
pub struct ImportManager<S: ReconStore> {
    pub(crate) store: S,
    engine: MatchingEngine,
    validator: Box<dyn ImportValidator>,
    clock: Arc<dyn Clock>,
}

impl<S: ReconStore> ImportManager<S> {
    /// Create a new import manager
    pub fn new(store: S) -> Self {
        Self {
            store,
            engine: MatchingEngine::default(),
            validator: Box::new(DefaultImportValidator),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create an import manager with a custom validator
    pub fn with_validator(store: S, validator: Box<dyn ImportValidator>) -> Self {
        Self {
            store,
            engine: MatchingEngine::default(),
            validator,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create an import manager with injected components
    pub fn with_components(
        store: S,
        engine: MatchingEngine,
        validator: Box<dyn ImportValidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            engine,
            validator,
            clock,
        }
    }

    /// Import a batch of feed items for one source account
    ///
    /// The whole batch is validated before any store access, so a malformed
    /// item rejects the batch without persisting its neighbours. Re-importing
    /// an overlapping feed is safe: known rows come back as `Duplicate`.
    pub async fn import(
        &mut self,
        owner_id: &str,
        account_id: &str,
        items: Vec<RawTransaction>,
    ) -> ReconResult<ImportReport> {
        // Validate every item before touching the store
        for raw in &items {
            self.validator.validate_raw(raw)?;
        }

        let mut report = ImportReport {
            imported_count: 0,
            duplicate_count: 0,
            results: Vec::with_capacity(items.len()),
        };

        for raw in items {
            let result = self.import_one(owner_id, account_id, raw).await?;
            match &result {
                ImportItemResult::Imported { .. } => report.imported_count += 1,
                ImportItemResult::Duplicate { .. } => report.duplicate_count += 1,
            }
            report.results.push(result);
        }

        log::info!(
            "Imported {} transactions for account {} ({} duplicates)",
            report.imported_count,
            account_id,
            report.duplicate_count
        );

        Ok(report)
    }

    async fn import_one(
        &mut self,
        owner_id: &str,
        account_id: &str,
        raw: RawTransaction,
    ) -> ReconResult<ImportItemResult> {
        // Fast path for rows we have already seen
        if let Some(existing) = self
            .store
            .find_transaction_by_external_id(account_id, &raw.external_id)
            .await?
        {
            return Ok(ImportItemResult::Duplicate {
                transaction_id: existing.id,
            });
        }

        let mut transaction =
            BankTransaction::from_import(owner_id, account_id, raw, self.clock.now());

        // Candidates below the acceptance bar are discarded, not recorded
        let candidate = self
            .engine
            .find_match(&self.store, &transaction)
            .await?
            .filter(|candidate| self.engine.auto_accepts(candidate));

        let result = match candidate {
            Some(candidate) => {
                let now = self.clock.now();
                let discrepancy =
                    classify(&transaction.amount, transaction.date, Some(&candidate.payment));
                if let Some(directive) = &candidate.directive {
                    transaction.category = directive.category.clone();
                }
                transaction.record_match(
                    &candidate.payment.id,
                    candidate.confidence,
                    discrepancy,
                    SYSTEM_OPERATOR,
                    now,
                );

                let mut payment = candidate.payment;
                payment.mark_completed(transaction.date, now);

                match self
                    .store
                    .commit_match(&transaction, &payment, PaymentStatus::Pending)
                    .await
                {
                    Ok(()) => ImportItemResult::Imported {
                        transaction_id: transaction.id,
                        status: transaction.status,
                        confidence: transaction.match_confidence,
                        strategy: candidate.strategy,
                    },
                    Err(err) => return self.remap_conflict(account_id, &transaction, err).await,
                }
            }
            None => {
                let discrepancy = classify(&transaction.amount, transaction.date, None);
                transaction.clear_match(discrepancy, self.clock.now());

                match self.store.insert_transaction(&transaction).await {
                    Ok(()) => ImportItemResult::Imported {
                        transaction_id: transaction.id,
                        status: transaction.status,
                        confidence: 0,
                        strategy: MatchStrategy::None,
                    },
                    Err(err) => return self.remap_conflict(account_id, &transaction, err).await,
                }
            }
        };

        Ok(result)
    }

    /// Decide whether a store conflict means "duplicate feed row"
    ///
    /// A `Conflict` during import can be a concurrent import of the same row
    /// or a payment consumed by a concurrent match. Only the first reads as a
    /// duplicate; the second stays a retryable error.
    async fn remap_conflict(
        &self,
        account_id: &str,
        transaction: &BankTransaction,
        err: ReconError,
    ) -> ReconResult<ImportItemResult> {
        if matches!(err, ReconError::Conflict(_)) {
            if let Some(existing) = self
                .store
                .find_transaction_by_external_id(account_id, &transaction.external_id)
                .await?
            {
                return Ok(ImportItemResult::Duplicate {
                    transaction_id: existing.id,
                });
            }
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_store::MemoryStore;
    use crate::utils::validation::EnhancedImportValidator;
    use bigdecimal::BigDecimal;
    use chrono::{NaiveDate, NaiveDateTime};

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn raw_item(external_id: &str, amount: i64, description: &str) -> RawTransaction {
        RawTransaction {
            external_id: external_id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            amount: BigDecimal::from(amount),
            description: description.to_string(),
            payer_name: None,
            reference: None,
        }
    }

    fn pending_payment(id: &str, amount: i64, due: NaiveDate) -> Payment {
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

    fn manager_with(store: MemoryStore) -> ImportManager<MemoryStore> {
        ImportManager::with_components(
            store,
            MatchingEngine::default(),
            Box::new(EnhancedImportValidator),
            Arc::new(FixedClock(fixed_now())),
        )
    }

    #[tokio::test]
    async fn test_import_auto_matches_exact_candidates() {
        let mut store = MemoryStore::new();
        store.insert_payment(pending_payment(
            "pay-1",
            1000,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        ));
        let mut manager = manager_with(store);

        let report = manager
            .import("owner-1", "acct-1", vec![raw_item("FEED-1", 1000, "Rent March")])
            .await
            .unwrap();

        assert_eq!(report.imported_count, 1);
        assert_eq!(report.duplicate_count, 0);
        match &report.results[0] {
            ImportItemResult::Imported {
                transaction_id,
                status,
                confidence,
                strategy,
            } => {
                assert_eq!(*status, TransactionStatus::Matched);
                assert_eq!(*confidence, 100);
                assert_eq!(*strategy, MatchStrategy::Exact);

                let txn = manager
                    .store
                    .get_transaction(transaction_id)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(txn.matched_payment_id.as_deref(), Some("pay-1"));
                assert_eq!(txn.reconciled_by.as_deref(), Some(SYSTEM_OPERATOR));

                let payment = manager.store.get_payment("pay-1").await.unwrap().unwrap();
                assert_eq!(payment.status, PaymentStatus::Completed);
                assert_eq!(payment.paid_at, Some(txn.date));
            }
            other => panic!("expected an imported item, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_import_reports_known_rows_as_duplicates() {
        let mut manager = manager_with(MemoryStore::new());

        let first = manager
            .import("owner-1", "acct-1", vec![raw_item("FEED-1", 500, "Unknown deposit")])
            .await
            .unwrap();
        assert_eq!(first.imported_count, 1);

        let second = manager
            .import("owner-1", "acct-1", vec![raw_item("FEED-1", 500, "Unknown deposit")])
            .await
            .unwrap();
        assert_eq!(second.imported_count, 0);
        assert_eq!(second.duplicate_count, 1);

        // The duplicate points back at the surviving transaction
        let original_id = match &first.results[0] {
            ImportItemResult::Imported { transaction_id, .. } => transaction_id.clone(),
            other => panic!("expected an imported item, got {:?}", other),
        };
        assert_eq!(
            second.results[0],
            ImportItemResult::Duplicate {
                transaction_id: original_id
            }
        );
    }

    #[tokio::test]
    async fn test_import_rejects_an_invalid_batch_before_persisting() {
        let mut manager = manager_with(MemoryStore::new());

        let result = manager
            .import(
                "owner-1",
                "acct-1",
                vec![
                    raw_item("FEED-1", 1000, "Rent March"),
                    raw_item("FEED-2", 1000, "   "),
                ],
            )
            .await;
        assert!(matches!(result, Err(ReconError::Validation(_))));

        // The valid neighbour was not persisted either
        let listed = manager
            .store
            .list_transactions(&TransactionFilter::for_owner("owner-1"))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_import_leaves_low_confidence_candidates_unmatched() {
        let mut store = MemoryStore::new();
        // 2% off: fuzzy finds it at confidence 78, below the 80 bar
        store.insert_payment(pending_payment(
            "pay-1",
            1000,
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
        ));
        let mut manager = manager_with(store);

        let report = manager
            .import("owner-1", "acct-1", vec![raw_item("FEED-1", 980, "Rent March")])
            .await
            .unwrap();

        match &report.results[0] {
            ImportItemResult::Imported {
                transaction_id,
                status,
                confidence,
                strategy,
            } => {
                assert_eq!(*status, TransactionStatus::Unmatched);
                assert_eq!(*confidence, 0);
                assert_eq!(*strategy, MatchStrategy::None);

                let txn = manager
                    .store
                    .get_transaction(transaction_id)
                    .await
                    .unwrap()
                    .unwrap();
                assert!(txn.matched_payment_id.is_none());
                assert!(matches!(
                    txn.discrepancy,
                    Some(Discrepancy::Unexpected { .. })
                ));
            }
            other => panic!("expected an imported item, got {:?}", other),
        }

        // The near-miss payment was not consumed
        let payment = manager.store.get_payment("pay-1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_import_applies_rule_category_on_rule_matches() {
        let mut store = MemoryStore::new();
        store.insert_payment(pending_payment(
            "pay-1",
            1000,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        ));

        let rule = ReconciliationRule::new(
            "owner-1",
            NewRule {
                name: "Rent deposits".to_string(),
                priority: 10,
                is_active: true,
                conditions: RuleConditions {
                    description_pattern: Some(r"rent".to_string()),
                    ..RuleConditions::default()
                },
                actions: RuleActions {
                    category: Some("rent".to_string()),
                    auto_match: true,
                    tolerance: BigDecimal::from(60),
                    ..RuleActions::default()
                },
            },
            fixed_now(),
        );
        store.save_rule(&rule).await.unwrap();
        let mut manager = manager_with(store);

        // 950 vs 1000 misses the exact strategy but sits inside the tolerance
        let report = manager
            .import("owner-1", "acct-1", vec![raw_item("FEED-1", 950, "Rent March")])
            .await
            .unwrap();

        match &report.results[0] {
            ImportItemResult::Imported {
                transaction_id,
                status,
                confidence,
                strategy,
            } => {
                assert_eq!(*strategy, MatchStrategy::Rule);
                assert_eq!(*confidence, 95);
                assert_eq!(*status, TransactionStatus::PartialMatch);

                let txn = manager
                    .store
                    .get_transaction(transaction_id)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(txn.category.as_deref(), Some("rent"));
                assert!(matches!(txn.discrepancy, Some(Discrepancy::Partial { .. })));
            }
            other => panic!("expected an imported item, got {:?}", other),
        }
    }
}
