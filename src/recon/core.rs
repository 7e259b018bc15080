//! Main reconciliation orchestrator that coordinates import, matching and reporting

use chrono::{Duration, NaiveDate};
use std::sync::Arc;

use crate::matching::engine::MatchingEngine;
use crate::recon::report::{self, MissingPayment, ReconciliationSummary, VarianceReport};
use crate::recon::{ImportManager, ImportReport, LifecycleManager};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_rule;

/// Main reconciliation system that orchestrates all operations
///
/// Every operation is scoped by `owner_id`. The transport layer resolves
/// authentication down to that scope before calling in here, so an id from
/// another owner simply behaves as not found.
pub struct Reconciler<S: ReconStore + Clone> {
    import_manager: ImportManager<S>,
    lifecycle_manager: LifecycleManager<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ReconStore + Clone> Reconciler<S> {
    /// Create a new reconciler with the given storage backend
    pub fn new(store: S) -> Self {
        Self {
            import_manager: ImportManager::new(store.clone()),
            lifecycle_manager: LifecycleManager::new(store),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a reconciler with custom matching, validation and time source
    pub fn with_components(
        store: S,
        engine: MatchingEngine,
        validator: Box<dyn ImportValidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            import_manager: ImportManager::with_components(
                store.clone(),
                engine,
                validator,
                clock.clone(),
            ),
            lifecycle_manager: LifecycleManager::with_clock(store, clock.clone()),
            clock,
        }
    }

    // Import operations
    /// Import a batch of bank feed items for a source account
    pub async fn import_transactions(
        &mut self,
        owner_id: &str,
        account_id: &str,
        items: Vec<RawTransaction>,
    ) -> ReconResult<ImportReport> {
        self.import_manager
            .import(owner_id, account_id, items)
            .await
    }

    // Lifecycle operations
    /// Manually match a transaction to a pending payment
    pub async fn manual_match(
        &mut self,
        owner_id: &str,
        transaction_id: &str,
        payment_id: &str,
        notes: Option<String>,
    ) -> ReconResult<BankTransaction> {
        self.lifecycle_manager
            .manual_match(owner_id, transaction_id, payment_id, notes)
            .await
    }

    /// Undo a match, releasing the payment back to pending
    pub async fn unmatch(
        &mut self,
        owner_id: &str,
        transaction_id: &str,
    ) -> ReconResult<BankTransaction> {
        self.lifecycle_manager.unmatch(owner_id, transaction_id).await
    }

    /// Terminally write a transaction off
    pub async fn write_off(
        &mut self,
        owner_id: &str,
        transaction_id: &str,
        reason: &str,
    ) -> ReconResult<BankTransaction> {
        self.lifecycle_manager
            .write_off(owner_id, transaction_id, reason)
            .await
    }

    // Rule operations
    /// Create a reconciliation rule
    pub async fn create_rule(
        &mut self,
        owner_id: &str,
        rule: NewRule,
    ) -> ReconResult<ReconciliationRule> {
        validate_rule(&rule)?;

        let rule = ReconciliationRule::new(owner_id, rule, self.clock.now());
        self.lifecycle_manager.store.save_rule(&rule).await?;
        Ok(rule)
    }

    /// Delete a rule in the owner's scope
    pub async fn delete_rule(&mut self, owner_id: &str, rule_id: &str) -> ReconResult<()> {
        let rule = self.lifecycle_manager.store.get_rule(rule_id).await?;
        match rule.filter(|rule| rule.owner_id == owner_id) {
            Some(rule) => self.lifecycle_manager.store.delete_rule(&rule.id).await,
            None => Err(ReconError::RuleNotFound(rule_id.to_string())),
        }
    }

    /// List an owner's rules, evaluation order first
    pub async fn list_rules(&self, owner_id: &str) -> ReconResult<Vec<ReconciliationRule>> {
        self.lifecycle_manager.store.list_rules(owner_id, false).await
    }

    // Query operations
    /// Get a transaction in the owner's scope
    pub async fn get_transaction(
        &self,
        owner_id: &str,
        transaction_id: &str,
    ) -> ReconResult<Option<BankTransaction>> {
        self.lifecycle_manager
            .get_transaction(owner_id, transaction_id)
            .await
    }

    /// List transactions matching the filter
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> ReconResult<Vec<BankTransaction>> {
        self.lifecycle_manager.store.list_transactions(filter).await
    }

    // Reporting operations
    /// Summarize reconciliation state over a trailing window
    pub async fn get_summary(
        &self,
        owner_id: &str,
        period_days: i64,
    ) -> ReconResult<ReconciliationSummary> {
        let today = self.clock.today();
        let filter = TransactionFilter {
            date_from: Some(today - Duration::days(period_days)),
            date_to: Some(today),
            ..TransactionFilter::for_owner(owner_id)
        };
        let transactions = self.lifecycle_manager.store.list_transactions(&filter).await?;

        Ok(report::summarize(owner_id, period_days, &transactions))
    }

    /// List pending payments that are overdue
    pub async fn get_missing_payments(
        &self,
        owner_id: &str,
        days_overdue: Option<i64>,
    ) -> ReconResult<Vec<MissingPayment>> {
        let days = days_overdue.unwrap_or(report::DEFAULT_MISSING_PAYMENT_DAYS);
        let pending = self
            .lifecycle_manager
            .store
            .find_pending_payments(&PendingPaymentQuery::for_owner(owner_id))
            .await?;

        Ok(report::missing_payments(&pending, self.clock.today(), days))
    }

    /// Compare observed against expected money over a date range
    pub async fn get_report(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReconResult<VarianceReport> {
        let transactions = self
            .lifecycle_manager
            .store
            .list_transactions(&TransactionFilter {
                date_from: Some(start),
                date_to: Some(end),
                ..TransactionFilter::for_owner(owner_id)
            })
            .await?;
        let completed = self
            .lifecycle_manager
            .store
            .list_payments(&PaymentFilter {
                status: Some(PaymentStatus::Completed),
                paid_from: Some(start),
                paid_to: Some(end),
                ..PaymentFilter::for_owner(owner_id)
            })
            .await?;

        Ok(report::variance(owner_id, start, end, &transactions, &completed))
    }
}
