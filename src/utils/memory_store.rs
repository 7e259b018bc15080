//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory store implementation for testing and development
#[derive(Debug, Clone)]
pub struct MemoryStore {
    transactions: Arc<RwLock<HashMap<String, BankTransaction>>>,
    payments: Arc<RwLock<HashMap<String, Payment>>>,
    rules: Arc<RwLock<HashMap<String, ReconciliationRule>>>,
}

impl MemoryStore {
    /// Create a new memory store instance
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            payments: Arc::new(RwLock::new(HashMap::new())),
            rules: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed a payment, standing in for the payment subsystem that owns them
    pub fn insert_payment(&mut self, payment: Payment) {
        self.payments
            .write()
            .unwrap()
            .insert(payment.id.clone(), payment);
    }

    /// Clear all data (useful for testing)
    pub fn clear(&mut self) {
        self.transactions.write().unwrap().clear();
        self.payments.write().unwrap().clear();
        self.rules.write().unwrap().clear();
    }

    fn is_duplicate_external_id(
        transactions: &HashMap<String, BankTransaction>,
        transaction: &BankTransaction,
    ) -> bool {
        transactions.values().any(|existing| {
            existing.id != transaction.id
                && existing.account_id == transaction.account_id
                && existing.external_id == transaction.external_id
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&mut self, transaction: &BankTransaction) -> ReconResult<()> {
        let mut transactions = self.transactions.write().unwrap();

        if transactions.contains_key(&transaction.id) {
            return Err(ReconError::Conflict(format!(
                "Transaction '{}' already exists",
                transaction.id
            )));
        }

        if Self::is_duplicate_external_id(&transactions, transaction) {
            return Err(ReconError::Conflict(format!(
                "Transaction '{}' already imported for account '{}'",
                transaction.external_id, transaction.account_id
            )));
        }

        transactions.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconResult<Option<BankTransaction>> {
        let transactions = self.transactions.read().unwrap();
        Ok(transactions.get(transaction_id).cloned())
    }

    async fn find_transaction_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> ReconResult<Option<BankTransaction>> {
        let transactions = self.transactions.read().unwrap();
        Ok(transactions
            .values()
            .find(|txn| txn.account_id == account_id && txn.external_id == external_id)
            .cloned())
    }

    async fn update_transaction(&mut self, transaction: &BankTransaction) -> ReconResult<()> {
        let mut transactions = self.transactions.write().unwrap();
        if transactions.contains_key(&transaction.id) {
            transactions.insert(transaction.id.clone(), transaction.clone());
            Ok(())
        } else {
            Err(ReconError::TransactionNotFound(transaction.id.clone()))
        }
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> ReconResult<Vec<BankTransaction>> {
        let transactions = self.transactions.read().unwrap();
        let mut matched: Vec<BankTransaction> = transactions
            .values()
            .filter(|txn| {
                txn.owner_id == filter.owner_id
                    && filter
                        .account_id
                        .as_ref()
                        .is_none_or(|account_id| &txn.account_id == account_id)
                    && filter.status.is_none_or(|status| txn.status == status)
                    && filter.date_from.is_none_or(|from| txn.date >= from)
                    && filter.date_to.is_none_or(|to| txn.date <= to)
            })
            .cloned()
            .collect();
        // HashMap iteration order is arbitrary; callers get a stable listing
        matched.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(matched)
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn get_payment(&self, payment_id: &str) -> ReconResult<Option<Payment>> {
        let payments = self.payments.read().unwrap();
        Ok(payments.get(payment_id).cloned())
    }

    async fn find_pending_payments(
        &self,
        query: &PendingPaymentQuery,
    ) -> ReconResult<Vec<Payment>> {
        let payments = self.payments.read().unwrap();
        let mut matched: Vec<Payment> = payments
            .values()
            .filter(|payment| {
                payment.owner_id == query.owner_id
                    && payment.status == PaymentStatus::Pending
                    && query
                        .property_id
                        .as_ref()
                        .is_none_or(|property_id| &payment.property_id == property_id)
                    && query
                        .tenant_id
                        .as_ref()
                        .is_none_or(|tenant_id| &payment.tenant_id == tenant_id)
                    && query
                        .amount_min
                        .as_ref()
                        .is_none_or(|min| &payment.amount >= min)
                    && query
                        .amount_max
                        .as_ref()
                        .is_none_or(|max| &payment.amount <= max)
                    && query.due_from.is_none_or(|from| payment.due_date >= from)
                    && query.due_to.is_none_or(|to| payment.due_date <= to)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        Ok(matched)
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> ReconResult<Vec<Payment>> {
        let payments = self.payments.read().unwrap();
        let mut matched: Vec<Payment> = payments
            .values()
            .filter(|payment| {
                payment.owner_id == filter.owner_id
                    && filter.status.is_none_or(|status| payment.status == status)
                    && filter
                        .paid_from
                        .is_none_or(|from| payment.paid_at.is_some_and(|paid| paid >= from))
                    && filter
                        .paid_to
                        .is_none_or(|to| payment.paid_at.is_some_and(|paid| paid <= to))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        Ok(matched)
    }

    async fn update_payment(&mut self, payment: &Payment) -> ReconResult<()> {
        let mut payments = self.payments.write().unwrap();
        if payments.contains_key(&payment.id) {
            payments.insert(payment.id.clone(), payment.clone());
            Ok(())
        } else {
            Err(ReconError::PaymentNotFound(payment.id.clone()))
        }
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn save_rule(&mut self, rule: &ReconciliationRule) -> ReconResult<()> {
        self.rules
            .write()
            .unwrap()
            .insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn get_rule(&self, rule_id: &str) -> ReconResult<Option<ReconciliationRule>> {
        let rules = self.rules.read().unwrap();
        Ok(rules.get(rule_id).cloned())
    }

    async fn list_rules(
        &self,
        owner_id: &str,
        active_only: bool,
    ) -> ReconResult<Vec<ReconciliationRule>> {
        let rules = self.rules.read().unwrap();
        let mut matched: Vec<ReconciliationRule> = rules
            .values()
            .filter(|rule| rule.owner_id == owner_id && (!active_only || rule.is_active))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(matched)
    }

    async fn delete_rule(&mut self, rule_id: &str) -> ReconResult<()> {
        let mut rules = self.rules.write().unwrap();
        if rules.remove(rule_id).is_some() {
            Ok(())
        } else {
            Err(ReconError::RuleNotFound(rule_id.to_string()))
        }
    }
}

#[async_trait]
impl ReconStore for MemoryStore {
    async fn commit_match(
        &mut self,
        transaction: &BankTransaction,
        payment: &Payment,
        expected_status: PaymentStatus,
    ) -> ReconResult<()> {
        // Both maps are locked for the whole commit, so the pair of writes
        // is all-or-nothing. Lock order is transactions then payments,
        // matching every other multi-map path in this store.
        let mut transactions = self.transactions.write().unwrap();
        let mut payments = self.payments.write().unwrap();

        let stored = payments
            .get(&payment.id)
            .ok_or_else(|| ReconError::PaymentNotFound(payment.id.clone()))?;
        if stored.status != expected_status {
            return Err(ReconError::Conflict(format!(
                "Payment '{}' was updated concurrently",
                payment.id
            )));
        }

        if !transactions.contains_key(&transaction.id)
            && Self::is_duplicate_external_id(&transactions, transaction)
        {
            return Err(ReconError::Conflict(format!(
                "Transaction '{}' already imported for account '{}'",
                transaction.external_id, transaction.account_id
            )));
        }

        transactions.insert(transaction.id.clone(), transaction.clone());
        payments.insert(payment.id.clone(), payment.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn sample_clock() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn sample_transaction(external_id: &str) -> BankTransaction {
        let raw = RawTransaction {
            external_id: external_id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            amount: BigDecimal::from(1000),
            description: "Rent March".to_string(),
            payer_name: None,
            reference: None,
        };
        BankTransaction::from_import("owner-1", "acct-1", raw, sample_clock())
    }

    fn sample_payment(id: &str) -> Payment {
        Payment {
            id: id.to_string(),
            owner_id: "owner-1".to_string(),
            property_id: "prop-1".to_string(),
            unit_id: None,
            tenant_id: "tenant-1".to_string(),
            amount: BigDecimal::from(1000),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: sample_clock(),
            updated_at: sample_clock(),
        }
    }

    #[tokio::test]
    async fn test_insert_enforces_external_id_uniqueness_per_account() {
        let mut store = MemoryStore::new();

        store
            .insert_transaction(&sample_transaction("FEED-1"))
            .await
            .unwrap();

        // Same external id, same account: rejected even though the row id differs
        let result = store.insert_transaction(&sample_transaction("FEED-1")).await;
        assert!(matches!(result, Err(ReconError::Conflict(_))));

        // Same external id on another account is a different bank row
        let mut other_account = sample_transaction("FEED-1");
        other_account.account_id = "acct-2".to_string();
        store.insert_transaction(&other_account).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_match_rejects_concurrently_consumed_payment() {
        let mut store = MemoryStore::new();
        store.insert_payment(sample_payment("pay-1"));

        let txn_a = sample_transaction("FEED-A");
        let txn_b = sample_transaction("FEED-B");
        let mut payment = sample_payment("pay-1");
        payment.mark_completed(txn_a.date, sample_clock());

        store
            .commit_match(&txn_a, &payment, PaymentStatus::Pending)
            .await
            .unwrap();

        // Second committer still believes the payment is pending
        let result = store
            .commit_match(&txn_b, &payment, PaymentStatus::Pending)
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ReconError::Conflict(_)));
        assert!(err.is_retryable());

        // The losing commit wrote nothing
        assert!(store.get_transaction(&txn_b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_rules_orders_by_priority_then_id() {
        let mut store = MemoryStore::new();
        let now = sample_clock();

        let mut low = ReconciliationRule::new(
            "owner-1",
            NewRule {
                name: "Low priority".to_string(),
                priority: 20,
                is_active: true,
                conditions: RuleConditions::default(),
                actions: RuleActions::default(),
            },
            now,
        );
        low.id = "rule-b".to_string();

        let mut high = ReconciliationRule::new(
            "owner-1",
            NewRule {
                name: "High priority".to_string(),
                priority: 10,
                is_active: true,
                conditions: RuleConditions::default(),
                actions: RuleActions::default(),
            },
            now,
        );
        high.id = "rule-z".to_string();

        let mut tied = ReconciliationRule::new(
            "owner-1",
            NewRule {
                name: "Tied priority".to_string(),
                priority: 10,
                is_active: true,
                conditions: RuleConditions::default(),
                actions: RuleActions::default(),
            },
            now,
        );
        tied.id = "rule-a".to_string();

        store.save_rule(&low).await.unwrap();
        store.save_rule(&high).await.unwrap();
        store.save_rule(&tied).await.unwrap();

        let rules = store.list_rules("owner-1", false).await.unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rule-a", "rule-z", "rule-b"]);
    }

    #[tokio::test]
    async fn test_find_pending_payments_skips_completed_ones() {
        let mut store = MemoryStore::new();
        store.insert_payment(sample_payment("pay-1"));

        let mut completed = sample_payment("pay-2");
        completed.mark_completed(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), sample_clock());
        store.insert_payment(completed);

        let pending = store
            .find_pending_payments(&PendingPaymentQuery::for_owner("owner-1"))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "pay-1");
    }
}
