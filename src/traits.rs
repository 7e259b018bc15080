//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Storage abstraction for imported bank transactions
///
/// This trait allows the reconciliation core to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these methods.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new transaction, enforcing `(account_id, external_id)` uniqueness
    ///
    /// A second insert with the same pair must fail with `Conflict` even when
    /// two imports race, so uniqueness has to live in the store, not only in
    /// the import pre-check.
    async fn insert_transaction(&mut self, transaction: &BankTransaction) -> ReconResult<()>;

    /// Get a transaction by ID
    async fn get_transaction(&self, transaction_id: &str)
        -> ReconResult<Option<BankTransaction>>;

    /// Look up a transaction by its bank-assigned identifier
    async fn find_transaction_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> ReconResult<Option<BankTransaction>>;

    /// Update a transaction's mutable fields
    async fn update_transaction(&mut self, transaction: &BankTransaction) -> ReconResult<()>;

    /// List transactions matching the filter
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> ReconResult<Vec<BankTransaction>>;
}

/// Storage abstraction for expected payments
///
/// Payments are owned by the external payment subsystem; the reconciliation
/// core reads them and flips their status only through `ReconStore::commit_match`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Get a payment by ID
    async fn get_payment(&self, payment_id: &str) -> ReconResult<Option<Payment>>;

    /// List pending payments matching the query, for candidate selection
    async fn find_pending_payments(
        &self,
        query: &PendingPaymentQuery,
    ) -> ReconResult<Vec<Payment>>;

    /// List payments matching the filter
    async fn list_payments(&self, filter: &PaymentFilter) -> ReconResult<Vec<Payment>>;

    /// Update a payment
    async fn update_payment(&mut self, payment: &Payment) -> ReconResult<()>;
}

/// Storage abstraction for reconciliation rules
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Save a rule
    async fn save_rule(&mut self, rule: &ReconciliationRule) -> ReconResult<()>;

    /// Get a rule by ID
    async fn get_rule(&self, rule_id: &str) -> ReconResult<Option<ReconciliationRule>>;

    /// List an owner's rules, ordered by `(priority, id)` ascending
    async fn list_rules(
        &self,
        owner_id: &str,
        active_only: bool,
    ) -> ReconResult<Vec<ReconciliationRule>>;

    /// Delete a rule
    async fn delete_rule(&mut self, rule_id: &str) -> ReconResult<()>;
}

/// Combined storage contract for the reconciliation system
#[async_trait]
pub trait ReconStore: TransactionStore + PaymentStore + RuleStore {
    /// Persist a transaction and its payment as one all-or-nothing write
    ///
    /// The payment write is a compare-and-set: it applies only while the
    /// stored payment still has `expected_status`. Two operators racing to
    /// consume the same payment therefore produce exactly one success and
    /// one `Conflict`. A SQL-backed store wraps the pair in a serializable
    /// transaction; the in-memory store applies both under one lock.
    async fn commit_match(
        &mut self,
        transaction: &BankTransaction,
        payment: &Payment,
        expected_status: PaymentStatus,
    ) -> ReconResult<()>;
}

/// Source of time for date-window computations and audit stamps
pub trait Clock: Send + Sync {
    /// Current timestamp for audit fields
    fn now(&self) -> NaiveDateTime;

    /// Current business date
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Clock backed by the system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}

/// Clock pinned to a fixed instant, for tests and deterministic replays
#[derive(Debug, Clone)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Trait for implementing custom validation of imported feed items
pub trait ImportValidator: Send + Sync {
    /// Validate a raw transaction before any store access
    fn validate_raw(&self, raw: &RawTransaction) -> ReconResult<()>;
}

/// Default import validator with basic rules
pub struct DefaultImportValidator;

impl ImportValidator for DefaultImportValidator {
    fn validate_raw(&self, raw: &RawTransaction) -> ReconResult<()> {
        if raw.external_id.trim().is_empty() {
            return Err(ReconError::Validation(
                "External id cannot be empty".to_string(),
            ));
        }

        if raw.description.trim().is_empty() {
            return Err(ReconError::Validation(
                "Description cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Filter for transaction queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Principal scope, always required
    pub owner_id: String,
    /// Restrict to one source account
    pub account_id: Option<String>,
    /// Restrict to one lifecycle status
    pub status: Option<TransactionStatus>,
    /// Earliest transaction date, inclusive
    pub date_from: Option<NaiveDate>,
    /// Latest transaction date, inclusive
    pub date_to: Option<NaiveDate>,
}

impl TransactionFilter {
    /// Filter matching every transaction in an owner's scope
    pub fn for_owner(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            account_id: None,
            status: None,
            date_from: None,
            date_to: None,
        }
    }
}

/// Candidate query against pending payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPaymentQuery {
    /// Principal scope, always required
    pub owner_id: String,
    /// Restrict candidates to one property
    pub property_id: Option<String>,
    /// Restrict candidates to one tenant
    pub tenant_id: Option<String>,
    /// Smallest acceptable amount, inclusive
    pub amount_min: Option<BigDecimal>,
    /// Largest acceptable amount, inclusive
    pub amount_max: Option<BigDecimal>,
    /// Earliest due date, inclusive
    pub due_from: Option<NaiveDate>,
    /// Latest due date, inclusive
    pub due_to: Option<NaiveDate>,
}

impl PendingPaymentQuery {
    /// Query matching every pending payment in an owner's scope
    pub fn for_owner(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            property_id: None,
            tenant_id: None,
            amount_min: None,
            amount_max: None,
            due_from: None,
            due_to: None,
        }
    }
}

/// Filter for payment listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFilter {
    /// Principal scope, always required
    pub owner_id: String,
    /// Restrict to one payment status
    pub status: Option<PaymentStatus>,
    /// Earliest paid date, inclusive
    pub paid_from: Option<NaiveDate>,
    /// Latest paid date, inclusive
    pub paid_to: Option<NaiveDate>,
}

impl PaymentFilter {
    /// Filter matching every payment in an owner's scope
    pub fn for_owner(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            status: None,
            paid_from: None,
            paid_to: None,
        }
    }
}
