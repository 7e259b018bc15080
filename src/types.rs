//! Core types and data structures for the reconciliation system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle states of an imported bank transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Freshly imported, not yet evaluated (import resolves this immediately)
    Pending,
    /// Linked to a payment with full confidence
    Matched,
    /// Linked to a payment with reduced confidence
    PartialMatch,
    /// No acceptable candidate payment was found
    Unmatched,
    /// Flagged for external review
    Disputed,
    /// Terminally closed with a reason, never matched again
    WrittenOff,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Matched => "matched",
            TransactionStatus::PartialMatch => "partial_match",
            TransactionStatus::Unmatched => "unmatched",
            TransactionStatus::Disputed => "disputed",
            TransactionStatus::WrittenOff => "written_off",
        };
        write!(f, "{}", label)
    }
}

/// Status of an expected payment, owned by the payment subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting money
    Pending,
    /// Satisfied by a reconciled transaction
    Completed,
    /// No longer expected
    Cancelled,
}

/// Field-free discrepancy labels used as report keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    Unexpected,
    Partial,
    AmountMismatch,
    DateMismatch,
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DiscrepancyKind::Unexpected => "unexpected",
            DiscrepancyKind::Partial => "partial",
            DiscrepancyKind::AmountMismatch => "amount_mismatch",
            DiscrepancyKind::DateMismatch => "date_mismatch",
        };
        write!(f, "{}", label)
    }
}

/// Classified mismatch between an observed transaction and its expected payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// No candidate payment exists for the observed money
    Unexpected { actual_amount: BigDecimal },
    /// Observed amount falls short of the expectation
    Partial {
        expected_amount: BigDecimal,
        actual_amount: BigDecimal,
    },
    /// Observed amount differs from the expectation without being a shortfall
    AmountMismatch {
        expected_amount: BigDecimal,
        actual_amount: BigDecimal,
    },
    /// Amounts agree but the dates are too far apart
    DateMismatch,
}

impl Discrepancy {
    /// The field-free label for this discrepancy
    pub fn kind(&self) -> DiscrepancyKind {
        match self {
            Discrepancy::Unexpected { .. } => DiscrepancyKind::Unexpected,
            Discrepancy::Partial { .. } => DiscrepancyKind::Partial,
            Discrepancy::AmountMismatch { .. } => DiscrepancyKind::AmountMismatch,
            Discrepancy::DateMismatch => DiscrepancyKind::DateMismatch,
        }
    }
}

/// Bank-reported transaction under reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Principal (landlord) the transaction belongs to
    pub owner_id: String,
    /// Source bank account the feed came from
    pub account_id: String,
    /// Identifier assigned by the bank, unique per source account
    pub external_id: String,
    /// Date the money moved
    pub date: NaiveDate,
    /// Signed amount as reported by the bank
    pub amount: BigDecimal,
    /// Free-text description from the bank feed
    pub description: String,
    /// Payer name when the feed provides one
    pub payer_name: Option<String>,
    /// Bank reference number, if any
    pub reference: Option<String>,
    /// Category label applied by a matching rule
    pub category: Option<String>,
    /// Current lifecycle state
    pub status: TransactionStatus,
    /// Payment this transaction was matched to, if any
    pub matched_payment_id: Option<String>,
    /// Confidence of the current match (0-100)
    pub match_confidence: u8,
    /// Classified mismatch against the matched payment, if any
    pub discrepancy: Option<Discrepancy>,
    /// Operator notes or write-off reason
    pub notes: Option<String>,
    /// Who performed the last reconciliation action
    pub reconciled_by: Option<String>,
    /// When the last reconciliation action happened
    pub reconciled_at: Option<NaiveDateTime>,
    /// When the transaction was imported
    pub created_at: NaiveDateTime,
    /// When the transaction was last updated
    pub updated_at: NaiveDateTime,
}

impl BankTransaction {
    /// Create a transaction from a raw imported item
    pub fn from_import(
        owner_id: &str,
        account_id: &str,
        raw: RawTransaction,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            account_id: account_id.to_string(),
            external_id: raw.external_id,
            date: raw.date,
            amount: raw.amount,
            description: raw.description,
            payer_name: raw.payer_name,
            reference: raw.reference,
            category: None,
            status: TransactionStatus::Pending,
            matched_payment_id: None,
            match_confidence: 0,
            discrepancy: None,
            notes: None,
            reconciled_by: None,
            reconciled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the transaction currently holds a match
    pub fn has_match(&self) -> bool {
        self.matched_payment_id.is_some()
    }

    /// Link the transaction to a payment
    ///
    /// Status follows the confidence: 100 means `Matched`, anything lower
    /// means `PartialMatch`, so the status and the match link always agree.
    pub fn record_match(
        &mut self,
        payment_id: &str,
        confidence: u8,
        discrepancy: Option<Discrepancy>,
        reconciled_by: &str,
        now: NaiveDateTime,
    ) {
        self.status = if confidence == 100 {
            TransactionStatus::Matched
        } else {
            TransactionStatus::PartialMatch
        };
        self.matched_payment_id = Some(payment_id.to_string());
        self.match_confidence = confidence;
        self.discrepancy = discrepancy;
        self.reconciled_by = Some(reconciled_by.to_string());
        self.reconciled_at = Some(now);
        self.updated_at = now;
    }

    /// Clear any match link and settle the transaction as unmatched
    pub fn clear_match(&mut self, discrepancy: Option<Discrepancy>, now: NaiveDateTime) {
        self.status = TransactionStatus::Unmatched;
        self.matched_payment_id = None;
        self.match_confidence = 0;
        self.discrepancy = discrepancy;
        self.reconciled_by = None;
        self.reconciled_at = None;
        self.updated_at = now;
    }

    /// Terminally close the transaction with a reason
    pub fn record_write_off(&mut self, reason: &str, reconciled_by: &str, now: NaiveDateTime) {
        self.status = TransactionStatus::WrittenOff;
        self.matched_payment_id = None;
        self.match_confidence = 0;
        self.discrepancy = Some(Discrepancy::Unexpected {
            actual_amount: self.amount.clone(),
        });
        self.notes = Some(reason.to_string());
        self.reconciled_by = Some(reconciled_by.to_string());
        self.reconciled_at = Some(now);
        self.updated_at = now;
    }
}

/// Raw transaction as delivered by a bank feed import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Identifier assigned by the bank, unique per source account
    pub external_id: String,
    /// Date the money moved
    pub date: NaiveDate,
    /// Signed amount
    pub amount: BigDecimal,
    /// Free-text description
    pub description: String,
    /// Payer name when the feed provides one
    pub payer_name: Option<String>,
    /// Bank reference number, if any
    pub reference: Option<String>,
}

/// Expected payment recorded by the payment subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier for the payment
    pub id: String,
    /// Principal (landlord) the payment belongs to
    pub owner_id: String,
    /// Property the payment is owed against
    pub property_id: String,
    /// Unit within the property, if tracked
    pub unit_id: Option<String>,
    /// Tenant expected to pay
    pub tenant_id: String,
    /// Amount owed
    pub amount: BigDecimal,
    /// Date the payment is due
    pub due_date: NaiveDate,
    /// Current status
    pub status: PaymentStatus,
    /// Date the payment was satisfied, once completed
    pub paid_at: Option<NaiveDate>,
    /// When the payment was created
    pub created_at: NaiveDateTime,
    /// When the payment was last updated
    pub updated_at: NaiveDateTime,
}

impl Payment {
    /// Mark the payment as satisfied on the given date
    pub fn mark_completed(&mut self, paid_on: NaiveDate, now: NaiveDateTime) {
        self.status = PaymentStatus::Completed;
        self.paid_at = Some(paid_on);
        self.updated_at = now;
    }

    /// Return the payment to the pending pool
    pub fn revert_to_pending(&mut self, now: NaiveDateTime) {
        self.status = PaymentStatus::Pending;
        self.paid_at = None;
        self.updated_at = now;
    }
}

/// Conditions a transaction must satisfy for a rule to fire
///
/// Every present condition must hold. The payer condition is skipped when the
/// transaction carries no payer name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    /// Case-insensitive regex tested against the description
    pub description_pattern: Option<String>,
    /// Inclusive amount range
    pub amount_range: Option<AmountRange>,
    /// Case-insensitive regex tested against the payer name
    pub payer_pattern: Option<String>,
}

/// Inclusive amount bounds for a rule condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: BigDecimal,
    pub max: BigDecimal,
}

/// What a fired rule prescribes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleActions {
    /// Restrict candidate payments to this property
    pub property_id: Option<String>,
    /// Restrict candidate payments to this tenant
    pub tenant_id: Option<String>,
    /// Category label applied to the transaction
    pub category: Option<String>,
    /// Whether the rule may drive automatic matching
    pub auto_match: bool,
    /// Acceptable amount difference in currency units
    pub tolerance: BigDecimal,
}

/// User-authored matching policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRule {
    /// Unique identifier for the rule
    pub id: String,
    /// Principal (landlord) the rule belongs to
    pub owner_id: String,
    /// Human-readable rule name
    pub name: String,
    /// Evaluation order, ascending; ties broken by id
    pub priority: i32,
    /// Only active rules participate in matching
    pub is_active: bool,
    /// Conditions that must all hold
    pub conditions: RuleConditions,
    /// Prescription applied when the rule fires
    pub actions: RuleActions,
    /// When the rule was created
    pub created_at: NaiveDateTime,
}

impl ReconciliationRule {
    /// Create a rule for an owner from validated input
    pub fn new(owner_id: &str, rule: NewRule, now: NaiveDateTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: rule.name,
            priority: rule.priority,
            is_active: rule.is_active,
            conditions: rule.conditions,
            actions: rule.actions,
            created_at: now,
        }
    }
}

/// Input for creating a reconciliation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
    pub conditions: RuleConditions,
    pub actions: RuleActions,
}

/// Errors that can occur in the reconciliation system
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),
    #[error("Rule not found: {0}")]
    RuleNotFound(String),
}

impl ReconError {
    /// Whether the caller may safely retry the operation with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconError::Conflict(_) | ReconError::Storage(_))
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;

