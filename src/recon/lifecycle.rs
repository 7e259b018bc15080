//! Manual transaction lifecycle operations

use std::sync::Arc;

use crate::matching::classify::classify;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_reason;

/// Manager for operator-driven lifecycle transitions
///
/// Matching done by import is automatic; everything here is an operator
/// correcting or closing out what automation got wrong.
pub struct LifecycleManager<S: ReconStore> {
    pub(crate) store: S,
    clock: Arc<dyn Clock>,
}

impl<S: ReconStore> LifecycleManager<S> {
    /// Create a new lifecycle manager
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a lifecycle manager with an injected clock
    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Manually link a transaction to a pending payment
    ///
    /// The operator decision is final (confidence 100), but the classifier
    /// still runs so amount and date disagreements stay visible on the
    /// discrepancy report.
    pub async fn manual_match(
        &mut self,
        owner_id: &str,
        transaction_id: &str,
        payment_id: &str,
        notes: Option<String>,
    ) -> ReconResult<BankTransaction> {
        let mut transaction = self
            .get_transaction_required(owner_id, transaction_id)
            .await?;

        // Check the transaction can accept a match
        if transaction.status == TransactionStatus::WrittenOff {
            return Err(ReconError::InvalidState(format!(
                "Transaction '{}' has been written off",
                transaction_id
            )));
        }
        if let Some(existing) = &transaction.matched_payment_id {
            return Err(ReconError::InvalidState(format!(
                "Transaction '{}' is already matched to payment '{}'",
                transaction_id, existing
            )));
        }

        // Check the payment can be consumed
        let mut payment = self.get_payment_required(owner_id, payment_id).await?;
        if payment.status != PaymentStatus::Pending {
            return Err(ReconError::InvalidState(format!(
                "Payment '{}' is not pending",
                payment_id
            )));
        }

        let discrepancy = classify(&transaction.amount, transaction.date, Some(&payment));

        let now = self.clock.now();
        transaction.record_match(payment_id, 100, discrepancy, owner_id, now);
        if let Some(notes) = notes {
            transaction.notes = Some(notes);
        }
        payment.mark_completed(transaction.date, now);

        // Both writes land or neither does
        self.store
            .commit_match(&transaction, &payment, PaymentStatus::Pending)
            .await?;

        log::info!(
            "Manually matched transaction {} to payment {}",
            transaction_id,
            payment_id
        );

        Ok(transaction)
    }

    /// Undo a match, releasing the payment back to pending
    pub async fn unmatch(
        &mut self,
        owner_id: &str,
        transaction_id: &str,
    ) -> ReconResult<BankTransaction> {
        let mut transaction = self
            .get_transaction_required(owner_id, transaction_id)
            .await?;

        let payment_id = match &transaction.matched_payment_id {
            Some(payment_id) => payment_id.clone(),
            None => {
                return Err(ReconError::InvalidState(format!(
                    "Transaction '{}' has no match to undo",
                    transaction_id
                )))
            }
        };

        let mut payment = self.get_payment_required(owner_id, &payment_id).await?;

        let now = self.clock.now();
        transaction.clear_match(None, now);
        payment.revert_to_pending(now);

        // The compare-and-set guards against the payment having moved on
        self.store
            .commit_match(&transaction, &payment, PaymentStatus::Completed)
            .await?;

        log::info!(
            "Unmatched transaction {} from payment {}",
            transaction_id,
            payment_id
        );

        Ok(transaction)
    }

    /// Terminally close a transaction that will never reconcile
    pub async fn write_off(
        &mut self,
        owner_id: &str,
        transaction_id: &str,
        reason: &str,
    ) -> ReconResult<BankTransaction> {
        // Validate the reason before touching the store
        validate_reason(reason)?;

        let mut transaction = self
            .get_transaction_required(owner_id, transaction_id)
            .await?;
        if transaction.status == TransactionStatus::WrittenOff {
            return Err(ReconError::InvalidState(format!(
                "Transaction '{}' has already been written off",
                transaction_id
            )));
        }

        let held_payment_id = transaction.matched_payment_id.clone();
        let now = self.clock.now();
        transaction.record_write_off(reason, owner_id, now);

        match held_payment_id {
            // A held payment goes back to pending in the same commit
            Some(payment_id) => {
                let mut payment = self.get_payment_required(owner_id, &payment_id).await?;
                payment.revert_to_pending(now);
                self.store
                    .commit_match(&transaction, &payment, PaymentStatus::Completed)
                    .await?;
            }
            None => self.store.update_transaction(&transaction).await?,
        }

        log::info!("Wrote off transaction {}", transaction_id);

        Ok(transaction)
    }

    /// Get a transaction in the owner's scope
    pub async fn get_transaction(
        &self,
        owner_id: &str,
        transaction_id: &str,
    ) -> ReconResult<Option<BankTransaction>> {
        let transaction = self.store.get_transaction(transaction_id).await?;
        Ok(transaction.filter(|txn| txn.owner_id == owner_id))
    }

    /// Get a transaction in the owner's scope, failing when absent
    pub(crate) async fn get_transaction_required(
        &self,
        owner_id: &str,
        transaction_id: &str,
    ) -> ReconResult<BankTransaction> {
        self.get_transaction(owner_id, transaction_id)
            .await?
            .ok_or_else(|| ReconError::TransactionNotFound(transaction_id.to_string()))
    }

    async fn get_payment_required(
        &self,
        owner_id: &str,
        payment_id: &str,
    ) -> ReconResult<Payment> {
        let payment = self.store.get_payment(payment_id).await?;
        payment
            .filter(|payment| payment.owner_id == owner_id)
            .ok_or_else(|| ReconError::PaymentNotFound(payment_id.to_string()))
    }
}
