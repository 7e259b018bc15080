//! Matching engine orchestrating exact, rule-based, and fuzzy strategies

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::matching::rules::{self, MatchDirective};
use crate::traits::{PaymentStore, PendingPaymentQuery, RuleStore};
use crate::types::{BankTransaction, Payment, ReconResult};

/// Matching strategies in the order the engine runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Same amount, due date within the exact window
    Exact,
    /// Candidate search driven by a fired reconciliation rule
    Rule,
    /// Amount within a percentage band, due date within the fuzzy window
    Fuzzy,
    /// No strategy produced a candidate
    None,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Rule => "rule",
            MatchStrategy::Fuzzy => "fuzzy",
            MatchStrategy::None => "none",
        };
        write!(f, "{}", label)
    }
}

/// Policy knobs for candidate search and acceptance
///
/// Deserializable so a host application can load it from configuration;
/// `Default` is the production policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum confidence at which import may apply a match automatically
    pub auto_accept_confidence: u8,
    /// Due-date window for the exact strategy, days either side
    pub exact_date_window_days: i64,
    /// Due-date window for the fuzzy strategy, days either side
    pub fuzzy_date_window_days: i64,
    /// Amount window for the fuzzy strategy, percent either side
    pub fuzzy_amount_pct: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            auto_accept_confidence: 80,
            exact_date_window_days: 7,
            fuzzy_date_window_days: 14,
            fuzzy_amount_pct: 5,
        }
    }
}

/// Best candidate payment found for a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// The payment proposed for the match
    pub payment: Payment,
    /// Confidence score, 0-100
    pub confidence: u8,
    /// Strategy that produced the candidate
    pub strategy: MatchStrategy,
    /// Directive of the rule that drove a rule-based match
    pub directive: Option<MatchDirective>,
}

/// Orchestrates the matching strategies against the payment store
///
/// The strategy order is injected rather than resolved from any shared
/// registry, so two engines with different policies can coexist.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    config: MatchingConfig,
    strategies: Vec<MatchStrategy>,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(MatchingConfig::default())
    }
}

impl MatchingEngine {
    /// Engine with the default strategy order: exact, rule, fuzzy
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            strategies: vec![
                MatchStrategy::Exact,
                MatchStrategy::Rule,
                MatchStrategy::Fuzzy,
            ],
        }
    }

    /// Engine with an explicit strategy order
    pub fn with_strategies(config: MatchingConfig, strategies: Vec<MatchStrategy>) -> Self {
        Self { config, strategies }
    }

    /// The active configuration
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Whether import may apply a candidate automatically
    pub fn auto_accepts(&self, candidate: &MatchCandidate) -> bool {
        candidate.confidence >= self.config.auto_accept_confidence
    }

    /// Find the best candidate payment for a transaction
    ///
    /// Strategies run in their configured order and the first one that yields
    /// a candidate wins. `Ok(None)` means no strategy found any candidate.
    pub async fn find_match<S>(
        &self,
        store: &S,
        transaction: &BankTransaction,
    ) -> ReconResult<Option<MatchCandidate>>
    where
        S: PaymentStore + RuleStore,
    {
        for strategy in &self.strategies {
            let candidate = match strategy {
                MatchStrategy::Exact => self.exact_match(store, transaction).await?,
                MatchStrategy::Rule => self.rule_match(store, transaction).await?,
                MatchStrategy::Fuzzy => self.fuzzy_match(store, transaction).await?,
                MatchStrategy::None => None,
            };

            if let Some(candidate) = candidate {
                log::debug!(
                    "Transaction {} matched payment {} via {} strategy (confidence {})",
                    transaction.id,
                    candidate.payment.id,
                    candidate.strategy,
                    candidate.confidence
                );
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    /// Pending payments with the same amount, due within the exact window
    async fn exact_match<S: PaymentStore>(
        &self,
        store: &S,
        transaction: &BankTransaction,
    ) -> ReconResult<Option<MatchCandidate>> {
        let window = Duration::days(self.config.exact_date_window_days);
        let query = PendingPaymentQuery {
            amount_min: Some(transaction.amount.clone()),
            amount_max: Some(transaction.amount.clone()),
            due_from: Some(transaction.date - window),
            due_to: Some(transaction.date + window),
            ..PendingPaymentQuery::for_owner(&transaction.owner_id)
        };

        let candidates = store.find_pending_payments(&query).await?;
        Ok(best_candidate(transaction, candidates).map(|payment| MatchCandidate {
            payment,
            confidence: 100,
            strategy: MatchStrategy::Exact,
            directive: None,
        }))
    }

    /// Candidate search prescribed by the first firing rule, if any
    async fn rule_match<S>(
        &self,
        store: &S,
        transaction: &BankTransaction,
    ) -> ReconResult<Option<MatchCandidate>>
    where
        S: PaymentStore + RuleStore,
    {
        let owner_rules = store.list_rules(&transaction.owner_id, true).await?;
        let directive = match rules::evaluate(transaction, &owner_rules) {
            Some(directive) => directive,
            None => return Ok(None),
        };

        let query = PendingPaymentQuery {
            property_id: directive.property_id.clone(),
            tenant_id: directive.tenant_id.clone(),
            amount_min: Some(&transaction.amount - &directive.tolerance),
            amount_max: Some(&transaction.amount + &directive.tolerance),
            ..PendingPaymentQuery::for_owner(&transaction.owner_id)
        };

        let candidates = store.find_pending_payments(&query).await?;
        Ok(best_candidate(transaction, candidates).map(|payment| {
            let confidence = rule_confidence(&transaction.amount, &payment.amount);
            MatchCandidate {
                payment,
                confidence,
                strategy: MatchStrategy::Rule,
                directive: Some(directive),
            }
        }))
    }

    /// Pending payments within the fuzzy amount band and date window
    async fn fuzzy_match<S: PaymentStore>(
        &self,
        store: &S,
        transaction: &BankTransaction,
    ) -> ReconResult<Option<MatchCandidate>> {
        let leeway = transaction.amount.abs() * BigDecimal::from(self.config.fuzzy_amount_pct)
            / BigDecimal::from(100);
        let window = Duration::days(self.config.fuzzy_date_window_days);
        let query = PendingPaymentQuery {
            amount_min: Some(&transaction.amount - &leeway),
            amount_max: Some(&transaction.amount + &leeway),
            due_from: Some(transaction.date - window),
            due_to: Some(transaction.date + window),
            ..PendingPaymentQuery::for_owner(&transaction.owner_id)
        };

        let candidates = store.find_pending_payments(&query).await?;
        Ok(best_candidate(transaction, candidates).map(|payment| {
            let confidence = fuzzy_confidence(&transaction.amount, &payment.amount);
            MatchCandidate {
                payment,
                confidence,
                strategy: MatchStrategy::Fuzzy,
                directive: None,
            }
        }))
    }
}

/// Deterministic candidate selection: smallest amount difference, then
/// smallest date distance, then payment id
fn best_candidate(transaction: &BankTransaction, candidates: Vec<Payment>) -> Option<Payment> {
    candidates.into_iter().min_by(|a, b| {
        let diff_a = (&a.amount - &transaction.amount).abs();
        let diff_b = (&b.amount - &transaction.amount).abs();
        diff_a
            .cmp(&diff_b)
            .then_with(|| {
                let days_a = (a.due_date - transaction.date).num_days().abs();
                let days_b = (b.due_date - transaction.date).num_days().abs();
                days_a.cmp(&days_b)
            })
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// `max(50, 100 - percent difference)` for rule-driven matches
fn rule_confidence(observed: &BigDecimal, expected: &BigDecimal) -> u8 {
    (100 - amount_diff_percent(observed, expected)).max(50) as u8
}

/// `max(30, 80 - percent difference)` for fuzzy matches
fn fuzzy_confidence(observed: &BigDecimal, expected: &BigDecimal) -> u8 {
    (80 - amount_diff_percent(observed, expected)).max(30) as u8
}

/// Absolute amount difference as a whole percentage of the expected amount
///
/// A zero expectation counts as a full mismatch rather than dividing by zero.
fn amount_diff_percent(observed: &BigDecimal, expected: &BigDecimal) -> i64 {
    if *expected == BigDecimal::from(0) {
        return 100;
    }

    let diff = (expected - observed).abs();
    let percent = diff * BigDecimal::from(100) / expected.abs();
    percent.round(0).to_i64().unwrap_or(100).clamp(0, 100)
}
