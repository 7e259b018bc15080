//! Rule evaluation for user-authored matching policies

use bigdecimal::BigDecimal;
use regex::RegexBuilder;

use crate::types::{BankTransaction, ReconciliationRule, RuleConditions};

/// What a fired rule directs the matching engine to do
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDirective {
    /// Rule that produced this directive
    pub rule_id: String,
    /// Restrict candidate payments to this property
    pub property_id: Option<String>,
    /// Restrict candidate payments to this tenant
    pub tenant_id: Option<String>,
    /// Category label to apply to the transaction
    pub category: Option<String>,
    /// Acceptable amount difference in currency units
    pub tolerance: BigDecimal,
}

/// Evaluate an owner's rules against a transaction
///
/// Active rules are evaluated ascending by `(priority, id)`. The first
/// matching rule with `auto_match` enabled produces the directive; matching
/// rules without `auto_match` are passed over (reserved for manual
/// suggestions). `None` means the caller falls through to fuzzy matching.
pub fn evaluate(
    transaction: &BankTransaction,
    rules: &[ReconciliationRule],
) -> Option<MatchDirective> {
    let mut active: Vec<&ReconciliationRule> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

    active
        .into_iter()
        .filter(|rule| conditions_hold(&rule.conditions, transaction))
        .find(|rule| rule.actions.auto_match)
        .map(|rule| MatchDirective {
            rule_id: rule.id.clone(),
            property_id: rule.actions.property_id.clone(),
            tenant_id: rule.actions.tenant_id.clone(),
            category: rule.actions.category.clone(),
            tolerance: rule.actions.tolerance.clone(),
        })
}

/// Check every present condition; absent conditions always hold
fn conditions_hold(conditions: &RuleConditions, transaction: &BankTransaction) -> bool {
    if let Some(pattern) = &conditions.description_pattern {
        if !pattern_matches(pattern, &transaction.description) {
            return false;
        }
    }

    if let Some(range) = &conditions.amount_range {
        if transaction.amount < range.min || transaction.amount > range.max {
            return false;
        }
    }

    // The payer condition only applies when the feed reported a payer name
    if let (Some(pattern), Some(payer)) = (&conditions.payer_pattern, &transaction.payer_name) {
        if !pattern_matches(pattern, payer) {
            return false;
        }
    }

    true
}

/// Case-insensitive regex test; a stored pattern that fails to compile never matches
fn pattern_matches(pattern: &str, text: &str) -> bool {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => regex.is_match(text),
        Err(_) => {
            log::warn!("Ignoring rule pattern that failed to compile: {}", pattern);
            false
        }
    }
}
