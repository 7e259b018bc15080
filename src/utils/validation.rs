//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;
use regex::RegexBuilder;

/// Validate that a bank-assigned external id is usable
pub fn validate_external_id(external_id: &str) -> ReconResult<()> {
    if external_id.trim().is_empty() {
        return Err(ReconError::Validation(
            "External id cannot be empty".to_string(),
        ));
    }

    if external_id.len() > 100 {
        return Err(ReconError::Validation(
            "External id cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a feed description is usable
pub fn validate_description(description: &str) -> ReconResult<()> {
    if description.trim().is_empty() {
        return Err(ReconError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(ReconError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a write-off reason
pub fn validate_reason(reason: &str) -> ReconResult<()> {
    if reason.trim().is_empty() {
        return Err(ReconError::Validation(
            "Write-off reason cannot be empty".to_string(),
        ));
    }

    if reason.len() > 500 {
        return Err(ReconError::Validation(
            "Write-off reason cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a pattern compiles the way rule evaluation will use it
pub fn validate_pattern(pattern: &str) -> ReconResult<()> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|_| ())
        .map_err(|err| {
            ReconError::Validation(format!("Invalid rule pattern '{}': {}", pattern, err))
        })
}

/// Validate rule input before a rule is created
pub fn validate_rule(rule: &NewRule) -> ReconResult<()> {
    if rule.name.trim().is_empty() {
        return Err(ReconError::Validation(
            "Rule name cannot be empty".to_string(),
        ));
    }

    if rule.name.len() > 100 {
        return Err(ReconError::Validation(
            "Rule name cannot exceed 100 characters".to_string(),
        ));
    }

    if let Some(pattern) = &rule.conditions.description_pattern {
        validate_pattern(pattern)?;
    }

    if let Some(pattern) = &rule.conditions.payer_pattern {
        validate_pattern(pattern)?;
    }

    if let Some(range) = &rule.conditions.amount_range {
        if range.min > range.max {
            return Err(ReconError::Validation(
                "Amount range minimum cannot exceed maximum".to_string(),
            ));
        }
    }

    if rule.actions.tolerance < BigDecimal::from(0) {
        return Err(ReconError::Validation(
            "Rule tolerance cannot be negative".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced import validator with detailed checks
pub struct EnhancedImportValidator;

impl ImportValidator for EnhancedImportValidator {
    fn validate_raw(&self, raw: &RawTransaction) -> ReconResult<()> {
        validate_external_id(&raw.external_id)?;
        validate_description(&raw.description)?;

        if raw.amount == BigDecimal::from(0) {
            return Err(ReconError::Validation(
                "Transaction amount cannot be zero".to_string(),
            ));
        }

        if let Some(payer) = &raw.payer_name {
            if payer.len() > 100 {
                return Err(ReconError::Validation(
                    "Payer name cannot exceed 100 characters".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_external_id() {
        assert!(validate_external_id("FEED-2024-0001").is_ok());
        assert!(validate_external_id("").is_err());
        assert!(validate_external_id("   ").is_err());
        assert!(validate_external_id(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_pattern_rejects_broken_regex() {
        assert!(validate_pattern(r"(?i)rent\s+payment").is_ok());
        assert!(validate_pattern(r"rent[").is_err());
    }

    #[test]
    fn test_validate_rule_checks_amount_range_ordering() {
        let mut rule = NewRule {
            name: "Rent deposits".to_string(),
            priority: 10,
            is_active: true,
            conditions: RuleConditions {
                amount_range: Some(AmountRange {
                    min: BigDecimal::from(500),
                    max: BigDecimal::from(100),
                }),
                ..RuleConditions::default()
            },
            actions: RuleActions::default(),
        };
        assert!(validate_rule(&rule).is_err());

        rule.conditions.amount_range = Some(AmountRange {
            min: BigDecimal::from(100),
            max: BigDecimal::from(500),
        });
        assert!(validate_rule(&rule).is_ok());
    }

    #[test]
    fn test_validate_rule_rejects_negative_tolerance() {
        let rule = NewRule {
            name: "Utilities".to_string(),
            priority: 5,
            is_active: true,
            conditions: RuleConditions::default(),
            actions: RuleActions {
                tolerance: BigDecimal::from(-1),
                ..RuleActions::default()
            },
        };
        assert!(validate_rule(&rule).is_err());
    }

    #[test]
    fn test_enhanced_validator_rejects_zero_amounts() {
        let raw = RawTransaction {
            external_id: "FEED-1".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount: BigDecimal::from(0),
            description: "Rent March".to_string(),
            payer_name: None,
            reference: None,
        };
        assert!(EnhancedImportValidator.validate_raw(&raw).is_err());
    }
}
