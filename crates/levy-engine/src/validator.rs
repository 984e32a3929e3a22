//! # Rule Validator
//!
//! Runs structural validation plus the registry's pluggable validation
//! rules against one tax rule.
//!
//! ## Built-in Validation Rule Types
//! ```text
//! ┌────────────────────┬──────────────────────────────┬────────────────────┐
//! │ type tag           │ check                        │ default limit      │
//! ├────────────────────┼──────────────────────────────┼────────────────────┤
//! │ rate_limit         │ rate ≤ max_rate              │ 50                 │
//! │ jurisdiction_limit │ jurisdiction ∈ allowed set   │ (empty = any)      │
//! │ date_range         │ window ≤ max_days            │ 365 days           │
//! │ anything else      │ no-op                        │                    │
//! └────────────────────┴──────────────────────────────┴────────────────────┘
//! ```

use chrono::Duration;
use levy_core::validation::validate_rule;
use levy_core::{TaxRule, TaxValidationRule, ValidationError};
use rust_decimal::Decimal;
use tracing::debug;

pub const RATE_LIMIT: &str = "rate_limit";
pub const JURISDICTION_LIMIT: &str = "jurisdiction_limit";
pub const DATE_RANGE: &str = "date_range";

/// Default `rate_limit` maximum.
pub const DEFAULT_MAX_RATE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Default `date_range` maximum window length.
pub const DEFAULT_MAX_DAYS: i64 = 365;

/// Structural validation followed by every active custom validation rule.
pub fn validate_with<'a, I>(rule: &TaxRule, validation_rules: I) -> Vec<ValidationError>
where
    I: IntoIterator<Item = &'a TaxValidationRule>,
{
    let mut errors = validate_rule(rule);
    for check in validation_rules.into_iter().filter(|v| v.is_active) {
        if let Some(err) = apply_validation_rule(rule, check) {
            errors.push(err);
        }
    }
    errors
}

/// Applies one custom validation rule. Unknown types never fail.
pub fn apply_validation_rule(rule: &TaxRule, check: &TaxValidationRule) -> Option<ValidationError> {
    match check.rule_type.as_str() {
        RATE_LIMIT => {
            let max = check.parameters.max_rate.unwrap_or(DEFAULT_MAX_RATE);
            (rule.rate > max).then(|| ValidationError::RateTooHigh {
                field: "rate".to_string(),
                max,
            })
        }
        JURISDICTION_LIMIT => {
            let allowed = &check.parameters.allowed_jurisdictions;
            (!allowed.is_empty() && !allowed.contains(&rule.jurisdiction)).then(|| {
                ValidationError::NotAllowed {
                    field: "jurisdiction".to_string(),
                    allowed: allowed.iter().map(|j| j.as_str().to_string()).collect(),
                }
            })
        }
        DATE_RANGE => {
            let max_days = check.parameters.max_days.unwrap_or(DEFAULT_MAX_DAYS);
            let span = rule.valid_until.signed_duration_since(rule.valid_from);
            // A limit too large for chrono can never be exceeded
            let exceeded = Duration::try_days(max_days).is_some_and(|limit| span > limit);
            exceeded.then(|| ValidationError::RangeTooLong {
                field: "valid_until".to_string(),
                max_days,
            })
        }
        other => {
            debug!(validation_rule = %check.id, rule_type = %other, "Skipping unknown validation rule type");
            None
        }
    }
}
