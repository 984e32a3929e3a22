//! # Validation Module
//!
//! Structural validation of tax rules.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization                                              │
//! │  └── Enum tags, required fields, decimal parsing                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (structural)                                     │
//! │  ├── id / name present                                                 │
//! │  ├── rate non-negative, ≤ 100 for percentage methods                   │
//! │  ├── validity window non-empty                                         │
//! │  └── amount bounds and threshold bands ordered                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: levy-engine registry                                         │
//! │  ├── custom validation rules (rate_limit, date_range, ...)             │
//! │  └── conflict detection against existing rules                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation is collect-all: every problem with a rule is reported at
//! once, so a caller can fix a rule in one round trip.
//!
//! ## Usage
//! ```rust
//! use levy_core::rule::{CalculationMethod, Jurisdiction, TaxRule, TaxType};
//! use levy_core::validation::validate_rule;
//! use rust_decimal::Decimal;
//!
//! let rule = TaxRule::new("", "Broken", TaxType::Sales, Jurisdiction::State,
//!     CalculationMethod::Percentage, Decimal::from(150));
//! let errors = validate_rule(&rule);
//! assert_eq!(errors.len(), 2); // missing id, rate above 100
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::rule::{TaxRule, TaxThreshold};

/// Result type for single-check validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound for any percentage rate.
pub const MAX_PERCENTAGE_RATE: Decimal = Decimal::ONE_HUNDRED;

// =============================================================================
// Rule Validation
// =============================================================================

/// Validates a rule's structure, returning every problem found.
///
/// ## Rules
/// - `id` and `name` must not be blank
/// - `rate ≥ 0`, and `rate ≤ 100` when the method is percentage-based
/// - `valid_from < valid_until`
/// - `min_amount ≥ 0`, `max_amount == 0 ∨ max_amount ≥ min_amount`
/// - each threshold obeys the same bounds on its own fields
pub fn validate_rule(rule: &TaxRule) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    collect(&mut errors, validate_required("id", &rule.id));
    collect(&mut errors, validate_required("name", &rule.name));

    if rule.rate < Decimal::ZERO {
        errors.push(ValidationError::Negative {
            field: "rate".to_string(),
        });
    } else if rule.method.is_percentage_based() && rule.rate > MAX_PERCENTAGE_RATE {
        errors.push(ValidationError::RateTooHigh {
            field: "rate".to_string(),
            max: MAX_PERCENTAGE_RATE,
        });
    }

    if rule.valid_from >= rule.valid_until {
        errors.push(ValidationError::InvalidDateRange {
            field: "valid_from".to_string(),
        });
    }

    collect(
        &mut errors,
        validate_amount_bounds("", rule.min_amount, rule.max_amount),
    );

    for (index, threshold) in rule.thresholds.iter().enumerate() {
        errors.extend(validate_threshold(index, threshold));
    }

    errors
}

/// Validates one threshold band.
pub fn validate_threshold(index: usize, threshold: &TaxThreshold) -> Vec<ValidationError> {
    let prefix = format!("thresholds[{}].", index);
    let mut errors = Vec::new();

    collect(
        &mut errors,
        validate_amount_bounds(&prefix, threshold.min_amount, threshold.max_amount),
    );

    if threshold.rate < Decimal::ZERO {
        errors.push(ValidationError::Negative {
            field: format!("{}rate", prefix),
        });
    }

    if threshold.fixed_amount.is_some_and(|fixed| fixed.is_negative()) {
        errors.push(ValidationError::Negative {
            field: format!("{}fixed_amount", prefix),
        });
    }

    errors
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates that a text field is not blank.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a `[min, max]` amount pair where `max == 0` means unbounded.
///
/// `prefix` is prepended to the reported field names.
pub fn validate_amount_bounds(prefix: &str, min: Money, max: Money) -> ValidationResult<()> {
    if min.is_negative() {
        return Err(ValidationError::Negative {
            field: format!("{}min_amount", prefix),
        });
    }

    if max.is_negative() {
        return Err(ValidationError::Negative {
            field: format!("{}max_amount", prefix),
        });
    }

    if !max.is_zero() && max < min {
        return Err(ValidationError::InvalidAmountRange {
            field: format!("{}max_amount", prefix),
        });
    }

    Ok(())
}

fn collect(errors: &mut Vec<ValidationError>, result: ValidationResult<()>) {
    if let Err(err) = result {
        errors.push(err);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
