//! # Error Types
//!
//! Domain-specific error types for levy-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  levy-core errors (this file)                                          │
//! │  ├── CoreError        - Coercion and parsing failures                  │
//! │  └── ValidationError  - Malformed tax rule fields                      │
//! │                                                                         │
//! │  levy-engine errors (separate crate)                                   │
//! │  └── EngineError      - Registry, conflict and config failures         │
//! │                                                                         │
//! │  Flow: ValidationError → EngineError::InvalidRule → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, value, limit)
//! 3. Errors are enum variants, never String
//! 4. Every validation failure carries a stable machine-readable code

use rust_decimal::Decimal;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A condition value could not be coerced to the requested type.
    ///
    /// ## When This Occurs
    /// - A numeric operator (`>`, `<=`, ...) compares against text such as "abc"
    /// - A list operand is used where a scalar is required
    ///
    /// The condition evaluator treats this as "condition does not hold".
    #[error("cannot coerce {value:?} to {target}")]
    Coercion { value: String, target: &'static str },

    /// A string did not name any variant of a closed enumeration.
    #[error("unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Tax rule validation errors.
///
/// Each variant names the offending `field` (e.g. `rate`,
/// `thresholds[1].max_amount`) and maps to a stable [`code`](Self::code).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Rate exceeds the allowed maximum.
    #[error("{field} must not exceed {max}")]
    RateTooHigh { field: String, max: Decimal },

    /// Validity window is empty or inverted.
    #[error("{field} must start before it ends")]
    InvalidDateRange { field: String },

    /// Upper amount bound is below the lower bound.
    #[error("{field} must be zero (unbounded) or at least the minimum amount")]
    InvalidAmountRange { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Validity window is longer than a configured limit.
    #[error("{field} must not span more than {max_days} days")]
    RangeTooLong { field: String, max_days: i64 },
}

impl ValidationError {
    /// The field this error is about.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::Negative { field }
            | ValidationError::RateTooHigh { field, .. }
            | ValidationError::InvalidDateRange { field }
            | ValidationError::InvalidAmountRange { field }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::RangeTooLong { field, .. } => field,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Required { .. } => "REQUIRED",
            ValidationError::Negative { .. } => "NEGATIVE",
            ValidationError::RateTooHigh { .. } => "RATE_TOO_HIGH",
            ValidationError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            ValidationError::InvalidAmountRange { .. } => "INVALID_AMOUNT_RANGE",
            ValidationError::NotAllowed { .. } => "NOT_ALLOWED",
            ValidationError::RangeTooLong { .. } => "RANGE_TOO_LONG",
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
