//! # Engine Error Types
//!
//! Error types for registry, calculation and configuration operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Registry     │  │  Interchange    │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  RuleNotFound   │  │  Unsupported    │  │  InvalidConfig          │ │
//! │  │  InvalidRule    │  │    Version      │  │  ConfigLoadFailed       │ │
//! │  │  Conflict       │  │  Json           │  │  Io / Toml*             │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  NOT here: per-item calculation problems. Those never abort a          │
//! │  calculation; they land in TaxCalculationResult.errors / .warnings.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use levy_core::ValidationError;
use thiserror::Error;

use crate::conflict::RuleConflict;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - A failed registry mutation always leaves the registry unchanged
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// No rule with this id exists.
    #[error("Tax rule not found: {0}")]
    RuleNotFound(String),

    /// The rule failed structural or custom validation.
    #[error("Tax rule '{rule_id}' is invalid: {}", join_errors(.errors))]
    InvalidRule {
        rule_id: String,
        errors: Vec<ValidationError>,
    },

    /// The rule duplicates or ambiguously overlaps existing rules.
    #[error("Tax rule '{rule_id}' conflicts with {} existing rule(s)", .conflicts.len())]
    Conflict {
        rule_id: String,
        conflicts: Vec<RuleConflict>,
    },

    /// No validation rule with this id exists.
    #[error("Validation rule not found: {0}")]
    ValidationRuleNotFound(String),

    /// A validation rule with this id is already registered.
    #[error("Validation rule already exists: {0}")]
    DuplicateValidationRule(String),

    // =========================================================================
    // Interchange Errors
    // =========================================================================
    /// Export document version is not understood.
    #[error("Unsupported registry document version {found} (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid tax configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    /// Returns true if the error came from a rejected registry mutation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRule { .. } | EngineError::Conflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::RuleNotFound("ny-sales".into());
        assert_eq!(err.to_string(), "Tax rule not found: ny-sales");

        let err = EngineError::InvalidRule {
            rule_id: "r1".into(),
            errors: vec![
                ValidationError::Required { field: "name".into() },
                ValidationError::Negative { field: "rate".into() },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Tax rule 'r1' is invalid: name is required; rate must not be negative"
        );
        assert!(err.is_rejection());
    }

    #[test]
    fn test_not_found_is_not_rejection() {
        assert!(!EngineError::RuleNotFound("x".into()).is_rejection());
    }
}
