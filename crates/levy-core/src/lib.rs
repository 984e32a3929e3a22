//! # levy-core: Pure Tax Data Model
//!
//! This crate holds the data model shared by every part of Levy. It has
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Levy Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Checkout / order-processing code                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CalculationInput                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   levy-engine: registry, matcher, exemptions, tax methods       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ levy-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │   rule    │  │transaction│  │ condition │  │   │
//! │  │   │  Money    │  │  TaxRule  │  │  Input    │  │  values   │  │   │
//! │  │   │  round()  │  │ Exemption │  │  Result   │  │  coercion │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Decimal `Money` and the rounding collaborator
//! - [`rule`] - Tax rules, thresholds, exemptions, audit entries
//! - [`condition`] - Typed rule predicates
//! - [`transaction`] - Calculation input and result shapes
//! - [`validation`] - Structural rule validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output
//! 2. **Decimal Money**: no floating point in any monetary path
//! 3. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod condition;
pub mod error;
pub mod money;
pub mod rule;
pub mod transaction;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use condition::{ConditionLogic, ConditionOperator, ConditionType, ConditionValue, TaxCondition};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{round, Money, RoundingMode};
pub use rule::*;
pub use transaction::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Version tag written into registry export documents.
pub const REGISTRY_DOCUMENT_VERSION: &str = "1.0";

/// Default number of decimal places for monetary outputs.
pub const DEFAULT_ROUNDING_PRECISION: u32 = 2;
