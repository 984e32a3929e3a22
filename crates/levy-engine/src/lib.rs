//! # levy-engine: Tax Rule Registry and Calculation Engine
//!
//! This crate stores tax rules and computes the taxes a transaction owes.
//! It is a synchronous library with no I/O beyond reading and writing its
//! own config file.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Calculation Flow                                │
//! │                                                                         │
//! │  CalculationInput                                                       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌──────────────┐   rules    ┌────────────────────────────────────────┐ │
//! │  │  Registry    │──────────► │  Matcher                               │ │
//! │  │  (validated, │            │  window • type • geography • conditions│ │
//! │  │  conflict-   │            └───────────────────┬────────────────────┘ │
//! │  │  free rules) │                                │ per item             │
//! │  └──────────────┘                                ▼                      │
//! │                              ┌────────────────────────────────────────┐ │
//! │                              │  Exemptions → Tax Methods → Overrides  │ │
//! │                              └───────────────────┬────────────────────┘ │
//! │                                                  ▼                      │
//! │                              ┌────────────────────────────────────────┐ │
//! │                              │  Calculator: totals, rollups, warnings │ │
//! │                              └────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Rule Store
//! - [`registry`] - `TaxRuleRegistry`: CRUD, audit trail, export/import
//! - [`validator`] - Structural plus pluggable validation rules
//! - [`conflict`] - Duplicate and overlap detection
//!
//! ### Calculation
//! - [`conditions`] - AND/OR condition evaluator
//! - [`matcher`] - Rule applicability and ordering
//! - [`exemption`] - Customer and rule-level exemptions
//! - [`methods`] - Percentage, fixed, tiered, progressive, compound
//! - [`calculator`] - `TaxCalculator` orchestration and aggregation
//!
//! ### Ambient
//! - [`config`] - `TaxConfig` from TOML and environment
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use levy_core::{Address, CalculationInput, CalculationMethod, Jurisdiction, Money, TaxRule, TaxType, TaxableItem};
//! use levy_engine::{TaxCalculator, TaxRuleRegistry};
//! use rust_decimal::Decimal;
//!
//! let mut registry = TaxRuleRegistry::new();
//! registry.add_rule(
//!     TaxRule::new("ny", "NY Sales", TaxType::Sales, Jurisdiction::State,
//!                  CalculationMethod::Percentage, Decimal::new(825, 2))
//!         .with_countries(&["US"])
//!         .with_states(&["NY"]),
//! )?;
//!
//! let item = TaxableItem::new("sku-1", "electronics", Money::from_major(100), 1);
//! let input = CalculationInput::new(vec![item], Address::new("US", "NY"), Utc::now(), "USD");
//!
//! let result = TaxCalculator::new(&registry).calculate_tax(&input);
//! assert_eq!(result.grand_total, Money::from_cents(10825));
//! # Ok::<(), levy_engine::EngineError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calculator;
pub mod conditions;
pub mod config;
pub mod conflict;
pub mod error;
pub mod exemption;
pub mod matcher;
pub mod methods;
pub mod registry;
pub mod validator;

// =============================================================================
// Re-exports
// =============================================================================

pub use calculator::TaxCalculator;
pub use conditions::{compare_values, evaluate_condition, evaluate_conditions, ConditionContext};
pub use config::TaxConfig;
pub use conflict::{find_rule_conflicts, ConflictKind, RuleConflict};
pub use error::{EngineError, EngineResult};
pub use exemption::{is_customer_exempt, is_exemption_applicable};
pub use matcher::{
    applicable_rules, applicable_rules_for_item, is_geographically_applicable,
    is_rule_applicable_to_item,
};
pub use methods::calculate_tax_for_rule;
pub use registry::{RegistryDocument, RegistryStatistics, TaxRuleRegistry};
