//! # Condition Types
//!
//! Typed predicates attached to tax rules and exemptions.
//!
//! ## Condition Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  { type: "amount", operator: ">=", value: 500, logic: "AND" }           │
//! │     │                │               │           │                      │
//! │     │                │               │           └─ how this condition  │
//! │     │                │               │              joins the running   │
//! │     │                │               │              result (ignored on  │
//! │     │                │               │              the first one)      │
//! │     │                │               └─ Number | Text | List            │
//! │     │                └─ > < >= <= = != in not_in                        │
//! │     └─ which value to read from the transaction                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are a closed variant with total coercion rules so that comparison
//! never depends on runtime type inspection.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Condition Type
// =============================================================================

/// Which value a condition reads from the calculation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Sum of item totals.
    Amount,
    /// Sum of item quantities.
    Quantity,
    /// Category of the item being evaluated.
    Category,
    /// The customer's type (e.g. "business", "nonprofit").
    CustomerType,
    /// Destination country (shipping, falling back to billing).
    Country,
    /// Destination state (shipping, falling back to billing).
    State,
    /// Transaction type ("sale", "refund", "import", "export").
    TransactionType,
    /// A caller-supplied context entry named by [`TaxCondition::field`].
    Context,
    /// Any unrecognised type. Never holds.
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Operator & Logic
// =============================================================================

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ConditionOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ConditionOperator::GreaterThan => ">",
            ConditionOperator::LessThan => "<",
            ConditionOperator::GreaterOrEqual => ">=",
            ConditionOperator::LessOrEqual => "<=",
            ConditionOperator::Equal => "=",
            ConditionOperator::NotEqual => "!=",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not_in",
        };
        f.write_str(symbol)
    }
}

/// How a condition joins the running result of the conditions before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

// =============================================================================
// Condition Value
// =============================================================================

/// A dynamically-shaped condition operand.
///
/// ## Coercion Rules
/// | variant  | `to_f64`                  | `as_text`            |
/// |----------|---------------------------|----------------------|
/// | Number   | itself (finite only)      | decimal rendering    |
/// | Text     | parsed if numeric, else ✗ | itself               |
/// | List     | ✗                         | comma-joined         |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl ConditionValue {
    /// Coerces to a float, failing for non-numeric text and lists.
    pub fn to_f64(&self) -> CoreResult<f64> {
        match self {
            ConditionValue::Number(n) if n.is_finite() => Ok(*n),
            ConditionValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(CoreError::Coercion {
                    value: s.clone(),
                    target: "number",
                }),
            },
            other => Err(CoreError::Coercion {
                value: other.as_text(),
                target: "number",
            }),
        }
    }

    /// True when [`to_f64`](Self::to_f64) would succeed.
    pub fn looks_numeric(&self) -> bool {
        self.to_f64().is_ok()
    }

    /// Textual rendering used for string comparison.
    pub fn as_text(&self) -> String {
        match self {
            ConditionValue::Number(n) => n.to_string(),
            ConditionValue::Text(s) => s.clone(),
            ConditionValue::List(items) => items.join(","),
        }
    }

    /// Members of a collection operand. Text splits on commas.
    pub fn members(&self) -> Vec<String> {
        match self {
            ConditionValue::List(items) => items.iter().map(|s| s.trim().to_string()).collect(),
            ConditionValue::Text(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
            ConditionValue::Number(n) => vec![n.to_string()],
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        ConditionValue::Number(n)
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        ConditionValue::Text(s.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        ConditionValue::Text(s)
    }
}

impl From<Vec<String>> for ConditionValue {
    fn from(items: Vec<String>) -> Self {
        ConditionValue::List(items)
    }
}

// =============================================================================
// Tax Condition
// =============================================================================

/// An immutable predicate attached to a rule or exemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
    #[serde(default)]
    pub logic: ConditionLogic,
    /// Context key, only read when `condition_type` is `context`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl TaxCondition {
    /// Creates an AND-joined condition.
    pub fn new(
        condition_type: ConditionType,
        operator: ConditionOperator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        TaxCondition {
            condition_type,
            operator,
            value: value.into(),
            logic: ConditionLogic::And,
            field: None,
        }
    }

    /// Creates a condition over a caller-supplied context entry.
    pub fn context(
        key: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        TaxCondition {
            field: Some(key.into()),
            ..TaxCondition::new(ConditionType::Context, operator, value)
        }
    }

    /// Returns this condition joined with OR instead of AND.
    pub fn or(mut self) -> Self {
        self.logic = ConditionLogic::Or;
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
