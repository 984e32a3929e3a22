//! # Tax Rule Types
//!
//! Everything the rule registry stores: rules, their threshold bands,
//! rule-level exemptions, custom validation rules and audit entries.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          TaxRule                                        │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  identity      id, name, description                                    │
//! │  what          tax_type, jurisdiction, method, rate                     │
//! │  bands         thresholds[] (tiered / progressive)                      │
//! │  where         applicable_countries / states / cities / postal_codes    │
//! │  what items    applicable_categories, exempt_categories, min/max amount │
//! │  when          is_active, [valid_from, valid_until)                     │
//! │  ordering      priority (higher first)                                  │
//! │  extra gates   conditions[], exemptions[]                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::condition::TaxCondition;
use crate::money::Money;

// =============================================================================
// Classification Enums
// =============================================================================

/// The kind of tax a rule levies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    Sales,
    Vat,
    Gst,
    Excise,
    Customs,
    Property,
    Withholding,
    /// Only applies to items flagged digital.
    Digital,
    Environmental,
    /// Only applies to items flagged luxury.
    Luxury,
}

impl TaxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxType::Sales => "sales",
            TaxType::Vat => "vat",
            TaxType::Gst => "gst",
            TaxType::Excise => "excise",
            TaxType::Customs => "customs",
            TaxType::Property => "property",
            TaxType::Withholding => "withholding",
            TaxType::Digital => "digital",
            TaxType::Environmental => "environmental",
            TaxType::Luxury => "luxury",
        }
    }
}

impl fmt::Display for TaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The governmental level authorised to levy a tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Jurisdiction {
    Federal,
    State,
    County,
    City,
    District,
    International,
}

impl Jurisdiction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Jurisdiction::Federal => "federal",
            Jurisdiction::State => "state",
            Jurisdiction::County => "county",
            Jurisdiction::City => "city",
            Jurisdiction::District => "district",
            Jurisdiction::International => "international",
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule turns a taxable amount into a tax amount.
///
/// ```text
/// percentage   base × rate%
/// fixed        rate, once per item
/// tiered       ONE band holds the whole base → band fixed or base × band%
/// progressive  EVERY band taxes only its own slice (income-tax brackets)
/// compound     (base + taxes already applied to the item) × rate%
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    Percentage,
    Fixed,
    Tiered,
    Progressive,
    Compound,
}

impl CalculationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMethod::Percentage => "percentage",
            CalculationMethod::Fixed => "fixed",
            CalculationMethod::Tiered => "tiered",
            CalculationMethod::Progressive => "progressive",
            CalculationMethod::Compound => "compound",
        }
    }

    /// Methods whose `rate` is a percentage and therefore capped at 100.
    pub fn is_percentage_based(&self) -> bool {
        matches!(self, CalculationMethod::Percentage | CalculationMethod::Compound)
    }
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Threshold Band
// =============================================================================

/// A `[min_amount, max_amount)` band used by tiered and progressive rules.
///
/// `max_amount == 0` means the band is unbounded above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxThreshold {
    pub min_amount: Money,
    #[serde(default)]
    pub max_amount: Money,
    #[ts(type = "string")]
    #[serde(default)]
    pub rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_amount: Option<Money>,
}

impl TaxThreshold {
    /// A band taxed at a percentage rate.
    pub fn rate(min_amount: Money, max_amount: Money, rate: Decimal) -> Self {
        TaxThreshold {
            min_amount,
            max_amount,
            rate,
            fixed_amount: None,
        }
    }

    /// A band that levies a flat amount.
    pub fn fixed(min_amount: Money, max_amount: Money, fixed_amount: Money) -> Self {
        TaxThreshold {
            min_amount,
            max_amount,
            rate: Decimal::ZERO,
            fixed_amount: Some(fixed_amount),
        }
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.max_amount.is_zero()
    }

    /// True when `amount` falls in `[min_amount, max_amount)`.
    pub fn contains(&self, amount: Money) -> bool {
        amount >= self.min_amount && (self.is_unbounded() || amount < self.max_amount)
    }
}

// =============================================================================
// Exemption
// =============================================================================

/// What an exemption is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionType {
    Customer,
    Item,
    Transaction,
    Location,
}

/// An override that suppresses tax within a validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxExemption {
    #[serde(rename = "type")]
    pub exemption_type: ExemptionType,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    /// `None` means the exemption does not expire.
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    /// Item categories covered. Empty covers every category.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<TaxCondition>,
}

impl TaxExemption {
    /// Creates an open-ended exemption valid from the start of the epoch.
    pub fn new(exemption_type: ExemptionType, reason: impl Into<String>) -> Self {
        TaxExemption {
            exemption_type,
            reason: reason.into(),
            certificate: None,
            valid_from: DateTime::<Utc>::default(),
            valid_until: None,
            categories: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_categories<S: AsRef<str>>(mut self, categories: &[S]) -> Self {
        self.categories = categories.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn with_window(mut self, from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    pub fn with_certificate(mut self, certificate: impl Into<String>) -> Self {
        self.certificate = Some(certificate.into());
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<TaxCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// True when `at` falls in `[valid_from, valid_until)`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.valid_from && self.valid_until.map_or(true, |until| at < until)
    }

    /// True when the exemption's category scope includes `category`.
    pub fn covers_category(&self, category: &str) -> bool {
        self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
    }
}

// =============================================================================
// Tax Rule
// =============================================================================

/// Far end of an open validity window (9999-12-31T23:59:59Z).
pub fn open_window_end() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A jurisdiction/category/time-scoped tax rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub tax_type: TaxType,
    pub jurisdiction: Jurisdiction,
    pub method: CalculationMethod,
    /// Percent for percentage/compound, an amount for fixed.
    #[ts(type = "string")]
    pub rate: Decimal,
    #[serde(default)]
    pub min_amount: Money,
    /// Zero means unbounded.
    #[serde(default)]
    pub max_amount: Money,
    #[serde(default)]
    pub thresholds: Vec<TaxThreshold>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub exempt_categories: Vec<String>,
    #[serde(default)]
    pub applicable_countries: Vec<String>,
    #[serde(default)]
    pub applicable_states: Vec<String>,
    #[serde(default)]
    pub applicable_cities: Vec<String>,
    #[serde(default)]
    pub applicable_postal_codes: Vec<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    #[ts(as = "String")]
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<TaxCondition>,
    #[serde(default)]
    pub exemptions: Vec<TaxExemption>,
}

impl TaxRule {
    /// Creates an active rule with an open validity window, no geography
    /// (global) and no category restrictions.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        tax_type: TaxType,
        jurisdiction: Jurisdiction,
        method: CalculationMethod,
        rate: Decimal,
    ) -> Self {
        TaxRule {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tax_type,
            jurisdiction,
            method,
            rate,
            min_amount: Money::zero(),
            max_amount: Money::zero(),
            thresholds: Vec::new(),
            applicable_categories: Vec::new(),
            exempt_categories: Vec::new(),
            applicable_countries: Vec::new(),
            applicable_states: Vec::new(),
            applicable_cities: Vec::new(),
            applicable_postal_codes: Vec::new(),
            is_active: true,
            valid_from: DateTime::<Utc>::default(),
            valid_until: open_window_end(),
            priority: 0,
            conditions: Vec::new(),
            exemptions: Vec::new(),
        }
    }

    pub fn with_countries<S: AsRef<str>>(mut self, countries: &[S]) -> Self {
        self.applicable_countries = to_strings(countries);
        self
    }

    pub fn with_states<S: AsRef<str>>(mut self, states: &[S]) -> Self {
        self.applicable_states = to_strings(states);
        self
    }

    pub fn with_cities<S: AsRef<str>>(mut self, cities: &[S]) -> Self {
        self.applicable_cities = to_strings(cities);
        self
    }

    pub fn with_postal_codes<S: AsRef<str>>(mut self, codes: &[S]) -> Self {
        self.applicable_postal_codes = to_strings(codes);
        self
    }

    pub fn with_categories<S: AsRef<str>>(mut self, categories: &[S]) -> Self {
        self.applicable_categories = to_strings(categories);
        self
    }

    pub fn with_exempt_categories<S: AsRef<str>>(mut self, categories: &[S]) -> Self {
        self.exempt_categories = to_strings(categories);
        self
    }

    pub fn with_window(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    pub fn with_amount_bounds(mut self, min_amount: Money, max_amount: Money) -> Self {
        self.min_amount = min_amount;
        self.max_amount = max_amount;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<TaxThreshold>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<TaxCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_exemptions(mut self, exemptions: Vec<TaxExemption>) -> Self {
        self.exemptions = exemptions;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// True when `at` falls in `[valid_from, valid_until)`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.valid_from && at < self.valid_until
    }

    /// Active AND inside the validity window.
    pub fn is_in_effect(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.is_valid_at(at)
    }
}

fn to_strings<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().to_string()).collect()
}

// =============================================================================
// Custom Validation Rules
// =============================================================================

/// Parameters read by the built-in validation rule types.
///
/// Unset parameters fall back to the built-in limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationParameters {
    #[ts(as = "Option<String>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_jurisdictions: Vec<Jurisdiction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_days: Option<i64>,
}

/// A pluggable check run against every rule on add/update.
///
/// `rule_type` is a free-form tag; the engine knows `rate_limit`,
/// `jurisdiction_limit` and `date_range`, and ignores anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxValidationRule {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub parameters: ValidationParameters,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl TaxValidationRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rule_type: impl Into<String>,
        parameters: ValidationParameters,
    ) -> Self {
        TaxValidationRule {
            id: id.into(),
            name: name.into(),
            rule_type: rule_type.into(),
            parameters,
            message: String::new(),
            is_active: true,
        }
    }
}

// =============================================================================
// Audit Trail
// =============================================================================

/// The registry mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Removed,
    Activated,
    Deactivated,
    Imported,
    Optimized,
    ValidationRuleAdded,
    ValidationRuleRemoved,
}

/// One append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxAuditTrail {
    pub action: AuditAction,
    pub rule_id: String,
    pub reason: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
