//! # Transaction Types
//!
//! What goes into a tax calculation and what comes out of it.
//!
//! ## Calculation Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CalculationInput                                                       │
//! │  ├── items[]          TaxableItem (category, price × qty, flags)        │
//! │  ├── customer         type, tax ids, exemptions[]                       │
//! │  ├── billing/shipping Address (country, state, city, postal code)       │
//! │  └── date, type, currency, shipping, discount, overrides                │
//! │           │                                                             │
//! │           ▼  per item: rules → exemptions → methods                     │
//! │                                                                         │
//! │  TaxCalculationResult                                                   │
//! │  ├── tax_breakdown[]  TaxBreakdown per item (AppliedTax[])              │
//! │  ├── applied_taxes[]  every AppliedTax, in item order                   │
//! │  ├── totals           subtotal, total_tax, grand_total, effective_rate  │
//! │  ├── rollups          by jurisdiction, by tax type                      │
//! │  └── is_valid, errors[], warnings[]                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::condition::ConditionValue;
use crate::money::Money;
use crate::rule::{CalculationMethod, Jurisdiction, TaxExemption, TaxRule, TaxType};

// =============================================================================
// Input Side
// =============================================================================

/// A line item being taxed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxableItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    pub quantity: i64,
    #[serde(default)]
    pub is_digital: bool,
    #[serde(default)]
    pub is_luxury: bool,
    /// Item is tax exempt regardless of rules.
    #[serde(default)]
    pub is_exempt: bool,
}

impl TaxableItem {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        unit_price: Money,
        quantity: i64,
    ) -> Self {
        TaxableItem {
            id: id.into(),
            name: String::new(),
            category: category.into(),
            unit_price,
            quantity,
            is_digital: false,
            is_luxury: false,
            is_exempt: false,
        }
    }

    /// Line total before tax (unit price × quantity).
    ///
    /// Panics on overflow. The calculator checks every item with
    /// [`checked_total_amount`](Self::checked_total_amount) before taxing it.
    pub fn total_amount(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Line total, or `None` when it overflows.
    pub fn checked_total_amount(&self) -> Option<Money> {
        self.unit_price.checked_mul_quantity(self.quantity)
    }

    pub fn digital(mut self) -> Self {
        self.is_digital = true;
        self
    }

    pub fn luxury(mut self) -> Self {
        self.is_luxury = true;
        self
    }

    pub fn exempt(mut self) -> Self {
        self.is_exempt = true;
        self
    }
}

/// The buyer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    #[serde(default)]
    pub id: String,
    /// Free-form type such as "individual", "business", "nonprofit".
    #[serde(default)]
    pub customer_type: String,
    #[serde(default)]
    pub tax_ids: Vec<String>,
    #[serde(default)]
    pub exemptions: Vec<TaxExemption>,
}

/// A postal address used for geographic matching.
///
/// Empty fields mean "unknown" and never match a non-empty rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Address {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
}

impl Address {
    pub fn new(country: impl Into<String>, state: impl Into<String>) -> Self {
        Address {
            country: country.into(),
            state: state.into(),
            ..Address::default()
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = postal_code.into();
        self
    }
}

/// Kind of commercial transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Sale,
    Refund,
    Import,
    Export,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Refund => "refund",
            TransactionType::Import => "import",
            TransactionType::Export => "export",
        }
    }
}

/// A caller-imposed tax amount that replaces what a rule computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ManualOverride {
    /// `None` applies to every item the rule taxes.
    #[serde(default)]
    pub item_id: Option<String>,
    pub rule_id: String,
    pub tax_amount: Money,
    pub reason: String,
}

/// Everything the calculator needs for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CalculationInput {
    pub items: Vec<TaxableItem>,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub shipping_address: Address,
    #[ts(as = "String")]
    pub transaction_date: DateTime<Utc>,
    #[serde(default)]
    pub transaction_type: TransactionType,
    pub currency: String,
    #[serde(default)]
    pub shipping_amount: Money,
    #[serde(default)]
    pub discount_amount: Money,
    /// Replaces the registry's rules for this call only.
    #[serde(default)]
    pub rule_overrides: Option<Vec<TaxRule>>,
    #[serde(default)]
    pub manual_overrides: Vec<ManualOverride>,
    /// Free-form values readable by `context` conditions.
    #[serde(default)]
    pub context: BTreeMap<String, ConditionValue>,
}

impl CalculationInput {
    /// A sale of `items` on `transaction_date`, billed and shipped to `address`.
    pub fn new(
        items: Vec<TaxableItem>,
        address: Address,
        transaction_date: DateTime<Utc>,
        currency: impl Into<String>,
    ) -> Self {
        CalculationInput {
            items,
            customer: Customer::default(),
            billing_address: address.clone(),
            shipping_address: address,
            transaction_date,
            transaction_type: TransactionType::Sale,
            currency: currency.into(),
            shipping_amount: Money::zero(),
            discount_amount: Money::zero(),
            rule_overrides: None,
            manual_overrides: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_customer(mut self, customer: Customer) -> Self {
        self.customer = customer;
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }
}

// =============================================================================
// Output Side
// =============================================================================

/// One rule applied to one item. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedTax {
    pub rule_id: String,
    pub rule_name: String,
    pub tax_type: TaxType,
    pub jurisdiction: Jurisdiction,
    pub method: CalculationMethod,
    #[ts(type = "string")]
    pub rate: Decimal,
    pub taxable_amount: Money,
    pub tax_amount: Money,
    pub description: String,
    /// True when a manual override replaced the computed amount.
    #[serde(default)]
    pub is_override: bool,
}

/// Per-item aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxBreakdown {
    pub item_id: String,
    pub taxable_amount: Money,
    pub exempt_amount: Money,
    pub total_tax: Money,
    pub applied_taxes: Vec<AppliedTax>,
    #[serde(default)]
    pub exemption_reason: Option<String>,
}

impl TaxBreakdown {
    /// A breakdown for an item that is wholly exempt.
    pub fn exempt(item_id: impl Into<String>, amount: Money, reason: impl Into<String>) -> Self {
        TaxBreakdown {
            item_id: item_id.into(),
            taxable_amount: Money::zero(),
            exempt_amount: amount,
            total_tax: Money::zero(),
            applied_taxes: Vec::new(),
            exemption_reason: Some(reason.into()),
        }
    }
}

/// Transaction-level aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxCalculationResult {
    pub subtotal: Money,
    pub shipping_amount: Money,
    pub discount_amount: Money,
    pub total_tax: Money,
    pub grand_total: Money,
    pub taxable_amount: Money,
    pub exempt_amount: Money,
    pub applied_taxes: Vec<AppliedTax>,
    pub tax_breakdown: Vec<TaxBreakdown>,
    pub jurisdiction_totals: BTreeMap<String, Money>,
    pub tax_type_totals: BTreeMap<String, Money>,
    /// Percent of subtotal; zero when the subtotal is zero.
    #[ts(type = "string")]
    pub effective_rate: Decimal,
    pub currency: String,
    #[ts(as = "String")]
    pub calculation_date: DateTime<Utc>,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl TaxCalculationResult {
    /// An empty, valid result in `currency`.
    pub fn empty(currency: impl Into<String>, calculation_date: DateTime<Utc>) -> Self {
        TaxCalculationResult {
            subtotal: Money::zero(),
            shipping_amount: Money::zero(),
            discount_amount: Money::zero(),
            total_tax: Money::zero(),
            grand_total: Money::zero(),
            taxable_amount: Money::zero(),
            exempt_amount: Money::zero(),
            applied_taxes: Vec::new(),
            tax_breakdown: Vec::new(),
            jurisdiction_totals: BTreeMap::new(),
            tax_type_totals: BTreeMap::new(),
            effective_rate: Decimal::ZERO,
            currency: currency.into(),
            calculation_date,
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Records a fatal structural error.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(message.into());
    }

    /// Records a non-fatal problem.
    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
