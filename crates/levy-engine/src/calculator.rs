//! # Tax Calculator
//!
//! Drives the per-item pipeline and rolls results up into transaction totals.
//!
//! ## Per-Item Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  item ──► structural checks ──✗──► warning, item skipped                │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  taxable base = line total − prorated discount (unless tax_on_discounts)│
//! │              │                                                          │
//! │              ▼                                                          │
//! │  item.is_exempt / customer exemption ──► TaxBreakdown::exempt           │
//! │              │                                                          │
//! │              ▼  for each matched rule, priority order                   │
//! │     rule-level exemption? ──► skip rule                                 │
//! │     calculate_tax_for_rule(base, running tax) → AppliedTax              │
//! │     manual override? ──► replace tax_amount, is_override = true         │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  inclusive pricing? ──► solve net + tax(net) = price, tax = price − net │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Totals
//! ```text
//! subtotal      Σ line totals of accepted items
//! total_tax     Σ breakdown.total_tax   (shipping breakdown included)
//! grand_total   subtotal − discount + shipping + total_tax   (exclusive)
//!               subtotal − discount + shipping               (inclusive)
//! effective     total_tax / subtotal × 100, zero when subtotal is zero
//! ```
//!
//! A discount larger than the subtotal is a fatal input error, so the
//! grand total is never negative.

use chrono::Utc;
use levy_core::{
    AppliedTax, CalculationInput, ManualOverride, Money, TaxBreakdown, TaxCalculationResult,
    TaxRule, TaxableItem,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::TaxConfig;
use crate::exemption::{is_customer_exempt, rule_exemption};
use crate::matcher::{applicable_rules_for_item, is_rule_applicable_to_item};
use crate::methods::{applied_tax, calculate_tax_for_rule, is_linear, raw_tax, RawTax};
use crate::registry::TaxRuleRegistry;

/// Id and category of the synthetic line used to tax shipping.
pub const SHIPPING_ITEM_ID: &str = "shipping";

/// Decimal places kept on the effective rate.
const EFFECTIVE_RATE_PRECISION: u32 = 4;

/// Halvings used to back non-linear taxes out of an inclusive price.
const BISECTION_STEPS: usize = 96;

/// Stateless calculator over a borrowed registry.
#[derive(Debug, Clone)]
pub struct TaxCalculator<'a> {
    registry: &'a TaxRuleRegistry,
    config: TaxConfig,
}

impl<'a> TaxCalculator<'a> {
    /// Uses the registry's own configuration.
    pub fn new(registry: &'a TaxRuleRegistry) -> Self {
        TaxCalculator {
            registry,
            config: registry.config().clone(),
        }
    }

    pub fn with_config(registry: &'a TaxRuleRegistry, config: TaxConfig) -> Self {
        TaxCalculator { registry, config }
    }

    pub fn config(&self) -> &TaxConfig {
        &self.config
    }

    /// Σ line totals, rounded. `None` when the sum overflows.
    pub fn calculate_subtotal<'i, I>(&self, items: I) -> Option<Money>
    where
        I: IntoIterator<Item = &'i TaxableItem>,
    {
        items
            .into_iter()
            .try_fold(Money::zero(), |total, item| {
                item.checked_total_amount()
                    .and_then(|line| total.checked_add(line))
            })
            .map(|total| self.config.round(total))
    }

    /// Calculates every tax on `input`.
    ///
    /// Never fails. Structural problems with the input set `is_valid` to
    /// false and are listed in `errors`; problems with single items are
    /// listed in `warnings` and the item is skipped.
    pub fn calculate_tax(&self, input: &CalculationInput) -> TaxCalculationResult {
        let currency = if input.currency.trim().is_empty() {
            self.config.default_currency.clone()
        } else {
            input.currency.clone()
        };
        let mut result = TaxCalculationResult::empty(currency, Utc::now());

        self.check_input(input, &mut result);
        if !result.is_valid {
            warn!(errors = ?result.errors, "Rejected tax calculation input");
            return result;
        }

        let (items, raw_subtotal) = self.accepted_items(input, &mut result);
        let discount = input.discount_amount;
        if discount > raw_subtotal {
            result.push_error(format!(
                "discount amount {} exceeds subtotal {}",
                discount, raw_subtotal
            ));
            warn!(%discount, subtotal = %raw_subtotal, "Rejected tax calculation input");
            return result;
        }

        for item in &items {
            let line_total = item.total_amount();
            let base = if self.config.tax_on_discounts || discount.is_zero() {
                line_total
            } else {
                let share = line_total.ratio_of(raw_subtotal);
                (line_total - discount.scale(share)).max(Money::zero())
            };

            let rules = applicable_rules_for_item(self.registry, input, item);
            let breakdown = self.item_tax_on_base(item, base, &rules, input);
            debug!(
                item_id = %item.id,
                base = %base,
                rules = rules.len(),
                total_tax = %breakdown.total_tax,
                "Calculated item tax"
            );
            result.tax_breakdown.push(breakdown);
        }

        if self.config.tax_on_shipping && input.shipping_amount.is_positive() {
            let shipping = TaxableItem::new(SHIPPING_ITEM_ID, SHIPPING_ITEM_ID, input.shipping_amount, 1);
            let rules = applicable_rules_for_item(self.registry, input, &shipping);
            let breakdown = self.item_tax_on_base(&shipping, shipping.total_amount(), &rules, input);
            result.tax_breakdown.push(breakdown);
        }

        self.roll_up(input, raw_subtotal, &mut result);
        self.check_unused_overrides(input, &mut result);

        info!(
            items = items.len(),
            subtotal = %result.subtotal,
            total_tax = %result.total_tax,
            grand_total = %result.grand_total,
            warnings = result.warnings.len(),
            "Calculated transaction tax"
        );
        result
    }

    /// Taxes one item on its full line total.
    pub fn calculate_item_tax(
        &self,
        item: &TaxableItem,
        rules: &[&TaxRule],
        input: &CalculationInput,
    ) -> TaxBreakdown {
        let line_total = item.checked_total_amount().unwrap_or_default();
        self.item_tax_on_base(item, line_total, rules, input)
    }

    fn item_tax_on_base(
        &self,
        item: &TaxableItem,
        base: Money,
        rules: &[&TaxRule],
        input: &CalculationInput,
    ) -> TaxBreakdown {
        let base = self.config.round(base);

        // Exempt amounts are the undiscounted line total
        if item.is_exempt {
            return TaxBreakdown::exempt(&item.id, self.exempt_amount(item, base), "item is tax exempt");
        }
        if let Some(reason) = is_customer_exempt(&input.customer, item, input) {
            return TaxBreakdown::exempt(&item.id, self.exempt_amount(item, base), reason);
        }

        let rules: Vec<&TaxRule> = rules
            .iter()
            .copied()
            .filter(|rule| is_rule_applicable_to_item(rule, item))
            .filter(|rule| rule_exemption(rule, item, input).is_none())
            .collect();

        if self.config.tax_inclusive_pricing {
            self.inclusive_breakdown(item, base, &rules, input)
        } else {
            self.exclusive_breakdown(item, base, &rules, input)
        }
    }

    fn exempt_amount(&self, item: &TaxableItem, base: Money) -> Money {
        item.checked_total_amount()
            .map_or(base, |line_total| self.config.round(line_total))
    }

    /// Taxes added on top of `base`; compound rules see the rounded tax
    /// of the lines before them.
    fn exclusive_breakdown(
        &self,
        item: &TaxableItem,
        base: Money,
        rules: &[&TaxRule],
        input: &CalculationInput,
    ) -> TaxBreakdown {
        let mut running = Money::zero();
        let mut applied = Vec::with_capacity(rules.len());
        for rule in rules {
            let tax = self.apply_override(
                calculate_tax_for_rule(rule, base, running, &self.config),
                item,
                input,
            );
            running += tax.tax_amount;
            applied.push(tax);
        }

        let total_tax: Money = applied.iter().map(|tax| tax.tax_amount).sum();
        breakdown(item, base, total_tax, applied)
    }

    /// Splits a tax-inclusive `price` into net amount and tax.
    ///
    /// The net amount solves `net + tax(net) = price`. When every line is
    /// linear (percentage, fixed, compound or a manual override) the tax
    /// is `a × net + b` and `net = (price − b) / (1 + a)` exactly;
    /// otherwise the net amount is found by bisection. The total tax is
    /// rounded once, and the last computed line absorbs the difference
    /// between that total and the individually rounded lines.
    fn inclusive_breakdown(
        &self,
        item: &TaxableItem,
        price: Money,
        rules: &[&TaxRule],
        input: &CalculationInput,
    ) -> TaxBreakdown {
        let overrides: Vec<Option<&ManualOverride>> = rules
            .iter()
            .map(|rule| find_override(input, &rule.id, item))
            .collect();
        let tax_at = |net: Money| -> Money {
            self.raw_lines(net, rules, &overrides)
                .iter()
                .map(|raw| raw.tax)
                .sum()
        };

        let linear = rules
            .iter()
            .zip(&overrides)
            .all(|(rule, manual)| manual.is_some() || is_linear(rule.method));
        let net = if linear {
            let fixed = tax_at(Money::zero());
            let slope = (tax_at(Money::from_major(1)) - fixed).amount();
            Money::new((price - fixed).amount() / (Decimal::ONE + slope))
        } else {
            let (mut low, mut high) = (Money::zero(), price);
            for _ in 0..BISECTION_STEPS {
                let mid = Money::new((low.amount() + high.amount()) / Decimal::TWO);
                if mid + tax_at(mid) > price {
                    high = mid;
                } else {
                    low = mid;
                }
            }
            low
        };
        let net = net.max(Money::zero()).min(price);
        let total_tax = self.config.round(price - net);

        let mut applied: Vec<AppliedTax> = self
            .raw_lines(net, rules, &overrides)
            .into_iter()
            .zip(rules)
            .map(|(raw, rule)| self.apply_override(applied_tax(rule, raw, &self.config), item, input))
            .collect();

        let residual = total_tax - applied.iter().map(|tax| tax.tax_amount).sum::<Money>();
        if !residual.is_zero() {
            if let Some(last) = applied.iter_mut().rev().find(|tax| !tax.is_override) {
                last.tax_amount += residual;
            }
        }

        debug!(item_id = %item.id, %price, %net, %total_tax, linear, "Backed tax out of inclusive price");
        breakdown(item, price - total_tax, total_tax, applied)
    }

    /// Unrounded tax of every rule on `net`, in order. Compound rules see
    /// the unrounded tax before them; overridden lines contribute their
    /// manual amount.
    fn raw_lines(
        &self,
        net: Money,
        rules: &[&TaxRule],
        overrides: &[Option<&ManualOverride>],
    ) -> Vec<RawTax> {
        let mut running = Money::zero();
        rules
            .iter()
            .zip(overrides)
            .map(|(rule, manual)| {
                let raw = match manual {
                    Some(manual) => RawTax {
                        rate: rule.rate,
                        base: net,
                        tax: self.config.round(manual.tax_amount),
                    },
                    None => raw_tax(rule, net, running, &self.config),
                };
                running += raw.tax;
                raw
            })
            .collect()
    }

    /// Replaces the amount when a manual override targets this rule and item.
    fn apply_override(&self, tax: AppliedTax, item: &TaxableItem, input: &CalculationInput) -> AppliedTax {
        match find_override(input, &tax.rule_id, item) {
            Some(manual) => {
                debug!(
                    rule_id = %tax.rule_id,
                    item_id = %item.id,
                    computed = %tax.tax_amount,
                    overridden = %manual.tax_amount,
                    "Applying manual tax override"
                );
                AppliedTax {
                    tax_amount: self.config.round(manual.tax_amount),
                    description: format!("{} (override: {})", tax.description, manual.reason),
                    is_override: true,
                    ..tax
                }
            }
            None => tax,
        }
    }

    fn check_input(&self, input: &CalculationInput, result: &mut TaxCalculationResult) {
        if input.items.is_empty() {
            result.push_error("at least one item is required");
        }
        if input.currency.trim().is_empty() {
            result.push_error("currency is required");
        }
        if input.shipping_amount.is_negative() {
            result.push_error(format!("shipping amount must not be negative, got {}", input.shipping_amount));
        }
        if input.discount_amount.is_negative() {
            result.push_error(format!("discount amount must not be negative, got {}", input.discount_amount));
        }
        if input.shipping_amount.exceeds_supported() {
            result.push_error(format!("shipping amount must not exceed {}", Money::MAX_SUPPORTED));
        }
        if input.discount_amount.exceeds_supported() {
            result.push_error(format!("discount amount must not exceed {}", Money::MAX_SUPPORTED));
        }
    }

    /// Items that pass [`admit_item`], with their subtotal.
    fn accepted_items<'i>(
        &self,
        input: &'i CalculationInput,
        result: &mut TaxCalculationResult,
    ) -> (Vec<&'i TaxableItem>, Money) {
        let mut accepted = Vec::with_capacity(input.items.len());
        let mut subtotal = Money::zero();
        for (index, item) in input.items.iter().enumerate() {
            match admit_item(item, subtotal) {
                Ok(next) => {
                    subtotal = next;
                    accepted.push(item);
                }
                Err(problem) => {
                    warn!(index, item_id = %item.id, %problem, "Skipping invalid item");
                    result.push_warning(format!("item {} ({}) {}, skipped", index, item.id, problem));
                }
            }
        }
        (accepted, subtotal)
    }

    fn roll_up(&self, input: &CalculationInput, raw_subtotal: Money, result: &mut TaxCalculationResult) {
        let round = |amount: Money| self.config.round(amount);

        result.subtotal = round(raw_subtotal);
        result.shipping_amount = round(input.shipping_amount);
        result.discount_amount = round(input.discount_amount);

        for breakdown in &result.tax_breakdown {
            result.total_tax += breakdown.total_tax;
            result.taxable_amount += breakdown.taxable_amount;
            result.exempt_amount += breakdown.exempt_amount;

            for tax in &breakdown.applied_taxes {
                *result
                    .jurisdiction_totals
                    .entry(tax.jurisdiction.as_str().to_string())
                    .or_default() += tax.tax_amount;
                *result
                    .tax_type_totals
                    .entry(tax.tax_type.as_str().to_string())
                    .or_default() += tax.tax_amount;
                result.applied_taxes.push(tax.clone());
            }
        }

        let before_tax = result.subtotal - result.discount_amount + result.shipping_amount;
        result.grand_total = if self.config.tax_inclusive_pricing {
            before_tax
        } else {
            before_tax + result.total_tax
        };

        result.effective_rate = (result.total_tax.ratio_of(result.subtotal) * Decimal::ONE_HUNDRED)
            .round_dp(EFFECTIVE_RATE_PRECISION);
    }

    fn check_unused_overrides(&self, input: &CalculationInput, result: &mut TaxCalculationResult) {
        let unused: Vec<String> = input
            .manual_overrides
            .iter()
            .filter(|manual| {
                !result.tax_breakdown.iter().any(|breakdown| {
                    manual.item_id.as_deref().map_or(true, |id| id == breakdown.item_id)
                        && breakdown
                            .applied_taxes
                            .iter()
                            .any(|tax| tax.is_override && tax.rule_id == manual.rule_id)
                })
            })
            .map(|manual| manual.rule_id.clone())
            .collect();

        for rule_id in unused {
            result.push_warning(format!("manual override for rule {} matched no applied tax", rule_id));
        }
    }
}

/// Structural and range checks for one item. Returns the subtotal with
/// the item added, or why the item is skipped.
fn admit_item(item: &TaxableItem, subtotal: Money) -> Result<Money, String> {
    if item.id.trim().is_empty() {
        return Err("has no id".to_string());
    }
    if item.quantity <= 0 {
        return Err(format!("has non-positive quantity {}", item.quantity));
    }
    if item.unit_price.is_negative() {
        return Err(format!("has negative price {}", item.unit_price));
    }

    let line_total = item
        .checked_total_amount()
        .filter(|line| !line.exceeds_supported())
        .ok_or_else(|| format!("has a line total above {}", Money::MAX_SUPPORTED))?;
    subtotal
        .checked_add(line_total)
        .filter(|total| !total.exceeds_supported())
        .ok_or_else(|| format!("would push the subtotal above {}", Money::MAX_SUPPORTED))
}

fn find_override<'i>(input: &'i CalculationInput, rule_id: &str, item: &TaxableItem) -> Option<&'i ManualOverride> {
    input.manual_overrides.iter().find(|manual| {
        manual.rule_id == rule_id && manual.item_id.as_deref().map_or(true, |id| id == item.id)
    })
}

fn breakdown(item: &TaxableItem, taxable: Money, total_tax: Money, applied: Vec<AppliedTax>) -> TaxBreakdown {
    TaxBreakdown {
        item_id: item.id.clone(),
        taxable_amount: taxable,
        exempt_amount: Money::zero(),
        total_tax,
        applied_taxes: applied,
        exemption_reason: None,
    }
}
