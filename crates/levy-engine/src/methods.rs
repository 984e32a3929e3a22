//! # Tax Method Calculator
//!
//! Turns one rule plus a taxable base into one [`AppliedTax`].
//!
//! ## Tiered vs Progressive
//! ```text
//!   bands:  [0, 100) 5%   [100, 500) 10%   [500, ∞) 15%      base = 600
//!
//!   tiered       600 falls in [500, ∞)       → 600 × 15%            = 90
//!   progressive  100 × 5% + 400 × 10% + 100 × 15%  = 5 + 40 + 15    = 60
//! ```
//!
//! Arithmetic stays unrounded until the end; the final tax amount passes
//! through the configured rounding once.

use levy_core::{AppliedTax, CalculationMethod, Money, TaxRule, TaxThreshold};
use rust_decimal::Decimal;

use crate::config::TaxConfig;

/// Computes `rule` against `taxable`.
///
/// `prior_tax` is the tax already applied to the same item by rules
/// earlier in priority order. Only compound rules read it, and only when
/// `config.compound_taxes` is set.
pub fn calculate_tax_for_rule(
    rule: &TaxRule,
    taxable: Money,
    prior_tax: Money,
    config: &TaxConfig,
) -> AppliedTax {
    applied_tax(rule, raw_tax(rule, taxable, prior_tax, config), config)
}

/// Unrounded outcome of one rule on one base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTax {
    /// Rate actually applied (a tiered rule reports its band's rate).
    pub rate: Decimal,
    /// Base the rate was applied to (taxable plus prior tax for compound).
    pub base: Money,
    pub tax: Money,
}

/// [`calculate_tax_for_rule`] without rounding.
pub fn raw_tax(rule: &TaxRule, taxable: Money, prior_tax: Money, config: &TaxConfig) -> RawTax {
    let mut rate = rule.rate;
    let mut base = taxable;

    let tax = match rule.method {
        CalculationMethod::Percentage => taxable.percent_of(rule.rate),
        CalculationMethod::Fixed => Money::new(rule.rate),
        CalculationMethod::Tiered => match find_band(&rule.thresholds, taxable) {
            Some(band) => {
                rate = band.rate;
                band.fixed_amount.unwrap_or_else(|| taxable.percent_of(band.rate))
            }
            None => Money::zero(),
        },
        CalculationMethod::Progressive => progressive_tax(&rule.thresholds, taxable),
        CalculationMethod::Compound => {
            if config.compound_taxes {
                base = taxable + prior_tax;
            }
            base.percent_of(rule.rate)
        }
    };

    RawTax { rate, base, tax }
}

/// Rounds a [`RawTax`] into the line reported for `rule`.
pub fn applied_tax(rule: &TaxRule, raw: RawTax, config: &TaxConfig) -> AppliedTax {
    AppliedTax {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        tax_type: rule.tax_type,
        jurisdiction: rule.jurisdiction,
        method: rule.method,
        rate: raw.rate,
        taxable_amount: config.round(raw.base),
        tax_amount: config.round(raw.tax),
        description: describe(rule, raw.rate),
        is_override: false,
    }
}

/// Methods whose tax is `a × base + b` for constants `a` and `b`.
///
/// Tiered and progressive rules change rate with the base.
pub fn is_linear(method: CalculationMethod) -> bool {
    !matches!(method, CalculationMethod::Tiered | CalculationMethod::Progressive)
}

/// The single band holding `amount`. Bands are searched in ascending
/// `min_amount` order, so overlapping bands resolve to the lowest.
pub fn find_band(bands: &[TaxThreshold], amount: Money) -> Option<&TaxThreshold> {
    let mut sorted: Vec<&TaxThreshold> = bands.iter().collect();
    sorted.sort_by_key(|band| band.min_amount);
    sorted.into_iter().find(|band| band.contains(amount))
}

/// Marginal tax: every band taxes only the slice of `amount` inside it.
pub fn progressive_tax(bands: &[TaxThreshold], amount: Money) -> Money {
    let mut sorted: Vec<&TaxThreshold> = bands.iter().collect();
    sorted.sort_by_key(|band| band.min_amount);

    sorted
        .into_iter()
        .filter(|band| amount > band.min_amount)
        .map(|band| {
            let top = if band.is_unbounded() {
                amount
            } else {
                amount.min(band.max_amount)
            };
            let slice = top - band.min_amount;
            slice.percent_of(band.rate) + band.fixed_amount.unwrap_or_default()
        })
        .sum()
}

fn describe(rule: &TaxRule, rate: Decimal) -> String {
    if !rule.description.is_empty() {
        return rule.description.clone();
    }
    match rule.method {
        CalculationMethod::Fixed => format!("{} ({} fixed)", rule.name, rate.normalize()),
        method => format!("{} ({} {}%)", rule.name, method, rate.normalize()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levy_core::{Jurisdiction, RoundingMode, TaxType};
    use rust_decimal_macros::dec;

    fn rule(method: CalculationMethod, rate: Decimal) -> TaxRule {
        TaxRule::new("r", "Rule", TaxType::Sales, Jurisdiction::State, method, rate)
    }

    fn brackets() -> Vec<TaxThreshold> {
        vec![
            TaxThreshold::rate(Money::from_major(500), Money::zero(), dec!(15)),
            TaxThreshold::rate(Money::zero(), Money::from_major(100), dec!(5)),
            TaxThreshold::rate(Money::from_major(100), Money::from_major(500), dec!(10)),
        ]
    }

    fn money(s: Decimal) -> Money {
        Money::new(s)
    }

    #[test]
    fn test_percentage_is_rounded() {
        let config = TaxConfig::default();
        let applied = calculate_tax_for_rule(
            &rule(CalculationMethod::Percentage, dec!(8.25)),
            money(dec!(19.99)),
            Money::zero(),
            &config,
        );
        // 19.99 × 8.25% = 1.649175
        assert_eq!(applied.tax_amount, money(dec!(1.65)));
        assert_eq!(applied.description, "Rule (percentage 8.25%)");

        let floor = TaxConfig {
            rounding_mode: RoundingMode::Floor,
            ..TaxConfig::default()
        };
        let applied = calculate_tax_for_rule(
            &rule(CalculationMethod::Percentage, dec!(8.25)),
            money(dec!(19.99)),
            Money::zero(),
            &floor,
        );
        assert_eq!(applied.tax_amount, money(dec!(1.64)));
    }

    #[test]
    fn test_fixed_ignores_base() {
        let applied = calculate_tax_for_rule(
            &rule(CalculationMethod::Fixed, dec!(2.50)),
            Money::from_major(1000),
            Money::zero(),
            &TaxConfig::default(),
        );
        assert_eq!(applied.tax_amount, money(dec!(2.50)));
    }

    #[test]
    fn test_tiered_uses_single_band() {
        let r = rule(CalculationMethod::Tiered, Decimal::ZERO).with_thresholds(brackets());
        let config = TaxConfig::default();

        let applied = calculate_tax_for_rule(&r, Money::from_major(600), Money::zero(), &config);
        assert_eq!(applied.tax_amount, Money::from_major(90));
        assert_eq!(applied.rate, dec!(15));

        let applied = calculate_tax_for_rule(&r, Money::from_major(100), Money::zero(), &config);
        assert_eq!(applied.tax_amount, Money::from_major(10));

        let with_gap = rule(CalculationMethod::Tiered, Decimal::ZERO).with_thresholds(vec![
            TaxThreshold::fixed(Money::from_major(10), Money::from_major(20), Money::from_major(3)),
        ]);
        assert_eq!(
            calculate_tax_for_rule(&with_gap, Money::from_major(15), Money::zero(), &config).tax_amount,
            Money::from_major(3)
        );
        assert!(calculate_tax_for_rule(&with_gap, Money::from_major(5), Money::zero(), &config)
            .tax_amount
            .is_zero());
    }

    #[test]
    fn test_progressive_brackets() {
        assert_eq!(progressive_tax(&brackets(), Money::from_major(600)), Money::from_major(60));
        assert_eq!(progressive_tax(&brackets(), Money::from_major(100)), Money::from_major(5));
        assert_eq!(progressive_tax(&brackets(), Money::zero()), Money::zero());
    }

    #[test]
    fn test_progressive_is_monotonic() {
        let bands = brackets();
        let mut previous = Money::zero();
        for major in (0..=1200).step_by(25) {
            let tax = progressive_tax(&bands, Money::from_major(major));
            assert!(tax >= previous, "tax dropped at {major}");
            previous = tax;
        }
    }

    #[test]
    fn test_progressive_fixed_fee_once_entered() {
        let bands = vec![
            TaxThreshold::rate(Money::zero(), Money::from_major(100), dec!(0)),
            TaxThreshold::fixed(Money::from_major(100), Money::zero(), Money::from_major(7)),
        ];
        assert!(progressive_tax(&bands, Money::from_major(100)).is_zero());
        assert_eq!(progressive_tax(&bands, Money::from_major(101)), Money::from_major(7));
    }

    #[test]
    fn test_raw_tax_is_unrounded() {
        let raw = raw_tax(
            &rule(CalculationMethod::Percentage, dec!(8.25)),
            money(dec!(19.99)),
            Money::zero(),
            &TaxConfig::default(),
        );
        assert_eq!(raw.tax, money(dec!(1.649175)));
        assert_eq!(raw.base, money(dec!(19.99)));

        assert!(is_linear(CalculationMethod::Compound));
        assert!(is_linear(CalculationMethod::Fixed));
        assert!(!is_linear(CalculationMethod::Progressive));
    }

    #[test]
    fn test_compound_respects_config() {
        let r = rule(CalculationMethod::Compound, dec!(10));
        let prior = Money::from_major(5);

        let on = TaxConfig {
            compound_taxes: true,
            ..TaxConfig::default()
        };
        let applied = calculate_tax_for_rule(&r, Money::from_major(100), prior, &on);
        assert_eq!(applied.taxable_amount, Money::from_major(105));
        assert_eq!(applied.tax_amount, money(dec!(10.5)));

        let off = TaxConfig::default();
        let applied = calculate_tax_for_rule(&r, Money::from_major(100), prior, &off);
        assert_eq!(applied.tax_amount, Money::from_major(10));
    }
}
