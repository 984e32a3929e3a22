//! # Applicability Matcher
//!
//! Selects and orders the rules that apply to a transaction and its items.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  candidates   input.rule_overrides, or the registry's rules             │
//! │       │                                                                 │
//! │       ▼  in effect at the transaction date (active ∧ window)            │
//! │       ▼  type relevant (digital / luxury item, customs on import)       │
//! │       ▼  geographically applicable (shipping, then billing)             │
//! │       ▼  conditions hold                                                │
//! │       ▼  sort: priority DESC, id ASC                                    │
//! │                                                                         │
//! │  per item, the calculator then applies is_rule_applicable_to_item       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use levy_core::{Address, CalculationInput, TaxRule, TaxType, TaxableItem, TransactionType};

use crate::conditions::{evaluate_conditions, ConditionContext};
use crate::registry::TaxRuleRegistry;

/// Rules applicable to the transaction as a whole.
pub fn applicable_rules<'a>(
    registry: &'a TaxRuleRegistry,
    input: &'a CalculationInput,
) -> Vec<&'a TaxRule> {
    let ctx = ConditionContext::new(input);
    select(registry, input, None, &ctx)
}

/// Rules applicable with `item` as the focus of category conditions.
pub fn applicable_rules_for_item<'a>(
    registry: &'a TaxRuleRegistry,
    input: &'a CalculationInput,
    item: &'a TaxableItem,
) -> Vec<&'a TaxRule> {
    let ctx = ConditionContext::for_item(input, item);
    select(registry, input, Some(item), &ctx)
}

fn select<'a>(
    registry: &'a TaxRuleRegistry,
    input: &'a CalculationInput,
    item: Option<&TaxableItem>,
    ctx: &ConditionContext<'_>,
) -> Vec<&'a TaxRule> {
    let at = input.transaction_date;
    let candidates: Vec<&'a TaxRule> = match &input.rule_overrides {
        Some(overrides) => overrides.iter().collect(),
        None => registry.rules().collect(),
    };

    let mut rules: Vec<&'a TaxRule> = candidates
        .into_iter()
        .filter(|rule| rule.is_in_effect(at))
        .filter(|rule| is_type_relevant(rule, input, item))
        .filter(|rule| {
            is_geographically_applicable(rule, &input.billing_address, &input.shipping_address)
        })
        .filter(|rule| evaluate_conditions(&rule.conditions, ctx))
        .collect();

    sort_by_priority(&mut rules);
    rules
}

/// Priority descending, then id ascending.
pub fn sort_by_priority(rules: &mut [&TaxRule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
}

/// Digital and luxury taxes need a matching item, customs an import.
///
/// With no focus item, any item of the input satisfies the flag.
pub fn is_type_relevant(rule: &TaxRule, input: &CalculationInput, item: Option<&TaxableItem>) -> bool {
    let has = |flag: fn(&TaxableItem) -> bool| match item {
        Some(item) => flag(item),
        None => input.items.iter().any(flag),
    };

    match rule.tax_type {
        TaxType::Digital => has(|i| i.is_digital),
        TaxType::Luxury => has(|i| i.is_luxury),
        TaxType::Customs => input.transaction_type == TransactionType::Import,
        _ => true,
    }
}

/// Country, then state, city and postal code on the same address.
///
/// A rule without countries is global. Otherwise the shipping address is
/// tried first, then billing; whichever matches the country must also
/// satisfy every other non-empty list.
pub fn is_geographically_applicable(rule: &TaxRule, billing: &Address, shipping: &Address) -> bool {
    if rule.applicable_countries.is_empty() {
        return true;
    }

    [shipping, billing].into_iter().any(|address| {
        contains_ci(&rule.applicable_countries, &address.country)
            && (rule.applicable_states.is_empty() || contains_ci(&rule.applicable_states, &address.state))
            && (rule.applicable_cities.is_empty() || contains_ci(&rule.applicable_cities, &address.city))
            && (rule.applicable_postal_codes.is_empty()
                || rule
                    .applicable_postal_codes
                    .iter()
                    .any(|pattern| postal_code_matches(pattern, &address.postal_code)))
    })
}

/// Exact match, or prefix match when the pattern ends with `*`.
pub fn postal_code_matches(pattern: &str, postal_code: &str) -> bool {
    let code = postal_code.trim();
    if code.is_empty() {
        return false;
    }
    match pattern.trim().strip_suffix('*') {
        Some(prefix) => code
            .to_ascii_uppercase()
            .starts_with(&prefix.to_ascii_uppercase()),
        None => pattern.trim().eq_ignore_ascii_case(code),
    }
}

/// Category allow/deny lists, item flags and amount bounds.
///
/// An exempt category wins over an applicable one. `max_amount == 0`
/// leaves the upper bound open; both bounds are inclusive.
pub fn is_rule_applicable_to_item(rule: &TaxRule, item: &TaxableItem) -> bool {
    if contains_ci(&rule.exempt_categories, &item.category) {
        return false;
    }
    if !rule.applicable_categories.is_empty() && !contains_ci(&rule.applicable_categories, &item.category) {
        return false;
    }

    match rule.tax_type {
        TaxType::Digital if !item.is_digital => return false,
        TaxType::Luxury if !item.is_luxury => return false,
        _ => {}
    }

    let Some(amount) = item.checked_total_amount() else {
        return false;
    };
    amount >= rule.min_amount && (rule.max_amount.is_zero() || amount <= rule.max_amount)
}

fn contains_ci(values: &[String], needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && values.iter().any(|v| v.trim().eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use levy_core::{CalculationMethod, ConditionOperator, ConditionType, Jurisdiction, Money, TaxCondition};
    use rust_decimal_macros::dec;

    fn rule(id: &str, tax_type: TaxType, jurisdiction: Jurisdiction) -> TaxRule {
        TaxRule::new(id, id, tax_type, jurisdiction, CalculationMethod::Percentage, dec!(5))
    }

    fn input(items: Vec<TaxableItem>, address: Address) -> CalculationInput {
        let date = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        CalculationInput::new(items, address, date, "USD")
    }

    fn item(category: &str, major: i64) -> TaxableItem {
        TaxableItem::new("i1", category, Money::from_major(major), 1)
    }

    #[test]
    fn test_geography_country_and_state() {
        let ny = rule("ny", TaxType::Sales, Jurisdiction::State)
            .with_countries(&["US"])
            .with_states(&["NY"]);

        let us_ny = Address::new("us", "ny");
        let us_ca = Address::new("US", "CA");
        assert!(is_geographically_applicable(&ny, &us_ny, &us_ny));
        assert!(!is_geographically_applicable(&ny, &us_ca, &us_ca));
        // Billing matches even if shipping does not
        assert!(is_geographically_applicable(&ny, &us_ny, &us_ca));

        let global = rule("g", TaxType::Vat, Jurisdiction::International);
        assert!(is_geographically_applicable(&global, &Address::default(), &Address::default()));
    }

    #[test]
    fn test_state_must_match_on_the_matching_address() {
        let ny = rule("ny", TaxType::Sales, Jurisdiction::State)
            .with_countries(&["US"])
            .with_states(&["NY"]);
        let ca_ny = Address::new("CA", "NY");
        let us_on = Address::new("US", "ON");
        assert!(!is_geographically_applicable(&ny, &ca_ny, &us_on));
    }

    #[test]
    fn test_city_and_postal_codes() {
        let nyc = rule("nyc", TaxType::Sales, Jurisdiction::City)
            .with_countries(&["US"])
            .with_cities(&["New York"])
            .with_postal_codes(&["100*", "11201"]);

        let manhattan = Address::new("US", "NY").with_city("new york").with_postal_code("10001");
        let brooklyn = Address::new("US", "NY").with_city("New York").with_postal_code("11201");
        let queens = Address::new("US", "NY").with_city("New York").with_postal_code("11354");
        let buffalo = Address::new("US", "NY").with_city("Buffalo").with_postal_code("10001");

        assert!(is_geographically_applicable(&nyc, &manhattan, &manhattan));
        assert!(is_geographically_applicable(&nyc, &brooklyn, &brooklyn));
        assert!(!is_geographically_applicable(&nyc, &queens, &queens));
        assert!(!is_geographically_applicable(&nyc, &buffalo, &buffalo));

        assert!(postal_code_matches("*", "99999"));
        assert!(!postal_code_matches("100*", ""));
    }

    #[test]
    fn test_item_categories_and_bounds() {
        let r = rule("r", TaxType::Sales, Jurisdiction::State)
            .with_categories(&["electronics", "food"])
            .with_exempt_categories(&["Food"])
            .with_amount_bounds(Money::from_major(10), Money::from_major(1000));

        assert!(is_rule_applicable_to_item(&r, &item("electronics", 10)));
        assert!(is_rule_applicable_to_item(&r, &item("electronics", 1000)));
        assert!(!is_rule_applicable_to_item(&r, &item("electronics", 1001)));
        assert!(!is_rule_applicable_to_item(&r, &item("electronics", 9)));
        assert!(!is_rule_applicable_to_item(&r, &item("food", 50)));
        assert!(!is_rule_applicable_to_item(&r, &item("toys", 50)));

        let open = rule("o", TaxType::Sales, Jurisdiction::State);
        assert!(is_rule_applicable_to_item(&open, &item("anything", 1_000_000)));
    }

    #[test]
    fn test_type_relevance() {
        let digital = rule("d", TaxType::Digital, Jurisdiction::Federal);
        let customs = rule("c", TaxType::Customs, Jurisdiction::Federal);

        let physical = input(vec![item("books", 10)], Address::new("US", "NY"));
        assert!(!is_type_relevant(&digital, &physical, None));
        assert!(!is_type_relevant(&customs, &physical, None));

        let ebook = item("books", 10).digital();
        let mixed = input(vec![item("books", 10), ebook.clone()], Address::new("US", "NY"))
            .with_transaction_type(TransactionType::Import);
        assert!(is_type_relevant(&digital, &mixed, None));
        assert!(is_type_relevant(&digital, &mixed, Some(&ebook)));
        assert!(!is_type_relevant(&digital, &mixed, Some(&mixed.items[0])));
        assert!(is_type_relevant(&customs, &mixed, None));

        assert!(!is_rule_applicable_to_item(&digital, &item("books", 10)));
        assert!(is_rule_applicable_to_item(&digital, &ebook));
    }

    #[test]
    fn test_applicable_rules_filter_and_order() {
        let mut registry = TaxRuleRegistry::new();
        registry
            .add_rule(rule("state", TaxType::Sales, Jurisdiction::State).with_countries(&["US"]).with_priority(5))
            .unwrap();
        registry
            .add_rule(rule("b-city", TaxType::Sales, Jurisdiction::City).with_countries(&["US"]).with_priority(10))
            .unwrap();
        registry
            .add_rule(rule("a-county", TaxType::Sales, Jurisdiction::County).with_countries(&["US"]).with_priority(10))
            .unwrap();
        registry
            .add_rule(rule("eu", TaxType::Vat, Jurisdiction::International).with_countries(&["DE"]))
            .unwrap();
        registry
            .add_rule(rule("off", TaxType::Excise, Jurisdiction::Federal).inactive())
            .unwrap();
        registry
            .add_rule(
                rule("big", TaxType::Luxury, Jurisdiction::Federal).with_conditions(vec![TaxCondition::new(
                    ConditionType::Amount,
                    ConditionOperator::GreaterThan,
                    1000.0,
                )]),
            )
            .unwrap();

        let input = input(vec![item("electronics", 100).luxury()], Address::new("US", "NY"));
        let ids: Vec<&str> = applicable_rules(&registry, &input).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a-county", "b-city", "state"]);
    }

    #[test]
    fn test_rule_overrides_replace_registry() {
        let mut registry = TaxRuleRegistry::new();
        registry
            .add_rule(rule("registry", TaxType::Sales, Jurisdiction::State))
            .unwrap();

        let mut input = input(vec![item("food", 10)], Address::new("US", "NY"));
        input.rule_overrides = Some(vec![rule("override", TaxType::Vat, Jurisdiction::Federal)]);

        let ids: Vec<String> = applicable_rules(&registry, &input).iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["override".to_string()]);
    }

    #[test]
    fn test_category_condition_uses_item_focus() {
        let mut registry = TaxRuleRegistry::new();
        registry
            .add_rule(
                rule("books-only", TaxType::Sales, Jurisdiction::State).with_conditions(vec![TaxCondition::new(
                    ConditionType::Category,
                    ConditionOperator::Equal,
                    "books",
                )]),
            )
            .unwrap();

        let input = input(vec![item("food", 10), item("books", 10)], Address::new("US", "NY"));
        assert!(applicable_rules(&registry, &input).is_empty());
        assert!(applicable_rules_for_item(&registry, &input, &input.items[0]).is_empty());
        assert_eq!(applicable_rules_for_item(&registry, &input, &input.items[1]).len(), 1);
    }
}
