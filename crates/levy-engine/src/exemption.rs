//! # Exemption Resolver
//!
//! Decides whether an exemption suppresses tax on an item.
//!
//! ```text
//! exemption suppresses tax  ⇔  applicable   (window ∋ date, category in scope)
//!                            ∧ relevant     (by exemption type, below)
//!                            ∧ conditions hold against {item, customer}
//!
//!   customer, transaction   always relevant
//!   item                    relevant when the item is in category scope
//!   location                relevant only when it carries conditions
//!                           (conditions are its only notion of place)
//! ```
//!
//! Conditions are evaluated against a single-item input so that `amount`
//! and `quantity` conditions see the item, not the whole basket.

use chrono::{DateTime, Utc};
use levy_core::{CalculationInput, Customer, ExemptionType, TaxExemption, TaxRule, TaxableItem};
use tracing::debug;

use crate::conditions::{evaluate_conditions, ConditionContext};

/// Returns the reason of the first customer exemption covering `item`.
pub fn is_customer_exempt(
    customer: &Customer,
    item: &TaxableItem,
    input: &CalculationInput,
) -> Option<String> {
    let exemption = find_exemption(&customer.exemptions, customer, item, input)?;
    debug!(
        customer_id = %customer.id,
        item_id = %item.id,
        reason = %exemption.reason,
        "Customer exemption applies"
    );
    Some(describe(exemption))
}

/// Returns the reason of the first rule-level exemption covering `item`.
pub fn rule_exemption(rule: &TaxRule, item: &TaxableItem, input: &CalculationInput) -> Option<String> {
    let exemption = find_exemption(&rule.exemptions, &input.customer, item, input)?;
    debug!(rule_id = %rule.id, item_id = %item.id, reason = %exemption.reason, "Rule exemption applies");
    Some(describe(exemption))
}

/// Validity window plus category scope.
pub fn is_exemption_applicable(exemption: &TaxExemption, item: &TaxableItem, at: DateTime<Utc>) -> bool {
    exemption.is_valid_at(at) && exemption.covers_category(&item.category)
}

fn find_exemption<'e>(
    exemptions: &'e [TaxExemption],
    customer: &Customer,
    item: &TaxableItem,
    input: &CalculationInput,
) -> Option<&'e TaxExemption> {
    if exemptions.is_empty() {
        return None;
    }

    let synthetic = single_item_input(customer, item, input);
    let ctx = ConditionContext::for_item(&synthetic, &synthetic.items[0]);

    exemptions.iter().find(|exemption| {
        is_exemption_applicable(exemption, item, input.transaction_date)
            && is_relevant(exemption, item)
            && evaluate_conditions(&exemption.conditions, &ctx)
    })
}

fn is_relevant(exemption: &TaxExemption, item: &TaxableItem) -> bool {
    match exemption.exemption_type {
        ExemptionType::Customer | ExemptionType::Transaction => true,
        ExemptionType::Item => exemption.covers_category(&item.category),
        ExemptionType::Location => !exemption.conditions.is_empty(),
    }
}

fn describe(exemption: &TaxExemption) -> String {
    match &exemption.certificate {
        Some(certificate) => format!("{} (certificate {})", exemption.reason, certificate),
        None => exemption.reason.clone(),
    }
}

fn single_item_input(
    customer: &Customer,
    item: &TaxableItem,
    input: &CalculationInput,
) -> CalculationInput {
    CalculationInput {
        items: vec![item.clone()],
        customer: customer.clone(),
        billing_address: input.billing_address.clone(),
        shipping_address: input.shipping_address.clone(),
        transaction_date: input.transaction_date,
        transaction_type: input.transaction_type,
        currency: input.currency.clone(),
        shipping_amount: input.shipping_amount,
        discount_amount: input.discount_amount,
        rule_overrides: None,
        manual_overrides: Vec::new(),
        context: input.context.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use levy_core::{Address, ConditionOperator, ConditionType, Money, TaxCondition};

    fn at(y: i32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).unwrap()
    }

    fn input_with(customer: Customer, items: Vec<TaxableItem>) -> CalculationInput {
        CalculationInput::new(items, Address::new("US", "NY"), at(2024, 6), "USD").with_customer(customer)
    }

    #[test]
    fn test_food_exemption_covers_food_only() {
        let customer = Customer {
            id: "c1".into(),
            customer_type: "individual".into(),
            exemptions: vec![TaxExemption::new(ExemptionType::Customer, "SNAP").with_categories(&["food"])],
            ..Customer::default()
        };
        let bread = TaxableItem::new("bread", "food", Money::from_major(4), 1);
        let tv = TaxableItem::new("tv", "electronics", Money::from_major(400), 1);
        let input = input_with(customer.clone(), vec![bread.clone(), tv.clone()]);

        assert_eq!(is_customer_exempt(&customer, &bread, &input).as_deref(), Some("SNAP"));
        assert!(is_customer_exempt(&customer, &tv, &input).is_none());
    }

    #[test]
    fn test_expired_exemption_does_not_apply() {
        let exemption = TaxExemption::new(ExemptionType::Transaction, "holiday")
            .with_window(at(2024, 1), Some(at(2024, 3)));
        let item = TaxableItem::new("x", "toys", Money::from_major(10), 1);

        assert!(is_exemption_applicable(&exemption, &item, at(2024, 2)));
        assert!(!is_exemption_applicable(&exemption, &item, at(2024, 6)));

        let customer = Customer {
            exemptions: vec![exemption],
            ..Customer::default()
        };
        let input = input_with(customer.clone(), vec![item.clone()]);
        assert!(is_customer_exempt(&customer, &item, &input).is_none());
    }

    #[test]
    fn test_conditions_see_only_the_item() {
        let exemption = TaxExemption::new(ExemptionType::Customer, "small order")
            .with_certificate("CERT-9")
            .with_conditions(vec![TaxCondition::new(
                ConditionType::Amount,
                ConditionOperator::LessThan,
                100.0,
            )]);
        let customer = Customer {
            exemptions: vec![exemption],
            ..Customer::default()
        };
        let cheap = TaxableItem::new("cheap", "misc", Money::from_major(20), 1);
        let pricey = TaxableItem::new("pricey", "misc", Money::from_major(500), 1);
        let input = input_with(customer.clone(), vec![cheap.clone(), pricey.clone()]);

        assert_eq!(
            is_customer_exempt(&customer, &cheap, &input).as_deref(),
            Some("small order (certificate CERT-9)")
        );
        assert!(is_customer_exempt(&customer, &pricey, &input).is_none());
    }

    #[test]
    fn test_location_exemption_needs_conditions() {
        let item = TaxableItem::new("x", "misc", Money::from_major(10), 1);
        let bare = Customer {
            exemptions: vec![TaxExemption::new(ExemptionType::Location, "free zone")],
            ..Customer::default()
        };
        let input = input_with(bare.clone(), vec![item.clone()]);
        assert!(is_customer_exempt(&bare, &item, &input).is_none());

        let scoped = Customer {
            exemptions: vec![TaxExemption::new(ExemptionType::Location, "free zone").with_conditions(vec![
                TaxCondition::new(ConditionType::State, ConditionOperator::Equal, "NY"),
            ])],
            ..Customer::default()
        };
        assert!(is_customer_exempt(&scoped, &item, &input).is_some());
    }
}
