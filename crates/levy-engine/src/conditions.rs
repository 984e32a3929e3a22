//! # Condition Evaluator
//!
//! Evaluates rule and exemption conditions against a calculation input.
//!
//! ## Grammar
//! ```text
//! conditions := c₁ (logic₂ c₂) (logic₃ c₃) …     folded left to right
//!
//!   [a, b OR, c AND]   →   ((a ∨ b) ∧ c)
//!
//! There is no precedence and no grouping. The first condition's logic is
//! never read. An empty list holds.
//! ```
//!
//! ## Failure Policy
//! Evaluation is fail-closed: a left value that cannot be resolved (including
//! an `amount` or `quantity` total that overflows), or an
//! operand that cannot be coerced for an ordering operator, makes that one
//! condition false. Nothing here returns an error to the caller.

use levy_core::{
    CalculationInput, ConditionLogic, ConditionOperator, ConditionType, ConditionValue,
    CoreError, CoreResult, Money, TaxCondition, TaxableItem,
};
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

/// What a condition is evaluated against.
///
/// `item` is the focus item for `category` conditions; without one the
/// first item of the input is used.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    pub input: &'a CalculationInput,
    pub item: Option<&'a TaxableItem>,
}

impl<'a> ConditionContext<'a> {
    pub fn new(input: &'a CalculationInput) -> Self {
        ConditionContext { input, item: None }
    }

    pub fn for_item(input: &'a CalculationInput, item: &'a TaxableItem) -> Self {
        ConditionContext {
            input,
            item: Some(item),
        }
    }
}

/// Left-to-right AND/OR fold. Empty holds.
pub fn evaluate_conditions(conditions: &[TaxCondition], ctx: &ConditionContext<'_>) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return true;
    };

    iter.fold(evaluate_condition(first, ctx), |acc, condition| {
        let value = evaluate_condition(condition, ctx);
        match condition.logic {
            ConditionLogic::And => acc && value,
            ConditionLogic::Or => acc || value,
        }
    })
}

/// Evaluates a single condition. Unresolvable or uncomparable ⇒ false.
pub fn evaluate_condition(condition: &TaxCondition, ctx: &ConditionContext<'_>) -> bool {
    let Some(left) = resolve_left_value(condition, ctx) else {
        return false;
    };

    match compare_values(&left, condition.operator, &condition.value) {
        Ok(holds) => holds,
        Err(err) => {
            warn!(
                condition_type = ?condition.condition_type,
                operator = %condition.operator,
                error = %err,
                "Condition could not be evaluated, treating as false"
            );
            false
        }
    }
}

fn resolve_left_value(condition: &TaxCondition, ctx: &ConditionContext<'_>) -> Option<ConditionValue> {
    let input = ctx.input;
    match condition.condition_type {
        ConditionType::Amount => input
            .items
            .iter()
            .try_fold(Money::zero(), |total, item| {
                item.checked_total_amount()
                    .and_then(|line| total.checked_add(line))
            })
            .and_then(|total| total.amount().to_f64())
            .map(ConditionValue::Number),
        ConditionType::Quantity => input
            .items
            .iter()
            .try_fold(0i64, |total, item| total.checked_add(item.quantity))
            .map(|total| ConditionValue::Number(total as f64)),
        ConditionType::Category => ctx
            .item
            .or_else(|| input.items.first())
            .map(|item| ConditionValue::Text(item.category.clone())),
        ConditionType::CustomerType => {
            Some(ConditionValue::Text(input.customer.customer_type.clone()))
        }
        ConditionType::Country => Some(ConditionValue::Text(
            destination(&input.shipping_address.country, &input.billing_address.country).to_string(),
        )),
        ConditionType::State => Some(ConditionValue::Text(
            destination(&input.shipping_address.state, &input.billing_address.state).to_string(),
        )),
        ConditionType::TransactionType => {
            Some(ConditionValue::Text(input.transaction_type.as_str().to_string()))
        }
        ConditionType::Context => condition
            .field
            .as_ref()
            .and_then(|key| input.context.get(key))
            .cloned(),
        ConditionType::Unknown => None,
    }
}

fn destination<'s>(shipping: &'s str, billing: &'s str) -> &'s str {
    if shipping.trim().is_empty() {
        billing
    } else {
        shipping
    }
}

/// Compares a resolved left value with a condition operand.
///
/// - ordering operators need both sides numeric, else a coercion error
/// - `=`/`!=` compare numerically when both sides are numeric, otherwise
///   as case-insensitive text
/// - `in`/`not_in` test membership in the operand's members
pub fn compare_values(
    left: &ConditionValue,
    operator: ConditionOperator,
    right: &ConditionValue,
) -> CoreResult<bool> {
    match operator {
        ConditionOperator::GreaterThan
        | ConditionOperator::LessThan
        | ConditionOperator::GreaterOrEqual
        | ConditionOperator::LessOrEqual => {
            let (a, b) = (left.to_f64()?, right.to_f64()?);
            Ok(match operator {
                ConditionOperator::GreaterThan => a > b,
                ConditionOperator::LessThan => a < b,
                ConditionOperator::GreaterOrEqual => a >= b,
                _ => a <= b,
            })
        }
        ConditionOperator::Equal => Ok(values_equal(left, right)),
        ConditionOperator::NotEqual => Ok(!values_equal(left, right)),
        ConditionOperator::In => is_member(left, right),
        ConditionOperator::NotIn => is_member(left, right).map(|found| !found),
    }
}

fn values_equal(left: &ConditionValue, right: &ConditionValue) -> bool {
    match (left.to_f64(), right.to_f64()) {
        (Ok(a), Ok(b)) => a == b,
        _ => left.as_text().trim().eq_ignore_ascii_case(right.as_text().trim()),
    }
}

fn is_member(left: &ConditionValue, right: &ConditionValue) -> CoreResult<bool> {
    if let ConditionValue::List(_) = left {
        return Err(CoreError::Coercion {
            value: left.as_text(),
            target: "scalar",
        });
    }

    let needle = ConditionValue::Text(left.as_text());
    Ok(right
        .members()
        .into_iter()
        .any(|member| values_equal(&needle, &ConditionValue::Text(member))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use levy_core::{Address, TransactionType};
    use std::collections::BTreeMap;

    fn input() -> CalculationInput {
        let items = vec![
            TaxableItem::new("a", "food", Money::from_major(300), 2),
            TaxableItem::new("b", "electronics", Money::from_major(50), 1),
        ];
        let mut input = CalculationInput::new(items, Address::new("US", "NY"), Utc::now(), "USD");
        input.customer.customer_type = "business".into();
        input.billing_address = Address::new("US", "NJ");
        input.context = BTreeMap::from([
            ("channel".to_string(), ConditionValue::from("web")),
            ("loyalty_years".to_string(), ConditionValue::Number(4.0)),
        ]);
        input
    }

    fn cond(t: ConditionType, op: ConditionOperator, v: impl Into<ConditionValue>) -> TaxCondition {
        TaxCondition::new(t, op, v)
    }

    #[test]
    fn test_empty_conditions_hold() {
        let input = input();
        assert!(evaluate_conditions(&[], &ConditionContext::new(&input)));
    }

    #[test]
    fn test_amount_and_quantity() {
        let input = input();
        let ctx = ConditionContext::new(&input);
        // 300 × 2 + 50 = 650, quantity 3
        assert!(evaluate_condition(&cond(ConditionType::Amount, ConditionOperator::GreaterOrEqual, 650.0), &ctx));
        assert!(!evaluate_condition(&cond(ConditionType::Amount, ConditionOperator::GreaterThan, 650.0), &ctx));
        assert!(evaluate_condition(&cond(ConditionType::Quantity, ConditionOperator::Equal, "3"), &ctx));
    }

    #[test]
    fn test_overflowing_totals_never_hold() {
        let mut input = input();
        input.items.push(TaxableItem::new(
            "huge",
            "bulk",
            Money::new(rust_decimal::Decimal::from(10u64.pow(19))),
            10_000_000_000,
        ));
        let ctx = ConditionContext::new(&input);
        assert!(!evaluate_condition(&cond(ConditionType::Amount, ConditionOperator::GreaterThan, 0.0), &ctx));

        input.items[2] = TaxableItem::new("many", "bulk", Money::from_major(1), i64::MAX);
        let ctx = ConditionContext::new(&input);
        assert!(!evaluate_condition(&cond(ConditionType::Quantity, ConditionOperator::GreaterThan, 0.0), &ctx));
    }

    #[test]
    fn test_category_uses_focus_item() {
        let input = input();
        let electronics = cond(ConditionType::Category, ConditionOperator::Equal, "Electronics");

        assert!(!evaluate_condition(&electronics, &ConditionContext::new(&input)));
        assert!(evaluate_condition(
            &electronics,
            &ConditionContext::for_item(&input, &input.items[1])
        ));
    }

    #[test]
    fn test_destination_prefers_shipping() {
        let mut input = input();
        let ny = cond(ConditionType::State, ConditionOperator::Equal, "NY");
        assert!(evaluate_condition(&ny, &ConditionContext::new(&input)));

        input.shipping_address = Address::default();
        assert!(!evaluate_condition(&ny, &ConditionContext::new(&input)));
        let nj = cond(ConditionType::State, ConditionOperator::Equal, "NJ");
        assert!(evaluate_condition(&nj, &ConditionContext::new(&input)));
    }

    #[test]
    fn test_membership() {
        let input = input();
        let ctx = ConditionContext::new(&input);
        let kinds = vec!["nonprofit".to_string(), "business".to_string()];

        assert!(evaluate_condition(
            &cond(ConditionType::CustomerType, ConditionOperator::In, kinds.clone()),
            &ctx
        ));
        assert!(!evaluate_condition(
            &cond(ConditionType::CustomerType, ConditionOperator::NotIn, kinds),
            &ctx
        ));
        assert!(evaluate_condition(
            &cond(ConditionType::TransactionType, ConditionOperator::In, "sale, refund"),
            &ctx
        ));
    }

    #[test]
    fn test_context_conditions() {
        let input = input();
        let ctx = ConditionContext::new(&input);
        assert!(evaluate_condition(
            &TaxCondition::context("channel", ConditionOperator::Equal, "web"),
            &ctx
        ));
        assert!(evaluate_condition(
            &TaxCondition::context("loyalty_years", ConditionOperator::GreaterThan, 3.0),
            &ctx
        ));
        // Missing key never holds, not even for !=
        assert!(!evaluate_condition(
            &TaxCondition::context("missing", ConditionOperator::NotEqual, "x"),
            &ctx
        ));
    }

    #[test]
    fn test_coercion_failure_is_fail_closed() {
        let input = input();
        let ctx = ConditionContext::new(&input);
        let bogus = cond(ConditionType::CustomerType, ConditionOperator::GreaterThan, 5.0);
        assert!(!evaluate_condition(&bogus, &ctx));

        let unknown = cond(ConditionType::Unknown, ConditionOperator::NotEqual, "x");
        assert!(!evaluate_condition(&unknown, &ctx));
    }

    #[test]
    fn test_and_or_fold_is_flat() {
        let mut input = input();
        input.transaction_type = TransactionType::Refund;
        let ctx = ConditionContext::new(&input);

        let t = cond(ConditionType::Quantity, ConditionOperator::Equal, 3.0);
        let f = cond(ConditionType::Quantity, ConditionOperator::Equal, 99.0);

        // (f ∨ t) ∧ t
        assert!(evaluate_conditions(&[f.clone(), t.clone().or(), t.clone()], &ctx));
        // (t ∧ f) ∨ t
        assert!(evaluate_conditions(&[t.clone(), f.clone(), t.clone().or()], &ctx));
        // (t ∨ f) ∧ f
        assert!(!evaluate_conditions(&[t.clone(), f.clone().or(), f.clone()], &ctx));
        // first condition's OR is ignored
        assert!(!evaluate_conditions(&[t.or(), f], &ctx));
    }

    #[test]
    fn test_compare_values_direct() {
        let ten = ConditionValue::Number(10.0);
        assert!(compare_values(&ten, ConditionOperator::Equal, &ConditionValue::from("10.0")).unwrap());
        assert!(compare_values(&ConditionValue::from("abc"), ConditionOperator::LessThan, &ten).is_err());
        assert!(compare_values(&ConditionValue::from("US"), ConditionOperator::NotEqual, &ConditionValue::from("CA")).unwrap());
    }
}
