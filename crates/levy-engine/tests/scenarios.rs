//! # End-to-End Tax Scenarios
//!
//! Drives the public API the way checkout code does: build a registry,
//! describe a transaction, read the result.

use chrono::{DateTime, TimeZone, Utc};
use levy_core::{
    Address, CalculationInput, CalculationMethod, Customer, ExemptionType, Jurisdiction, Money,
    TaxExemption, TaxRule, TaxThreshold, TaxType, TaxableItem, TransactionType,
};
use levy_engine::{
    ConflictKind, EngineError, RegistryDocument, TaxCalculator, TaxConfig, TaxRuleRegistry,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn ny_sales() -> TaxRule {
    TaxRule::new(
        "ny-sales",
        "New York Sales Tax",
        TaxType::Sales,
        Jurisdiction::State,
        CalculationMethod::Percentage,
        dec!(8.25),
    )
    .with_countries(&["US"])
    .with_states(&["NY"])
}

fn sale(items: Vec<TaxableItem>) -> CalculationInput {
    CalculationInput::new(items, Address::new("US", "NY"), date(), "USD")
}

#[test]
fn ny_sale_of_one_hundred_dollars() {
    init_tracing();
    let mut registry = TaxRuleRegistry::new();
    registry.add_rule(ny_sales()).unwrap();

    let laptop = TaxableItem::new("laptop", "electronics", Money::from_major(100), 1);
    let result = TaxCalculator::new(&registry).calculate_tax(&sale(vec![laptop]));

    assert!(result.is_valid);
    assert_eq!(result.subtotal, Money::from_major(100));
    assert_eq!(result.total_tax, Money::new(dec!(8.25)));
    assert_eq!(result.grand_total, Money::new(dec!(108.25)));
    assert_eq!(result.effective_rate, dec!(8.25));
    assert_eq!(result.applied_taxes.len(), 1);
    assert_eq!(result.applied_taxes[0].rule_id, "ny-sales");
}

#[test]
fn ny_rule_does_not_reach_california() {
    init_tracing();
    let mut registry = TaxRuleRegistry::new();
    registry.add_rule(ny_sales()).unwrap();

    let mut input = sale(vec![TaxableItem::new("laptop", "electronics", Money::from_major(100), 1)]);
    input.billing_address = Address::new("US", "CA");
    input.shipping_address = Address::new("US", "CA");

    let result = TaxCalculator::new(&registry).calculate_tax(&input);
    assert!(result.total_tax.is_zero());
    assert_eq!(result.grand_total, Money::from_major(100));
}

#[test]
fn food_exemption_zeroes_only_food() {
    init_tracing();
    let mut registry = TaxRuleRegistry::new();
    registry.add_rule(ny_sales()).unwrap();

    let customer = Customer {
        id: "cust-1".into(),
        customer_type: "individual".into(),
        exemptions: vec![TaxExemption::new(ExemptionType::Customer, "food stamp program")
            .with_categories(&["food"])],
        ..Customer::default()
    };
    let groceries = TaxableItem::new("apples", "food", Money::from_major(20), 2);
    let headphones = TaxableItem::new("headphones", "electronics", Money::from_major(100), 1);
    let input = sale(vec![groceries, headphones]).with_customer(customer);

    let result = TaxCalculator::new(&registry).calculate_tax(&input);
    let food = &result.tax_breakdown[0];
    assert!(food.total_tax.is_zero());
    assert_eq!(food.exempt_amount, Money::from_major(40));
    assert_eq!(food.exemption_reason.as_deref(), Some("food stamp program"));

    assert_eq!(result.tax_breakdown[1].total_tax, Money::new(dec!(8.25)));
    assert_eq!(result.exempt_amount, Money::from_major(40));
    assert_eq!(result.grand_total, Money::new(dec!(148.25)));
}

#[test]
fn compound_rule_taxes_prior_tax() {
    init_tracing();
    let mut registry = TaxRuleRegistry::with_config(TaxConfig {
        compound_taxes: true,
        ..TaxConfig::default()
    });
    registry
        .add_rule(
            TaxRule::new("a", "Provincial", TaxType::Sales, Jurisdiction::State, CalculationMethod::Percentage, dec!(5))
                .with_priority(10),
        )
        .unwrap();
    registry
        .add_rule(
            TaxRule::new("b", "Federal", TaxType::Gst, Jurisdiction::Federal, CalculationMethod::Compound, dec!(10))
                .with_priority(5),
        )
        .unwrap();

    let item = TaxableItem::new("widget", "general", Money::from_major(100), 1);
    let result = TaxCalculator::new(&registry).calculate_tax(&sale(vec![item]));

    let taxes = &result.tax_breakdown[0].applied_taxes;
    assert_eq!(taxes[0].rule_id, "a");
    assert_eq!(taxes[0].tax_amount, Money::from_major(5));
    assert_eq!(taxes[1].rule_id, "b");
    assert_eq!(taxes[1].taxable_amount, Money::from_major(105));
    assert_eq!(taxes[1].tax_amount, Money::new(dec!(10.5)));
    assert_eq!(result.total_tax, Money::new(dec!(15.5)));
}

#[test]
fn progressive_rule_is_monotonic_end_to_end() {
    init_tracing();
    let mut registry = TaxRuleRegistry::new();
    registry
        .add_rule(
            TaxRule::new("lux", "Luxury Levy", TaxType::Luxury, Jurisdiction::Federal, CalculationMethod::Progressive, Decimal::ZERO)
                .with_thresholds(vec![
                    TaxThreshold::rate(Money::zero(), Money::from_major(1000), dec!(0)),
                    TaxThreshold::rate(Money::from_major(1000), Money::from_major(5000), dec!(10)),
                    TaxThreshold::rate(Money::from_major(5000), Money::zero(), dec!(20)),
                ]),
        )
        .unwrap();
    let calculator = TaxCalculator::new(&registry);

    let mut previous = Money::zero();
    for price in [500, 1000, 1500, 4999, 5000, 8000, 20000] {
        let watch = TaxableItem::new("watch", "jewelry", Money::from_major(price), 1).luxury();
        let tax = calculator.calculate_tax(&sale(vec![watch])).total_tax;
        assert!(tax >= previous, "tax fell at {price}");
        previous = tax;
    }
    // 20000: 4000 × 10% + 15000 × 20%
    assert_eq!(previous, Money::from_major(3400));

    let plain = TaxableItem::new("watch", "jewelry", Money::from_major(8000), 1);
    assert!(calculator.calculate_tax(&sale(vec![plain])).total_tax.is_zero());
}

#[test]
fn registry_round_trip_and_duplicate_rejection() {
    init_tracing();
    let mut registry = TaxRuleRegistry::new();
    registry.add_rule(ny_sales()).unwrap();
    assert_eq!(registry.get_rule("ny-sales").unwrap(), &ny_sales());

    let mut duplicate = ny_sales();
    duplicate.rate = dec!(4);
    match registry.add_rule(duplicate) {
        Err(EngineError::Conflict { conflicts, .. }) => {
            assert_eq!(conflicts[0].kind, ConflictKind::DuplicateId)
        }
        other => panic!("expected duplicate conflict, got {other:?}"),
    }
    assert_eq!(registry.len(), 1);

    registry.remove_rule("ny-sales").unwrap();
    assert!(matches!(
        registry.get_rule("ny-sales"),
        Err(EngineError::RuleNotFound(_))
    ));
}

#[test]
fn customs_only_on_imports() {
    init_tracing();
    let mut registry = TaxRuleRegistry::new();
    registry
        .add_rule(
            TaxRule::new("duty", "Import Duty", TaxType::Customs, Jurisdiction::Federal, CalculationMethod::Percentage, dec!(2.5))
                .with_countries(&["US"]),
        )
        .unwrap();
    let calculator = TaxCalculator::new(&registry);
    let crate_of_tea = || TaxableItem::new("tea", "food", Money::from_major(200), 1);

    assert!(calculator.calculate_tax(&sale(vec![crate_of_tea()])).total_tax.is_zero());

    let import = sale(vec![crate_of_tea()]).with_transaction_type(TransactionType::Import);
    assert_eq!(calculator.calculate_tax(&import).total_tax, Money::from_major(5));
}

#[test]
fn exported_registry_calculates_identically() {
    init_tracing();
    let mut registry = TaxRuleRegistry::new();
    registry.add_rule(ny_sales()).unwrap();
    registry
        .add_rule(
            TaxRule::new("nyc", "NYC Sales", TaxType::Sales, Jurisdiction::City, CalculationMethod::Percentage, dec!(4.5))
                .with_countries(&["US"])
                .with_cities(&["New York"]),
        )
        .unwrap();

    let json = registry.export_rules().to_json().unwrap();
    let mut restored = TaxRuleRegistry::new();
    restored.import_rules(RegistryDocument::from_json(&json).unwrap()).unwrap();

    let mut input = sale(vec![TaxableItem::new("coat", "apparel", Money::from_major(250), 1)]);
    input.shipping_address = Address::new("US", "NY").with_city("New York");

    let original = TaxCalculator::new(&registry).calculate_tax(&input);
    let copy = TaxCalculator::new(&restored).calculate_tax(&input);
    assert_eq!(original.total_tax, copy.total_tax);
    assert_eq!(original.applied_taxes, copy.applied_taxes);
    assert_eq!(original.total_tax, Money::new(dec!(31.88)));
}
