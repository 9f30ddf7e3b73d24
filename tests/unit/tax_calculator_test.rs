// Cascading tax calculator
//
// Covers the worked scenarios and the algebraic properties of one pass:
// - grand_total == subtotal + sum(line amounts), exactly
// - identical inputs give identical results
// - evaluation order does not depend on the order rules are passed in
// - every contribution is rounded to the currency's minor unit

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::TestDataFactory;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tablefare::core::Currency;
use tablefare::taxes::models::{OrderLineItem, OrderType, TaxKind, TaxPhase, TaxRule};
use tablefare::taxes::TaxCalculator;

#[test]
fn test_single_percentage_on_subtotal() {
    let calculator = TaxCalculator::new(Currency::INR);
    let rules = vec![TestDataFactory::percentage("gst", dec!(18), TaxPhase::Subtotal)];

    let result = calculator
        .compute(&rules, &TestDataFactory::order(dec!(1000)))
        .unwrap();

    assert_eq!(result.lines.len(), 1);
    assert_eq!(result.lines[0].amount, dec!(180.00));
    assert_eq!(result.total_tax, dec!(180.00));
    assert_eq!(result.grand_total, dec!(1180.00));
}

#[test]
fn test_after_other_taxes_includes_earlier_contributions() {
    let calculator = TaxCalculator::new(Currency::INR);
    let rules = vec![
        TestDataFactory::percentage("a", dec!(9), TaxPhase::Subtotal),
        TestDataFactory::percentage("b", dec!(9), TaxPhase::AfterOtherTaxes),
    ];

    let result = calculator
        .compute(&rules, &TestDataFactory::order(dec!(1000)))
        .unwrap();

    assert_eq!(result.lines[0].amount, dec!(90.00));
    assert_eq!(result.lines[1].base_amount, dec!(1090.00));
    assert_eq!(result.lines[1].amount, dec!(98.10));
    assert_eq!(result.total_tax, dec!(188.10));
    assert_eq!(result.grand_total, dec!(1188.10));
}

#[test]
fn test_phases_evaluated_in_fixed_order() {
    let calculator = TaxCalculator::new(Currency::INR);
    let rules = vec![
        TestDataFactory::percentage("late", dec!(10), TaxPhase::AfterOtherTaxes),
        TestDataFactory::fixed("items", dec!(10), TaxPhase::ItemTotal),
        TestDataFactory::percentage("early", dec!(10), TaxPhase::Subtotal),
    ];

    let result = calculator
        .compute(&rules, &TestDataFactory::order(dec!(100)))
        .unwrap();
    let ids: Vec<&str> = result.lines.iter().map(|l| l.rule_id.as_str()).collect();

    assert_eq!(ids, vec!["early", "items", "late"]);
    // 10 + 10 on 100, then 10% of 120
    assert_eq!(result.lines[2].amount, dec!(12.00));
    assert_eq!(result.grand_total, dec!(132.00));
}

#[test]
fn test_display_order_breaks_ties_within_phase() {
    let calculator = TaxCalculator::new(Currency::INR);
    let mut second = TestDataFactory::percentage("a-second", dec!(1), TaxPhase::Subtotal);
    second.display_order = 2;
    let mut first = TestDataFactory::percentage("z-first", dec!(1), TaxPhase::Subtotal);
    first.display_order = 1;

    let result = calculator
        .compute(&[second, first], &TestDataFactory::order(dec!(100)))
        .unwrap();

    assert_eq!(result.lines[0].rule_id, "z-first");
    assert_eq!(result.lines[1].rule_id, "a-second");
}

#[test]
fn test_fixed_item_total_applies_once_per_order() {
    let calculator = TaxCalculator::new(Currency::INR);
    let mut corkage = TestDataFactory::fixed("corkage", dec!(50), TaxPhase::ItemTotal);
    corkage.conditions.specific_category_ids = Some(["wine".to_string()].into());

    let order = TestDataFactory::order_at(
        None,
        OrderType::DineIn,
        &[
            OrderLineItem::new("red", Some("wine"), dec!(900)),
            OrderLineItem::new("white", Some("wine"), dec!(700)),
        ],
    );
    let result = calculator.compute(&[corkage], &order).unwrap();

    assert_eq!(result.total_tax, dec!(50));
}

#[test]
fn test_item_total_percentage_sums_qualifying_lines() {
    let calculator = TaxCalculator::new(Currency::INR);
    let mut liquor = TestDataFactory::percentage("liquor", dec!(20), TaxPhase::ItemTotal);
    liquor.conditions.specific_item_ids = Some(["beer".to_string()].into());
    liquor.conditions.specific_category_ids = Some(["wine".to_string()].into());

    let order = TestDataFactory::order_at(
        None,
        OrderType::DineIn,
        &[
            OrderLineItem::new("beer", Some("bar"), dec!(200)),
            OrderLineItem::new("red", Some("wine"), dec!(300)),
            OrderLineItem::new("thali", Some("mains"), dec!(500)),
        ],
    );
    let result = calculator.compute(&[liquor], &order).unwrap();

    assert_eq!(result.lines[0].base_amount, dec!(500));
    assert_eq!(result.lines[0].amount, dec!(100.00));
    assert_eq!(result.grand_total, dec!(1100.00));
}

#[test]
fn test_same_name_rules_ordered_by_id() {
    let calculator = TaxCalculator::new(Currency::INR);
    let mut percent = TestDataFactory::percentage("cess-a", dec!(10), TaxPhase::AfterOtherTaxes);
    percent.name = "Cess".to_string();
    let mut flat = TestDataFactory::fixed("cess-b", dec!(50), TaxPhase::AfterOtherTaxes);
    flat.name = "Cess".to_string();
    let order = TestDataFactory::order(dec!(1000));

    let forward = calculator
        .compute(&[percent.clone(), flat.clone()], &order)
        .unwrap();
    let backward = calculator.compute(&[flat, percent], &order).unwrap();

    assert_eq!(forward, backward);
    // 10% of 1000 first, then the flat 50
    assert_eq!(forward.lines[0].rule_id, "cess-a");
    assert_eq!(forward.total_tax, dec!(150.00));
}

#[test]
fn test_zero_rate_produces_zero_line() {
    let calculator = TaxCalculator::new(Currency::INR);
    let rules = vec![TestDataFactory::percentage("exempt", dec!(0), TaxPhase::Subtotal)];

    let result = calculator
        .compute(&rules, &TestDataFactory::order(dec!(250)))
        .unwrap();

    assert_eq!(result.lines.len(), 1);
    assert_eq!(result.lines[0].amount, Decimal::ZERO);
    assert_eq!(result.grand_total, dec!(250));
}

#[test]
fn test_rounding_follows_currency_scale() {
    // 7.5% of 99.99 = 7.49925
    let rules = vec![TestDataFactory::percentage("vat", dec!(7.5), TaxPhase::Subtotal)];
    let order = TestDataFactory::order(dec!(99.99));

    let inr = TaxCalculator::new(Currency::INR).compute(&rules, &order).unwrap();
    assert_eq!(inr.lines[0].amount, dec!(7.50));

    let idr = TaxCalculator::new(Currency::IDR).compute(&rules, &order).unwrap();
    assert_eq!(idr.lines[0].amount, dec!(7));
}

fn rule_set() -> impl Strategy<Value = Vec<TaxRule>> {
    let spec = (any::<bool>(), 0i64..=10_000, 0usize..3, 0i32..4, 0u8..3);
    prop::collection::vec(spec, 0..8).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (percentage, value, phase, display_order, name))| {
                let phase =
                    [TaxPhase::Subtotal, TaxPhase::ItemTotal, TaxPhase::AfterOtherTaxes][phase];
                let kind = if percentage {
                    TaxKind::Percentage
                } else {
                    TaxKind::Fixed
                };
                // 0.00 .. 100.00
                let value = Decimal::new(value, 2);
                let mut rule = TestDataFactory::rule(&format!("tax-{i}"), kind, value, phase);
                rule.display_order = display_order;
                // Few distinct names so ties on (phase, display order, name) are common
                rule.name = format!("Levy {name}");
                rule
            })
            .collect()
    })
}

fn subtotal() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #[test]
    fn test_grand_total_identity(rules in rule_set(), subtotal in subtotal()) {
        let result = TaxCalculator::default()
            .compute(&rules, &TestDataFactory::order(subtotal))
            .unwrap();

        let line_sum: Decimal = result.lines.iter().map(|l| l.amount).sum();
        prop_assert_eq!(result.total_tax, line_sum);
        prop_assert_eq!(result.grand_total, subtotal + line_sum);
        prop_assert_eq!(result.lines.len(), rules.len());
    }

    #[test]
    fn test_computation_is_deterministic(rules in rule_set(), subtotal in subtotal()) {
        let calculator = TaxCalculator::default();
        let order = TestDataFactory::order(subtotal);

        prop_assert_eq!(
            calculator.compute(&rules, &order).unwrap(),
            calculator.compute(&rules, &order).unwrap()
        );
    }

    #[test]
    fn test_input_order_is_irrelevant(
        (rules, shuffled) in rule_set().prop_flat_map(|rules| {
            (Just(rules.clone()), Just(rules).prop_shuffle())
        }),
        subtotal in subtotal(),
    ) {
        let calculator = TaxCalculator::default();
        let order = TestDataFactory::order(subtotal);

        prop_assert_eq!(
            calculator.compute(&rules, &order).unwrap(),
            calculator.compute(&shuffled, &order).unwrap()
        );
    }

    #[test]
    fn test_contributions_rounded_and_non_negative(rules in rule_set(), subtotal in subtotal()) {
        let result = TaxCalculator::new(Currency::INR)
            .compute(&rules, &TestDataFactory::order(subtotal))
            .unwrap();

        for line in &result.lines {
            prop_assert!(line.amount >= Decimal::ZERO);
            prop_assert_eq!(line.amount, line.amount.round_dp(2));
        }
    }
}
