// Applicability resolution
//
// A rule applies only when it is active, in scope for the order's branch and
// every condition it sets holds. Conditions combine with AND.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{TestDataFactory, RESTAURANT_ID};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tablefare::taxes::models::{OrderLineItem, OrderType, TaxPhase, TaxRule};
use tablefare::taxes::services::Exclusion;
use tablefare::taxes::{ApplicabilityResolver, OrderAmountContext, TaxCalculator};

fn ids(rules: &[TaxRule]) -> Vec<&str> {
    rules.iter().map(|r| r.id.as_str()).collect()
}

fn dine_in(branch: Option<&str>, subtotal: Decimal) -> OrderAmountContext {
    TestDataFactory::order_at(
        branch,
        OrderType::DineIn,
        &[OrderLineItem::new("item-1", Some("mains"), subtotal)],
    )
}

#[test]
fn test_below_minimum_amount_excluded() {
    let mut luxury = TestDataFactory::percentage("luxury", dec!(5), TaxPhase::Subtotal);
    luxury.conditions.min_order_amount = Some(dec!(500));

    let order = TestDataFactory::order(dec!(400));
    let resolver = ApplicabilityResolver::new();

    assert!(resolver.resolve(&[luxury.clone()], &order).is_empty());
    assert_eq!(resolver.check(&luxury, &order), Some(Exclusion::BelowMinimum));

    let result = TaxCalculator::default()
        .compute(&resolver.resolve(&[luxury], &order), &order)
        .unwrap();
    assert_eq!(result.total_tax, dec!(0));
    assert_eq!(result.grand_total, dec!(400));
}

#[test]
fn test_amount_bounds_are_inclusive() {
    let mut banded = TestDataFactory::percentage("banded", dec!(5), TaxPhase::Subtotal);
    banded.conditions.min_order_amount = Some(dec!(500));
    banded.conditions.max_order_amount = Some(dec!(1000));
    let resolver = ApplicabilityResolver::new();

    assert_eq!(resolver.check(&banded, &TestDataFactory::order(dec!(500))), None);
    assert_eq!(resolver.check(&banded, &TestDataFactory::order(dec!(1000))), None);
    assert_eq!(
        resolver.check(&banded, &TestDataFactory::order(dec!(1000.01))),
        Some(Exclusion::AboveMaximum)
    );
}

#[test]
fn test_conditions_combine_with_and() {
    let mut rule = TestDataFactory::percentage("dine-in-large", dec!(5), TaxPhase::Subtotal);
    rule.conditions.min_order_amount = Some(dec!(500));
    rule.conditions.order_types = Some([OrderType::DineIn].into());
    let resolver = ApplicabilityResolver::new();

    let line = |amount| [OrderLineItem::new("item-1", None, amount)];

    let both = TestDataFactory::order_at(None, OrderType::DineIn, &line(dec!(600)));
    let wrong_type = TestDataFactory::order_at(None, OrderType::Takeaway, &line(dec!(600)));
    let too_small = TestDataFactory::order_at(None, OrderType::DineIn, &line(dec!(100)));

    assert_eq!(ids(&resolver.resolve(&[rule.clone()], &both)), vec!["dine-in-large"]);
    assert_eq!(resolver.check(&rule, &wrong_type), Some(Exclusion::OrderType));
    assert_eq!(resolver.check(&rule, &too_small), Some(Exclusion::BelowMinimum));
}

#[test]
fn test_branch_scope() {
    let rules = vec![
        TestDataFactory::percentage("state", dec!(5), TaxPhase::Subtotal),
        TestDataFactory::branch_rule("city-a", "branch-a", dec!(1)),
        TestDataFactory::branch_rule("city-b", "branch-b", dec!(2)),
    ];
    let resolver = ApplicabilityResolver::new();

    let at_a = resolver.resolve(&rules, &dine_in(Some("branch-a"), dec!(100)));
    assert_eq!(ids(&at_a), vec!["city-a", "state"]);

    let no_branch = resolver.resolve(&rules, &dine_in(None, dec!(100)));
    assert_eq!(ids(&no_branch), vec!["state"]);
}

#[test]
fn test_excluded_branch_switches_off_restaurant_rule() {
    let mut service = TestDataFactory::percentage("service", dec!(10), TaxPhase::Subtotal);
    service.conditions.excluded_branch_ids = Some(["airport".to_string()].into());
    let resolver = ApplicabilityResolver::new();

    assert_eq!(
        resolver.check(&service, &dine_in(Some("airport"), dec!(100))),
        Some(Exclusion::ExcludedBranch)
    );
    assert_eq!(resolver.check(&service, &dine_in(Some("downtown"), dec!(100))), None);
    assert_eq!(resolver.check(&service, &dine_in(None, dec!(100))), None);
}

#[test]
fn test_inactive_and_foreign_rules_never_apply() {
    let mut inactive = TestDataFactory::percentage("inactive", dec!(5), TaxPhase::Subtotal);
    inactive.is_active = false;
    let mut foreign = TestDataFactory::percentage("foreign", dec!(5), TaxPhase::Subtotal);
    foreign.restaurant_id = format!("{}-other", RESTAURANT_ID);

    let resolver = ApplicabilityResolver::new();
    let order = TestDataFactory::order(dec!(100));

    assert_eq!(resolver.check(&inactive, &order), Some(Exclusion::Inactive));
    assert_eq!(resolver.check(&foreign, &order), Some(Exclusion::OtherRestaurant));
    assert!(resolver.resolve(&[inactive, foreign], &order).is_empty());
}

#[test]
fn test_item_selector_requires_a_qualifying_item() {
    let mut liquor = TestDataFactory::percentage("liquor", dec!(10), TaxPhase::ItemTotal);
    liquor.conditions.specific_category_ids = Some(["bar".to_string()].into());
    let resolver = ApplicabilityResolver::new();

    let food_only = TestDataFactory::order(dec!(100));
    assert_eq!(resolver.check(&liquor, &food_only), Some(Exclusion::NoQualifyingItems));

    let with_drink = TestDataFactory::order_at(
        None,
        OrderType::DineIn,
        &[
            OrderLineItem::new("thali", Some("mains"), dec!(100)),
            OrderLineItem::new("beer", Some("bar"), dec!(50)),
        ],
    );
    assert_eq!(resolver.check(&liquor, &with_drink), None);
}

#[test]
fn test_resolved_rules_are_in_evaluation_order() {
    let rules = vec![
        TestDataFactory::percentage("c-cess", dec!(1), TaxPhase::AfterOtherTaxes),
        TestDataFactory::percentage("b-items", dec!(1), TaxPhase::ItemTotal),
        TestDataFactory::percentage("a-base", dec!(1), TaxPhase::Subtotal),
    ];

    let resolved = ApplicabilityResolver::new().resolve(&rules, &TestDataFactory::order(dec!(10)));
    assert_eq!(ids(&resolved), vec!["a-base", "b-items", "c-cess"]);
}

proptest! {
    #[test]
    fn test_other_branch_rule_never_resolved(
        rule_branch in "[a-z]{1,8}",
        order_branch in proptest::option::of("[a-z]{1,8}"),
    ) {
        prop_assume!(order_branch.as_deref() != Some(rule_branch.as_str()));

        let rule = TestDataFactory::branch_rule("city", &rule_branch, dec!(1));
        let order = dine_in(order_branch.as_deref(), dec!(100));

        prop_assert!(ApplicabilityResolver::new().resolve(&[rule], &order).is_empty());
    }
}
