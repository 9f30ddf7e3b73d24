// Display grouping
//
// Rules sharing a group name collapse into one display line. Grouping only
// changes presentation: the sum of displayed amounts always equals the sum of
// the underlying lines.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::TestDataFactory;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tablefare::taxes::models::{TaxPhase, TaxRule};
use tablefare::taxes::{DisplayGrouper, TaxCalculator};

#[test]
fn test_gst_components_shown_as_one_line() {
    let rules = vec![
        TestDataFactory::grouped("cgst", "GST", dec!(2.5), 1),
        TestDataFactory::grouped("sgst", "GST", dec!(2.5), 2),
    ];
    let result = TaxCalculator::default()
        .compute(&rules, &TestDataFactory::order(dec!(1800)))
        .unwrap();
    assert_eq!(result.lines[0].amount, dec!(45.00));
    assert_eq!(result.lines[1].amount, dec!(45.00));

    let grouped = DisplayGrouper::new().group(&result);

    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].label, "GST");
    assert_eq!(grouped[0].amount, dec!(90.00));
    assert_eq!(grouped[0].member_rule_ids, vec!["cgst", "sgst"]);
    // underlying lines are untouched
    assert_eq!(result.lines.len(), 2);
}

#[test]
fn test_ungrouped_rules_use_their_name() {
    let mut service = TestDataFactory::percentage("svc", dec!(10), TaxPhase::Subtotal);
    service.name = "Service Charge".to_string();
    service.display_order = 0;
    let rules = vec![
        service,
        TestDataFactory::grouped("cgst", "GST", dec!(2.5), 1),
        TestDataFactory::grouped("sgst", "GST", dec!(2.5), 2),
    ];

    let result = TaxCalculator::default()
        .compute(&rules, &TestDataFactory::order(dec!(100)))
        .unwrap();
    let grouped = DisplayGrouper::new().group(&result);
    let labels: Vec<&str> = grouped.iter().map(|g| g.label.as_str()).collect();

    assert_eq!(labels, vec!["Service Charge", "GST"]);
    assert_eq!(grouped[0].amount, dec!(10.00));
    assert_eq!(grouped[1].amount, dec!(5.00));
}

#[test]
fn test_distinct_groups_stay_apart() {
    let rules = vec![
        TestDataFactory::grouped("cgst", "GST", dec!(2.5), 1),
        TestDataFactory::grouped("vat-a", "VAT", dec!(1), 2),
        TestDataFactory::grouped("sgst", "GST", dec!(2.5), 3),
        TestDataFactory::grouped("vat-b", "VAT", dec!(1), 4),
    ];

    let result = TaxCalculator::default()
        .compute(&rules, &TestDataFactory::order(dec!(200)))
        .unwrap();
    let grouped = DisplayGrouper::new().group(&result);

    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].label, "GST");
    assert_eq!(grouped[0].amount, dec!(10.00));
    assert_eq!(grouped[1].label, "VAT");
    assert_eq!(grouped[1].amount, dec!(4.00));
}

fn grouped_rules() -> impl Strategy<Value = Vec<TaxRule>> {
    prop::collection::vec((0i64..=2_000, proptest::option::of(0usize..3)), 0..10).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (value, group))| {
                let mut rule = TestDataFactory::percentage(
                    &format!("tax-{i}"),
                    Decimal::new(value, 2),
                    TaxPhase::Subtotal,
                );
                rule.group_name = group.map(|g| ["GST", "VAT", "CESS"][g].to_string());
                rule
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn test_grouping_conserves_total(rules in grouped_rules(), cents in 0i64..10_000_000) {
        let order = TestDataFactory::order(Decimal::new(cents, 2));
        let result = TaxCalculator::default().compute(&rules, &order).unwrap();
        let grouped = DisplayGrouper::new().group(&result);

        let displayed: Decimal = grouped.iter().map(|g| g.amount).sum();
        prop_assert_eq!(displayed, result.total_tax);

        let members: usize = grouped.iter().map(|g| g.member_rule_ids.len()).sum();
        prop_assert_eq!(members, result.lines.len());
    }
}
