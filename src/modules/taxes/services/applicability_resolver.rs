use std::fmt;

use crate::modules::taxes::models::{OrderAmountContext, TaxRule, TaxScope};

/// Why a rule was left out of an order's tax set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Inactive,
    OtherRestaurant,
    OtherBranch,
    ExcludedBranch,
    OrderType,
    BelowMinimum,
    AboveMaximum,
    NoQualifyingItems,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Exclusion::Inactive => "inactive",
            Exclusion::OtherRestaurant => "other_restaurant",
            Exclusion::OtherBranch => "other_branch",
            Exclusion::ExcludedBranch => "excluded_branch",
            Exclusion::OrderType => "order_type",
            Exclusion::BelowMinimum => "below_min_order_amount",
            Exclusion::AboveMaximum => "above_max_order_amount",
            Exclusion::NoQualifyingItems => "no_qualifying_items",
        };
        f.write_str(reason)
    }
}

/// Selects the rules that apply to one order and fixes their evaluation order
pub struct ApplicabilityResolver;

impl ApplicabilityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Filter `rules` down to those applying to `context`, sorted by
    /// (phase rank, display order, name, id).
    ///
    /// A rule applies only if it is active, in scope, and every condition it
    /// sets matches. An empty result is a valid untaxed order.
    pub fn resolve(&self, rules: &[TaxRule], context: &OrderAmountContext) -> Vec<TaxRule> {
        let mut applicable: Vec<TaxRule> = rules
            .iter()
            .filter(|rule| match self.check(rule, context) {
                None => true,
                Some(reason) => {
                    tracing::debug!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        reason = %reason,
                        "Tax rule excluded"
                    );
                    false
                }
            })
            .cloned()
            .collect();

        sort_for_evaluation(&mut applicable);

        tracing::debug!(
            restaurant_id = %context.restaurant_id(),
            branch_id = ?context.branch_id(),
            candidates = rules.len(),
            applicable = applicable.len(),
            "Resolved applicable tax rules"
        );

        applicable
    }

    /// Returns the first reason the rule does not apply, or `None` if it does
    pub fn check(&self, rule: &TaxRule, context: &OrderAmountContext) -> Option<Exclusion> {
        if !rule.is_active {
            return Some(Exclusion::Inactive);
        }

        if rule.restaurant_id != context.restaurant_id() {
            return Some(Exclusion::OtherRestaurant);
        }

        if let TaxScope::Branch { branch_id } = &rule.scope {
            if context.branch_id() != Some(branch_id.as_str()) {
                return Some(Exclusion::OtherBranch);
            }
        }

        let conditions = &rule.conditions;

        if let (Some(excluded), Some(branch_id)) =
            (&conditions.excluded_branch_ids, context.branch_id())
        {
            if excluded.contains(branch_id) {
                return Some(Exclusion::ExcludedBranch);
            }
        }

        if let Some(order_types) = &conditions.order_types {
            if !order_types.contains(&context.order_type()) {
                return Some(Exclusion::OrderType);
            }
        }

        let subtotal = context.subtotal();
        if conditions.min_order_amount.is_some_and(|min| subtotal < min) {
            return Some(Exclusion::BelowMinimum);
        }
        if conditions.max_order_amount.is_some_and(|max| subtotal > max) {
            return Some(Exclusion::AboveMaximum);
        }

        if conditions.has_item_selector() && !context.has_qualifying_item(conditions) {
            return Some(Exclusion::NoQualifyingItems);
        }

        None
    }
}

impl Default for ApplicabilityResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort into evaluation order
pub fn sort_for_evaluation(rules: &mut [TaxRule]) {
    rules.sort_by(|a, b| a.evaluation_order(b));
}
