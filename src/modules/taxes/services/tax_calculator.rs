use rust_decimal::Decimal;

use crate::core::{AppError, Currency, Result};
use crate::modules::taxes::models::{
    OrderAmountContext, TaxComputationResult, TaxKind, TaxLine, TaxPhase, TaxRule,
};

/// TaxCalculator runs the cascading tax pass over resolved rules
pub struct TaxCalculator {
    currency: Currency,
}

impl TaxCalculator {
    pub fn new(currency: Currency) -> Self {
        Self { currency }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Compute every rule's contribution in a single left-to-right pass.
    ///
    /// Rules are evaluated subtotal -> item_total -> after_other_taxes, then by
    /// display order, name and id, regardless of the order they are passed in.
    /// Each contribution is rounded half-up to the currency's minor unit
    /// before it joins the running total, so
    /// `grand_total == subtotal + sum(line amounts)` holds exactly.
    ///
    /// Fails with `InvalidInput` when a contribution or the running total
    /// leaves the `Decimal` range.
    pub fn compute(
        &self,
        rules: &[TaxRule],
        context: &OrderAmountContext,
    ) -> Result<TaxComputationResult> {
        let subtotal = context.subtotal();
        if rules.is_empty() {
            return Ok(TaxComputationResult::empty(subtotal));
        }

        let mut ordered: Vec<&TaxRule> = rules.iter().collect();
        ordered.sort_by(|a, b| a.evaluation_order(b));

        let mut tax_so_far = Decimal::ZERO;
        let mut lines = Vec::with_capacity(ordered.len());

        for rule in ordered {
            let base = self.base_amount(rule, context, tax_so_far)?;
            let amount = match base {
                Some(base) => self.contribution(rule, base)?,
                None => Decimal::ZERO,
            };

            tax_so_far = tax_so_far
                .checked_add(amount)
                .ok_or_else(|| overflow(rule))?;
            lines.push(TaxLine::new(rule, base.unwrap_or(Decimal::ZERO), amount));
        }

        let grand_total = subtotal
            .checked_add(tax_so_far)
            .ok_or_else(|| AppError::invalid_input("Order grand total overflowed"))?;

        Ok(TaxComputationResult {
            subtotal,
            lines,
            total_tax: tax_so_far,
            grand_total,
        })
    }

    /// Amount the rule is evaluated against, `None` when the rule is bound to
    /// items and none of them are in this order
    fn base_amount(
        &self,
        rule: &TaxRule,
        context: &OrderAmountContext,
        tax_so_far: Decimal,
    ) -> Result<Option<Decimal>> {
        let base = match rule.phase {
            TaxPhase::Subtotal => Some(context.subtotal()),
            TaxPhase::ItemTotal if rule.conditions.has_item_selector() => {
                if !context.has_qualifying_item(&rule.conditions) {
                    tracing::warn!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        restaurant_id = %context.restaurant_id(),
                        "Item-bound tax rule has no qualifying items, contributing zero"
                    );
                    return Ok(None);
                }
                Some(context.qualifying_amount(&rule.conditions))
            }
            TaxPhase::ItemTotal => Some(context.subtotal()),
            TaxPhase::AfterOtherTaxes => Some(
                context
                    .subtotal()
                    .checked_add(tax_so_far)
                    .ok_or_else(|| overflow(rule))?,
            ),
        };
        Ok(base)
    }

    /// Rounded contribution of one rule against its base.
    ///
    /// Fixed amounts apply once per order, including in the item_total phase.
    pub fn contribution(&self, rule: &TaxRule, base: Decimal) -> Result<Decimal> {
        let raw = match rule.kind {
            TaxKind::Percentage => base
                .checked_mul(rule.value)
                .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
                .ok_or_else(|| overflow(rule))?,
            TaxKind::Fixed => rule.value,
        };

        Ok(self.currency.round(raw))
    }
}

fn overflow(rule: &TaxRule) -> AppError {
    AppError::invalid_input(format!(
        "Tax computation overflowed at rule '{}' ({})",
        rule.name, rule.id
    ))
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new(Currency::default())
    }
}
