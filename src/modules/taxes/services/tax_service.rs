use std::sync::Arc;

use uuid::Uuid;

use crate::core::{AppError, Currency, Result};
use crate::modules::taxes::models::{
    CreateTaxRuleRequest, OrderAmountContext, OrderTaxBreakdown, OrderTaxSnapshot,
    TaxComputationResult, TaxRule, UpdateTaxRuleRequest,
};
use crate::modules::taxes::repositories::{OrderTaxStore, TaxRuleFilter, TaxRuleStore};

use super::applicability_resolver::ApplicabilityResolver;
use super::display_grouper::DisplayGrouper;
use super::tax_calculator::TaxCalculator;

/// Service for tax rule management and order tax computation
pub struct TaxService {
    rule_store: Arc<dyn TaxRuleStore>,
    order_store: Arc<dyn OrderTaxStore>,
    resolver: ApplicabilityResolver,
    calculator: TaxCalculator,
    grouper: DisplayGrouper,
}

impl TaxService {
    pub fn new(
        rule_store: Arc<dyn TaxRuleStore>,
        order_store: Arc<dyn OrderTaxStore>,
        currency: Currency,
    ) -> Self {
        Self {
            rule_store,
            order_store,
            resolver: ApplicabilityResolver::new(),
            calculator: TaxCalculator::new(currency),
            grouper: DisplayGrouper::new(),
        }
    }

    pub fn currency(&self) -> Currency {
        self.calculator.currency()
    }

    /// Create a tax rule for a restaurant
    pub async fn create_rule(
        &self,
        restaurant_id: &str,
        request: CreateTaxRuleRequest,
    ) -> Result<TaxRule> {
        let rule = TaxRule::new(Uuid::new_v4().to_string(), restaurant_id, request)?;
        let created = self.rule_store.create(&rule).await?;

        tracing::info!(
            rule_id = %created.id,
            restaurant_id = %restaurant_id,
            scope = created.scope.as_str(),
            phase = %created.phase,
            "Tax rule created"
        );

        Ok(created)
    }

    pub async fn get_rule(&self, restaurant_id: &str, id: &str) -> Result<TaxRule> {
        self.rule_store
            .find_by_id(restaurant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Tax rule {}", id)))
    }

    pub async fn list_rules(
        &self,
        restaurant_id: &str,
        filter: &TaxRuleFilter,
    ) -> Result<Vec<TaxRule>> {
        self.rule_store.list(restaurant_id, filter).await
    }

    /// Partially update a rule.
    ///
    /// Moving a rule to another phase is refused once any finalized order
    /// carries a line it produced.
    pub async fn update_rule(
        &self,
        restaurant_id: &str,
        id: &str,
        update: UpdateTaxRuleRequest,
    ) -> Result<TaxRule> {
        let mut rule = self.get_rule(restaurant_id, id).await?;

        if let Some(phase) = update.phase {
            if phase != rule.phase && self.order_store.is_rule_referenced(id).await? {
                return Err(AppError::conflict(format!(
                    "Tax rule {} is referenced by finalized orders; its phase cannot change",
                    id
                )));
            }
        }

        rule.apply_update(update)?;
        self.rule_store.update(&rule).await?;

        tracing::info!(rule_id = %id, restaurant_id = %restaurant_id, "Tax rule updated");

        Ok(rule)
    }

    /// Enable or disable a rule without deleting it
    pub async fn set_rule_active(
        &self,
        restaurant_id: &str,
        id: &str,
        active: bool,
    ) -> Result<TaxRule> {
        self.rule_store.set_active(restaurant_id, id, active).await?;

        tracing::info!(
            rule_id = %id,
            restaurant_id = %restaurant_id,
            active,
            "Tax rule activation changed"
        );

        self.get_rule(restaurant_id, id).await
    }

    /// Active rules that apply to the order, in evaluation order
    pub async fn resolve_applicable_taxes(
        &self,
        context: &OrderAmountContext,
    ) -> Result<Vec<TaxRule>> {
        let candidates = self
            .rule_store
            .list_active_rules(context.restaurant_id(), context.branch_id())
            .await?;

        Ok(self.resolver.resolve(&candidates, context))
    }

    async fn compute(&self, context: &OrderAmountContext) -> Result<TaxComputationResult> {
        let rules = self.resolve_applicable_taxes(context).await?;
        self.calculator.compute(&rules, context)
    }

    /// Preview the taxes for an order without persisting anything
    pub async fn calculate(&self, context: &OrderAmountContext) -> Result<OrderTaxBreakdown> {
        let result = self.compute(context).await?;
        let display = self.grouper.group(&result);

        Ok(OrderTaxBreakdown {
            subtotal: result.subtotal,
            lines: result.lines,
            display,
            total_tax: result.total_tax,
            grand_total: result.grand_total,
        })
    }

    /// Compute the order's taxes and freeze them on the order
    pub async fn finalize_order_taxes(
        &self,
        order_id: &str,
        context: &OrderAmountContext,
    ) -> Result<OrderTaxSnapshot> {
        if order_id.trim().is_empty() {
            return Err(AppError::invalid_input("Order id cannot be empty"));
        }

        let result = self.compute(context).await?;
        let snapshot = OrderTaxSnapshot::new(order_id, context.restaurant_id(), &result);
        self.order_store.save_snapshot(&snapshot).await?;

        tracing::info!(
            order_id = %order_id,
            restaurant_id = %context.restaurant_id(),
            total_tax = %self.currency().format_amount(snapshot.total_tax),
            lines = snapshot.lines.len(),
            "Order taxes finalized"
        );

        Ok(snapshot)
    }

    /// Stored taxes of a finalized order; never re-resolved against current rules
    pub async fn order_tax_snapshot(
        &self,
        restaurant_id: &str,
        order_id: &str,
    ) -> Result<OrderTaxSnapshot> {
        self.order_store
            .find_snapshot(restaurant_id, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Tax snapshot for order {}", order_id)))
    }
}
