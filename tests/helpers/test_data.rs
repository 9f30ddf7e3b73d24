// Test Data Factory
//
// Builds tax rules, order contexts and HTTP payloads. Order ids are generated
// per call so tests sharing a store stay isolated.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use tablefare::core::Currency;
use tablefare::taxes::models::{
    CreateTaxRuleRequest, OrderAmountContext, OrderLineItem, OrderType, TaxKind, TaxPhase,
    TaxRule, TaxScope,
};
use tablefare::taxes::{InMemoryTaxStore, TaxService};

pub const RESTAURANT_ID: &str = "rest-001";

/// Test data factory for tax rules and orders
pub struct TestDataFactory;

impl TestDataFactory {
    pub fn random_order_id() -> String {
        format!("TEST-{}", Uuid::new_v4())
    }

    pub fn rule(id: &str, kind: TaxKind, value: Decimal, phase: TaxPhase) -> TaxRule {
        TaxRule::new(
            id,
            RESTAURANT_ID,
            CreateTaxRuleRequest::new(id, kind, value, phase),
        )
        .expect("valid test rule")
    }

    pub fn percentage(id: &str, value: Decimal, phase: TaxPhase) -> TaxRule {
        Self::rule(id, TaxKind::Percentage, value, phase)
    }

    pub fn fixed(id: &str, value: Decimal, phase: TaxPhase) -> TaxRule {
        Self::rule(id, TaxKind::Fixed, value, phase)
    }

    pub fn branch_rule(id: &str, branch_id: &str, value: Decimal) -> TaxRule {
        let mut rule = Self::percentage(id, value, TaxPhase::Subtotal);
        rule.scope = TaxScope::Branch {
            branch_id: branch_id.to_string(),
        };
        rule
    }

    pub fn grouped(id: &str, group: &str, value: Decimal, display_order: i32) -> TaxRule {
        let mut rule = Self::percentage(id, value, TaxPhase::Subtotal);
        rule.group_name = Some(group.to_string());
        rule.display_order = display_order;
        rule
    }

    /// Dine-in order at no particular branch with a single line
    pub fn order(subtotal: Decimal) -> OrderAmountContext {
        Self::order_at(
            None,
            OrderType::DineIn,
            &[OrderLineItem::new("item-1", Some("mains"), subtotal)],
        )
    }

    pub fn order_at(
        branch_id: Option<&str>,
        order_type: OrderType,
        lines: &[OrderLineItem],
    ) -> OrderAmountContext {
        OrderAmountContext::from_line_items(
            RESTAURANT_ID,
            branch_id.map(str::to_string),
            order_type,
            lines,
        )
        .expect("valid test order")
    }

    /// JSON body for POST /restaurants/{id}/taxes
    pub fn rule_payload(name: &str, kind: &str, value: &str, phase: &str) -> Value {
        json!({
            "name": name,
            "kind": kind,
            "value": value,
            "phase": phase,
        })
    }

    /// JSON body for the calculate and finalize endpoints
    pub fn order_payload(order_type: &str, amounts: &[(&str, &str)]) -> Value {
        let line_items: Vec<Value> = amounts
            .iter()
            .map(|(item_id, amount)| json!({ "item_id": item_id, "amount": amount }))
            .collect();
        json!({
            "order_type": order_type,
            "line_items": line_items,
        })
    }
}

/// Service over a fresh in-memory store
pub fn in_memory_service() -> (Arc<TaxService>, Arc<InMemoryTaxStore>) {
    let store = Arc::new(InMemoryTaxStore::new());
    let service = TaxService::new(store.clone(), store.clone(), Currency::INR);
    (Arc::new(service), store)
}
