use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::tax_rule::{TaxKind, TaxPhase, TaxRule};

/// One rule's contribution to an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLine {
    pub rule_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub kind: TaxKind,
    pub value: Decimal,
    pub phase: TaxPhase,
    /// Amount the rule was evaluated against
    pub base_amount: Decimal,
    /// Contribution, rounded to the currency's minor unit
    pub amount: Decimal,
}

impl TaxLine {
    pub fn new(rule: &TaxRule, base_amount: Decimal, amount: Decimal) -> Self {
        Self {
            rule_id: rule.id.clone(),
            name: rule.name.clone(),
            group_name: rule.group_label().map(str::to_string),
            kind: rule.kind,
            value: rule.value,
            phase: rule.phase,
            base_amount,
            amount,
        }
    }
}

/// Output of the cascading calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxComputationResult {
    pub subtotal: Decimal,
    pub lines: Vec<TaxLine>,
    pub total_tax: Decimal,
    pub grand_total: Decimal,
}

impl TaxComputationResult {
    /// Result for an untaxed order
    pub fn empty(subtotal: Decimal) -> Self {
        Self {
            subtotal,
            lines: Vec::new(),
            total_tax: Decimal::ZERO,
            grand_total: subtotal,
        }
    }

    /// Snapshot lines to be stored on the order
    pub fn snapshots(&self) -> Vec<TaxSnapshot> {
        self.lines.iter().map(TaxSnapshot::from).collect()
    }
}

/// Immutable copy of a computed tax line, stored on the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxSnapshot {
    pub rule_id: String,
    pub name: String,
    pub kind: TaxKind,
    pub value: Decimal,
    pub phase: TaxPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub amount: Decimal,
}

impl From<&TaxLine> for TaxSnapshot {
    fn from(line: &TaxLine) -> Self {
        Self {
            rule_id: line.rule_id.clone(),
            name: line.name.clone(),
            kind: line.kind,
            value: line.value,
            phase: line.phase,
            group_name: line.group_name.clone(),
            amount: line.amount,
        }
    }
}

/// A display line: either a single rule or a collapsed group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedTaxLine {
    pub label: String,
    pub amount: Decimal,
    pub member_rule_ids: Vec<String>,
}

/// Everything the order workflow needs from one computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTaxBreakdown {
    pub subtotal: Decimal,
    pub lines: Vec<TaxLine>,
    pub display: Vec<GroupedTaxLine>,
    pub total_tax: Decimal,
    pub grand_total: Decimal,
}

/// Tax snapshot persisted against a finalized order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTaxSnapshot {
    pub order_id: String,
    pub restaurant_id: String,
    pub subtotal: Decimal,
    pub total_tax: Decimal,
    pub grand_total: Decimal,
    pub lines: Vec<TaxSnapshot>,
    pub created_at: DateTime<Utc>,
}

impl OrderTaxSnapshot {
    pub fn new(
        order_id: impl Into<String>,
        restaurant_id: impl Into<String>,
        result: &TaxComputationResult,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            restaurant_id: restaurant_id.into(),
            subtotal: result.subtotal,
            total_tax: result.total_tax,
            grand_total: result.grand_total,
            lines: result.snapshots(),
            created_at: Utc::now(),
        }
    }

    /// Whether any stored line was produced by the given rule
    pub fn references_rule(&self, rule_id: &str) -> bool {
        self.lines.iter().any(|line| line.rule_id == rule_id)
    }
}
