// Order amounts as seen by the tax engine
//
// The order workflow hands over its finalized line items; the context owns
// everything the resolver and calculator need so that one computation never
// reads shared state.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::tax_rule::{OrderType, TaxConditions};
use crate::core::{AppError, Result};

/// Largest amount a `DECIMAL(15,4)` column holds
pub const MAX_ORDER_AMOUNT: Decimal = Decimal::from_parts(2_764_472_319, 232_830, 0, false, 4);

/// A finalized order line as handed over by the order workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub item_id: String,
    #[serde(default)]
    pub category_id: Option<String>,
    /// Pre-tax line total
    pub amount: Decimal,
}

impl OrderLineItem {
    pub fn new(item_id: impl Into<String>, category_id: Option<&str>, amount: Decimal) -> Self {
        Self {
            item_id: item_id.into(),
            category_id: category_id.map(str::to_string),
            amount,
        }
    }
}

/// Immutable input of one tax computation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAmountContext {
    restaurant_id: String,
    branch_id: Option<String>,
    order_type: OrderType,
    subtotal: Decimal,
    /// item id -> pre-tax amount
    item_amounts: BTreeMap<String, Decimal>,
    /// item id -> category id, for every item in the order
    items: BTreeMap<String, Option<String>>,
    category_ids_present: BTreeSet<String>,
}

impl OrderAmountContext {
    /// Build a context whose subtotal is the sum of the line items.
    /// Repeated item ids are merged into one amount.
    pub fn from_line_items(
        restaurant_id: impl Into<String>,
        branch_id: Option<String>,
        order_type: OrderType,
        line_items: &[OrderLineItem],
    ) -> Result<Self> {
        let item_amounts = Self::merge_item_amounts(line_items)?;
        let subtotal = line_items
            .iter()
            .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.amount))
            .ok_or_else(Self::overflow)?;

        Self::new(
            restaurant_id,
            branch_id,
            order_type,
            subtotal,
            item_amounts,
            line_items,
        )
    }

    /// Per-item totals of the line items; repeated item ids are added up
    pub fn merge_item_amounts(line_items: &[OrderLineItem]) -> Result<BTreeMap<String, Decimal>> {
        let mut item_amounts: BTreeMap<String, Decimal> = BTreeMap::new();
        for line in line_items {
            let amount = item_amounts.entry(line.item_id.clone()).or_default();
            *amount = amount.checked_add(line.amount).ok_or_else(Self::overflow)?;
        }
        Ok(item_amounts)
    }

    fn overflow() -> AppError {
        AppError::invalid_input(format!(
            "Order amounts exceed the maximum of {}",
            MAX_ORDER_AMOUNT
        ))
    }

    fn check_bound(what: &str, amount: Decimal) -> Result<()> {
        if amount > MAX_ORDER_AMOUNT {
            return Err(AppError::invalid_input(format!(
                "{} exceeds the maximum of {}, got: {}",
                what, MAX_ORDER_AMOUNT, amount
            )));
        }
        Ok(())
    }

    /// Build a context from an explicit subtotal and item amounts.
    ///
    /// Fails on a negative subtotal, a negative amount, an amount above
    /// `MAX_ORDER_AMOUNT`, or an amount for an item that is not part of the
    /// order.
    pub fn new(
        restaurant_id: impl Into<String>,
        branch_id: Option<String>,
        order_type: OrderType,
        subtotal: Decimal,
        item_amounts: BTreeMap<String, Decimal>,
        line_items: &[OrderLineItem],
    ) -> Result<Self> {
        if subtotal < Decimal::ZERO {
            return Err(AppError::invalid_input(format!(
                "Order subtotal cannot be negative, got: {}",
                subtotal
            )));
        }
        Self::check_bound("Order subtotal", subtotal)?;

        let mut items: BTreeMap<String, Option<String>> = BTreeMap::new();
        for line in line_items {
            if line.item_id.trim().is_empty() {
                return Err(AppError::invalid_input("Order line item id cannot be empty"));
            }
            if line.amount < Decimal::ZERO {
                return Err(AppError::invalid_input(format!(
                    "Amount for item '{}' cannot be negative, got: {}",
                    line.item_id, line.amount
                )));
            }
            Self::check_bound(&format!("Amount for item '{}'", line.item_id), line.amount)?;
            let category = items.entry(line.item_id.clone()).or_default();
            if category.is_none() {
                *category = line.category_id.clone();
            }
        }

        for (item_id, amount) in &item_amounts {
            if !items.contains_key(item_id) {
                return Err(AppError::invalid_input(format!(
                    "Item amount references item '{}' which is not in the order",
                    item_id
                )));
            }
            if *amount < Decimal::ZERO {
                return Err(AppError::invalid_input(format!(
                    "Amount for item '{}' cannot be negative, got: {}",
                    item_id, amount
                )));
            }
            Self::check_bound(&format!("Amount for item '{}'", item_id), *amount)?;
        }

        let category_ids_present = items.values().flatten().cloned().collect();

        Ok(Self {
            restaurant_id: restaurant_id.into(),
            branch_id: branch_id.filter(|b| !b.trim().is_empty()),
            order_type,
            subtotal,
            item_amounts,
            items,
            category_ids_present,
        })
    }

    pub fn restaurant_id(&self) -> &str {
        &self.restaurant_id
    }

    pub fn branch_id(&self) -> Option<&str> {
        self.branch_id.as_deref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn item_amounts(&self) -> &BTreeMap<String, Decimal> {
        &self.item_amounts
    }

    pub fn category_ids_present(&self) -> &BTreeSet<String> {
        &self.category_ids_present
    }

    /// Whether at least one item of the order falls inside the selector
    pub fn has_qualifying_item(&self, conditions: &TaxConditions) -> bool {
        self.items
            .iter()
            .any(|(item_id, category)| conditions.selects_item(item_id, category.as_deref()))
    }

    /// Sum of the amounts of the items inside the selector
    pub fn qualifying_amount(&self, conditions: &TaxConditions) -> Decimal {
        self.item_amounts
            .iter()
            .filter(|(item_id, _)| {
                let category = self.items.get(*item_id).and_then(|c| c.as_deref());
                conditions.selects_item(item_id, category)
            })
            .map(|(_, amount)| *amount)
            .sum()
    }
}
