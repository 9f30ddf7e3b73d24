// Tax rule model with validation
//
// A tax rule is a single taxation directive owned by one restaurant and,
// optionally, narrowed to one branch. Rules are configuration data: rates and
// names come from restaurant staff, the engine only decides where and in
// which order they apply.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_VALUE_SCALE: u32 = 4;

/// How a rule's `value` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxKind {
    /// `value` is a percent (18 = 18%)
    Percentage,
    /// `value` is an absolute monetary amount
    Fixed,
}

impl TaxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxKind::Percentage => "percentage",
            TaxKind::Fixed => "fixed",
        }
    }
}

impl fmt::Display for TaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaxKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(TaxKind::Percentage),
            "fixed" => Ok(TaxKind::Fixed),
            _ => Err(format!("Invalid tax kind: {}", s)),
        }
    }
}

/// Cascade stage at which a rule is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxPhase {
    /// Base is the order subtotal
    Subtotal,
    /// Base is the qualifying items' total (or the subtotal when unconditioned)
    ItemTotal,
    /// Base is the subtotal plus every tax computed before this rule
    AfterOtherTaxes,
}

impl TaxPhase {
    /// Evaluation rank; lower phases are computed first
    pub fn rank(&self) -> u8 {
        match self {
            TaxPhase::Subtotal => 0,
            TaxPhase::ItemTotal => 1,
            TaxPhase::AfterOtherTaxes => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxPhase::Subtotal => "subtotal",
            TaxPhase::ItemTotal => "item_total",
            TaxPhase::AfterOtherTaxes => "after_other_taxes",
        }
    }
}

impl fmt::Display for TaxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaxPhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "subtotal" => Ok(TaxPhase::Subtotal),
            "item_total" => Ok(TaxPhase::ItemTotal),
            "after_other_taxes" => Ok(TaxPhase::AfterOtherTaxes),
            _ => Err(format!("Invalid tax phase: {}", s)),
        }
    }
}

/// Classification label, informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxCategory {
    FoodTax,
    ServiceTax,
    RoomTax,
    LuxuryTax,
    #[default]
    Other,
}

impl TaxCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxCategory::FoodTax => "food_tax",
            TaxCategory::ServiceTax => "service_tax",
            TaxCategory::RoomTax => "room_tax",
            TaxCategory::LuxuryTax => "luxury_tax",
            TaxCategory::Other => "other",
        }
    }
}

impl fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaxCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "food_tax" => Ok(TaxCategory::FoodTax),
            "service_tax" => Ok(TaxCategory::ServiceTax),
            "room_tax" => Ok(TaxCategory::RoomTax),
            "luxury_tax" => Ok(TaxCategory::LuxuryTax),
            "other" => Ok(TaxCategory::Other),
            _ => Err(format!("Invalid tax category: {}", s)),
        }
    }
}

/// How the customer receives the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "dine-in")]
    DineIn,
    #[serde(rename = "takeaway")]
    Takeaway,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::DineIn => write!(f, "dine-in"),
            OrderType::Takeaway => write!(f, "takeaway"),
        }
    }
}

/// Where a rule applies
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaxScope {
    /// Every branch of the restaurant
    #[default]
    Restaurant,
    /// A single branch
    Branch { branch_id: String },
}

impl TaxScope {
    pub fn branch_id(&self) -> Option<&str> {
        match self {
            TaxScope::Restaurant => None,
            TaxScope::Branch { branch_id } => Some(branch_id.as_str()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxScope::Restaurant => "restaurant",
            TaxScope::Branch { .. } => "branch",
        }
    }
}

/// Optional applicability conditions.
///
/// Every field is a filter; `None` matches any order. Empty sets are
/// normalised to `None` so "no restriction" has exactly one representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_types: Option<BTreeSet<OrderType>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_order_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_order_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_item_ids: Option<BTreeSet<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_category_ids: Option<BTreeSet<String>>,

    /// Branches where a restaurant-wide rule is switched off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_branch_ids: Option<BTreeSet<String>>,
}

fn non_empty<T: Ord>(set: Option<BTreeSet<T>>) -> Option<BTreeSet<T>> {
    set.filter(|s| !s.is_empty())
}

impl TaxConditions {
    pub fn normalized(self) -> Self {
        Self {
            order_types: non_empty(self.order_types),
            min_order_amount: self.min_order_amount,
            max_order_amount: self.max_order_amount,
            specific_item_ids: non_empty(self.specific_item_ids),
            specific_category_ids: non_empty(self.specific_category_ids),
            excluded_branch_ids: non_empty(self.excluded_branch_ids),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        *self == Self::default()
    }

    /// True when the rule is bound to specific items or categories
    pub fn has_item_selector(&self) -> bool {
        self.specific_item_ids.is_some() || self.specific_category_ids.is_some()
    }

    /// Whether a line item falls inside the item/category selector.
    ///
    /// An item qualifies when its id is listed or its category is listed.
    /// Without a selector every item qualifies.
    pub fn selects_item(&self, item_id: &str, category_id: Option<&str>) -> bool {
        if !self.has_item_selector() {
            return true;
        }

        let by_item = self
            .specific_item_ids
            .as_ref()
            .is_some_and(|ids| ids.contains(item_id));
        let by_category = match (self.specific_category_ids.as_ref(), category_id) {
            (Some(ids), Some(category)) => ids.contains(category),
            _ => false,
        };

        by_item || by_category
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(min) = self.min_order_amount {
            if min < Decimal::ZERO {
                return Err(AppError::validation(format!(
                    "min_order_amount cannot be negative, got: {}",
                    min
                )));
            }
        }

        if let Some(max) = self.max_order_amount {
            if max < Decimal::ZERO {
                return Err(AppError::validation(format!(
                    "max_order_amount cannot be negative, got: {}",
                    max
                )));
            }
        }

        if let (Some(min), Some(max)) = (self.min_order_amount, self.max_order_amount) {
            if min > max {
                return Err(AppError::validation(format!(
                    "min_order_amount ({}) cannot exceed max_order_amount ({})",
                    min, max
                )));
            }
        }

        let blank_id = |ids: &Option<BTreeSet<String>>| {
            ids.as_ref()
                .is_some_and(|ids| ids.iter().any(|id| id.trim().is_empty()))
        };
        if blank_id(&self.specific_item_ids)
            || blank_id(&self.specific_category_ids)
            || blank_id(&self.excluded_branch_ids)
        {
            return Err(AppError::validation("Condition ids cannot be blank"));
        }

        Ok(())
    }
}

/// A single taxation directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRule {
    pub id: String,
    pub restaurant_id: String,
    pub scope: TaxScope,
    pub name: String,
    pub description: Option<String>,
    pub kind: TaxKind,
    pub value: Decimal,
    pub phase: TaxPhase,
    pub category: TaxCategory,
    #[serde(default)]
    pub conditions: TaxConditions,
    pub group_name: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxRule {
    /// Build and validate a new rule from a create request
    pub fn new(
        id: impl Into<String>,
        restaurant_id: impl Into<String>,
        request: CreateTaxRuleRequest,
    ) -> Result<Self> {
        let now = Utc::now();

        let rule = Self {
            id: id.into(),
            restaurant_id: restaurant_id.into(),
            scope: request.scope,
            name: request.name.trim().to_string(),
            description: normalize_text(request.description),
            kind: request.kind,
            value: request.value,
            phase: request.phase,
            category: request.category,
            conditions: request.conditions.normalized(),
            group_name: normalize_text(request.group_name),
            display_order: request.display_order,
            is_active: request.is_active,
            created_at: now,
            updated_at: now,
        };

        rule.validate()?;

        Ok(rule)
    }

    pub fn branch_id(&self) -> Option<&str> {
        self.scope.branch_id()
    }

    /// Display group label, if the rule is part of a group
    pub fn group_label(&self) -> Option<&str> {
        self.group_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn is_part_of_group(&self) -> bool {
        self.group_label().is_some()
    }

    /// Evaluation order: phase rank, then display order, then name, then id.
    /// Ids are unique, so this is a total order over distinct rules.
    pub fn evaluation_order(&self, other: &Self) -> Ordering {
        self.phase
            .rank()
            .cmp(&other.phase.rank())
            .then_with(|| self.display_order.cmp(&other.display_order))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Apply a partial update and re-validate. On error the rule is left
    /// untouched.
    ///
    /// The caller is responsible for checking phase immutability against
    /// stored order snapshots before calling this.
    pub fn apply_update(&mut self, update: UpdateTaxRuleRequest) -> Result<()> {
        let mut next = self.clone();

        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            next.description = normalize_text(Some(description));
        }
        if let Some(kind) = update.kind {
            next.kind = kind;
        }
        if let Some(value) = update.value {
            next.value = value;
        }
        if let Some(phase) = update.phase {
            next.phase = phase;
        }
        if let Some(scope) = update.scope {
            next.scope = scope;
        }
        if let Some(category) = update.category {
            next.category = category;
        }
        if let Some(conditions) = update.conditions {
            next.conditions = conditions.normalized();
        }
        if let Some(group_name) = update.group_name {
            next.group_name = normalize_text(Some(group_name));
        }
        if let Some(display_order) = update.display_order {
            next.display_order = display_order;
        }

        next.validate()?;
        next.updated_at = Utc::now();
        *self = next;

        Ok(())
    }

    /// Validate rule invariants
    pub fn validate(&self) -> Result<()> {
        Self::validate_name(&self.name)?;

        if let Some(description) = &self.description {
            if description.len() > MAX_DESCRIPTION_LEN {
                return Err(AppError::validation(format!(
                    "Tax rule description cannot exceed {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }

        Self::validate_value(self.kind, self.value)?;

        if let TaxScope::Branch { branch_id } = &self.scope {
            if branch_id.trim().is_empty() {
                return Err(AppError::validation(
                    "Branch-scoped tax rule requires a branch_id",
                ));
            }
        }

        self.conditions.validate()
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(AppError::validation("Tax rule name cannot be empty"));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(AppError::validation(format!(
                "Tax rule name cannot exceed {} characters",
                MAX_NAME_LEN
            )));
        }

        Ok(())
    }

    /// Value must be non-negative; percentages stay within 0-100 with at most
    /// 4 decimal places
    fn validate_value(kind: TaxKind, value: Decimal) -> Result<()> {
        if value < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Tax value cannot be negative, got: {}",
                value
            )));
        }

        if value.normalize().scale() > MAX_VALUE_SCALE {
            return Err(AppError::validation(format!(
                "Tax value cannot have more than {} decimal places",
                MAX_VALUE_SCALE
            )));
        }

        if kind == TaxKind::Percentage && value > Decimal::ONE_HUNDRED {
            return Err(AppError::validation(format!(
                "Percentage tax cannot exceed 100, got: {}",
                value
            )));
        }

        Ok(())
    }
}

fn normalize_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn default_active() -> bool {
    true
}

/// Payload for creating a tax rule
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaxRuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: TaxKind,
    pub value: Decimal,
    pub phase: TaxPhase,
    #[serde(default)]
    pub scope: TaxScope,
    #[serde(default)]
    pub category: TaxCategory,
    #[serde(default)]
    pub conditions: TaxConditions,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl CreateTaxRuleRequest {
    /// Minimal unconditional restaurant-wide request
    pub fn new(name: impl Into<String>, kind: TaxKind, value: Decimal, phase: TaxPhase) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            value,
            phase,
            scope: TaxScope::Restaurant,
            category: TaxCategory::Other,
            conditions: TaxConditions::default(),
            group_name: None,
            display_order: 0,
            is_active: true,
        }
    }
}

/// Partial update payload; absent fields keep their stored value.
/// An empty `description` or `group_name` clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaxRuleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<TaxKind>,
    pub value: Option<Decimal>,
    pub phase: Option<TaxPhase>,
    pub scope: Option<TaxScope>,
    pub category: Option<TaxCategory>,
    pub conditions: Option<TaxConditions>,
    pub group_name: Option<String>,
    pub display_order: Option<i32>,
}
