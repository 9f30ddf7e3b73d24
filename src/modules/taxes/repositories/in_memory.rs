use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::order_tax_repository::OrderTaxStore;
use super::tax_rule_repository::{TaxRuleFilter, TaxRuleStore};
use crate::core::{AppError, Result};
use crate::modules::taxes::models::{OrderTaxSnapshot, TaxRule, TaxScope};

/// Process-local rule and snapshot store for tests and single-node demos
#[derive(Default)]
pub struct InMemoryTaxStore {
    rules: RwLock<HashMap<String, TaxRule>>,
    /// (restaurant id, order id) -> snapshot
    snapshots: RwLock<HashMap<(String, String), OrderTaxSnapshot>>,
}

impl InMemoryTaxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rules without validation, e.g. to simulate legacy data
    pub async fn with_rules(rules: impl IntoIterator<Item = TaxRule>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.rules.write().await;
            for rule in rules {
                guard.insert(rule.id.clone(), rule);
            }
        }
        store
    }
}

fn sorted(mut rules: Vec<TaxRule>) -> Vec<TaxRule> {
    rules.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    rules
}

#[async_trait]
impl TaxRuleStore for InMemoryTaxStore {
    async fn create(&self, rule: &TaxRule) -> Result<TaxRule> {
        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.id) {
            return Err(AppError::conflict(format!("Tax rule {} already exists", rule.id)));
        }
        rules.insert(rule.id.clone(), rule.clone());
        Ok(rule.clone())
    }

    async fn find_by_id(&self, restaurant_id: &str, id: &str) -> Result<Option<TaxRule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .get(id)
            .filter(|rule| rule.restaurant_id == restaurant_id)
            .cloned())
    }

    async fn list(&self, restaurant_id: &str, filter: &TaxRuleFilter) -> Result<Vec<TaxRule>> {
        let rules = self.rules.read().await;
        Ok(sorted(
            rules
                .values()
                .filter(|rule| rule.restaurant_id == restaurant_id && filter.matches(rule))
                .cloned()
                .collect(),
        ))
    }

    async fn list_active_rules(
        &self,
        restaurant_id: &str,
        branch_id: Option<&str>,
    ) -> Result<Vec<TaxRule>> {
        let rules = self.rules.read().await;
        Ok(sorted(
            rules
                .values()
                .filter(|rule| rule.restaurant_id == restaurant_id && rule.is_active)
                .filter(|rule| match &rule.scope {
                    TaxScope::Restaurant => true,
                    TaxScope::Branch { branch_id: rule_branch } => {
                        branch_id == Some(rule_branch.as_str())
                    }
                })
                .cloned()
                .collect(),
        ))
    }

    async fn update(&self, rule: &TaxRule) -> Result<()> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule.id) {
            Some(stored) if stored.restaurant_id == rule.restaurant_id => {
                *stored = rule.clone();
                Ok(())
            }
            _ => Err(AppError::not_found(format!("Tax rule {}", rule.id))),
        }
    }

    async fn set_active(&self, restaurant_id: &str, id: &str, active: bool) -> Result<()> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(id) {
            Some(stored) if stored.restaurant_id == restaurant_id => {
                stored.is_active = active;
                stored.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(AppError::not_found(format!("Tax rule {}", id))),
        }
    }
}

#[async_trait]
impl OrderTaxStore for InMemoryTaxStore {
    async fn save_snapshot(&self, snapshot: &OrderTaxSnapshot) -> Result<()> {
        let key = (snapshot.restaurant_id.clone(), snapshot.order_id.clone());
        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&key) {
            return Err(AppError::conflict(format!(
                "Taxes for order {} are already finalized",
                snapshot.order_id
            )));
        }
        snapshots.insert(key, snapshot.clone());
        Ok(())
    }

    async fn find_snapshot(
        &self,
        restaurant_id: &str,
        order_id: &str,
    ) -> Result<Option<OrderTaxSnapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&(restaurant_id.to_string(), order_id.to_string()))
            .cloned())
    }

    async fn is_rule_referenced(&self, rule_id: &str) -> Result<bool> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .values()
            .any(|snapshot| snapshot.references_rule(rule_id)))
    }
}
