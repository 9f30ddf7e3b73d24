use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use crate::core::{AppError, Result};
use crate::modules::taxes::models::{TaxCategory, TaxConditions, TaxRule, TaxScope};

/// Filters for listing rules in the admin console
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxRuleFilter {
    /// Restrict to rules of one branch (restaurant-wide rules are included)
    pub branch_id: Option<String>,
    pub active: Option<bool>,
    pub category: Option<TaxCategory>,
}

impl TaxRuleFilter {
    pub fn matches(&self, rule: &TaxRule) -> bool {
        if let Some(branch_id) = self.branch_id.as_deref() {
            if rule.branch_id().is_some_and(|b| b != branch_id) {
                return false;
            }
        }
        if self.active.is_some_and(|active| rule.is_active != active) {
            return false;
        }
        if self.category.is_some_and(|category| rule.category != category) {
            return false;
        }
        true
    }
}

/// Tax rule persistence
#[async_trait]
pub trait TaxRuleStore: Send + Sync {
    async fn create(&self, rule: &TaxRule) -> Result<TaxRule>;

    async fn find_by_id(&self, restaurant_id: &str, id: &str) -> Result<Option<TaxRule>>;

    async fn list(&self, restaurant_id: &str, filter: &TaxRuleFilter) -> Result<Vec<TaxRule>>;

    /// All active restaurant-scope rules of the restaurant plus the active
    /// branch-scope rules of `branch_id`. Restaurant-scope rules are never
    /// dropped because a branch is given.
    async fn list_active_rules(
        &self,
        restaurant_id: &str,
        branch_id: Option<&str>,
    ) -> Result<Vec<TaxRule>>;

    async fn update(&self, rule: &TaxRule) -> Result<()>;

    async fn set_active(&self, restaurant_id: &str, id: &str, active: bool) -> Result<()>;
}

/// MySQL-backed rule store
pub struct MySqlTaxRuleRepository {
    pool: MySqlPool,
}

impl MySqlTaxRuleRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// MySQL reports zero affected rows for no-op updates, so a miss has to be
    /// told apart from an unchanged row
    async fn ensure_exists(&self, restaurant_id: &str, id: &str) -> Result<()> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tax_rules WHERE restaurant_id = ? AND id = ?")
                .bind(restaurant_id)
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if count == 0 {
            return Err(AppError::not_found(format!("Tax rule {}", id)));
        }

        Ok(())
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, restaurant_id, scope, branch_id, name, description, kind, value, phase,
           category, conditions, group_name, display_order, is_active, created_at, updated_at
    FROM tax_rules
"#;

#[derive(Debug, FromRow)]
struct TaxRuleRow {
    id: String,
    restaurant_id: String,
    scope: String,
    branch_id: Option<String>,
    name: String,
    description: Option<String>,
    kind: String,
    value: Decimal,
    phase: String,
    category: String,
    conditions: Option<String>,
    group_name: Option<String>,
    display_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaxRuleRow> for TaxRule {
    type Error = AppError;

    fn try_from(row: TaxRuleRow) -> Result<Self> {
        let scope = match (row.scope.as_str(), row.branch_id) {
            ("restaurant", _) => TaxScope::Restaurant,
            ("branch", Some(branch_id)) => TaxScope::Branch { branch_id },
            (scope, branch_id) => {
                return Err(AppError::internal(format!(
                    "Tax rule {} has invalid scope '{}' (branch_id: {:?})",
                    row.id, scope, branch_id
                )))
            }
        };

        let conditions = match row.conditions.as_deref() {
            Some(json) if !json.trim().is_empty() => {
                serde_json::from_str::<TaxConditions>(json)?.normalized()
            }
            _ => TaxConditions::default(),
        };

        Ok(TaxRule {
            scope,
            name: row.name,
            description: row.description,
            kind: row.kind.parse().map_err(AppError::internal)?,
            value: row.value,
            phase: row.phase.parse().map_err(AppError::internal)?,
            category: row.category.parse().map_err(AppError::internal)?,
            conditions,
            group_name: row.group_name,
            display_order: row.display_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            id: row.id,
            restaurant_id: row.restaurant_id,
        })
    }
}

fn conditions_json(conditions: &TaxConditions) -> Result<Option<String>> {
    if conditions.is_unconditional() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(conditions)?))
}

fn into_rules(rows: Vec<TaxRuleRow>) -> Result<Vec<TaxRule>> {
    rows.into_iter().map(TaxRule::try_from).collect()
}

#[async_trait]
impl TaxRuleStore for MySqlTaxRuleRepository {
    async fn create(&self, rule: &TaxRule) -> Result<TaxRule> {
        sqlx::query(
            r#"
            INSERT INTO tax_rules (
                id, restaurant_id, scope, branch_id, name, description, kind, value, phase,
                category, conditions, group_name, display_order, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.restaurant_id)
        .bind(rule.scope.as_str())
        .bind(rule.branch_id())
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.kind.as_str())
        .bind(rule.value)
        .bind(rule.phase.as_str())
        .bind(rule.category.as_str())
        .bind(conditions_json(&rule.conditions)?)
        .bind(&rule.group_name)
        .bind(rule.display_order)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::conflict(format!("Tax rule {} already exists", rule.id));
                }
            }
            AppError::Database(e)
        })?;

        Ok(rule.clone())
    }

    async fn find_by_id(&self, restaurant_id: &str, id: &str) -> Result<Option<TaxRule>> {
        let row = sqlx::query_as::<_, TaxRuleRow>(&format!(
            "{} WHERE restaurant_id = ? AND id = ?",
            SELECT_COLUMNS
        ))
        .bind(restaurant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TaxRule::try_from).transpose()
    }

    async fn list(&self, restaurant_id: &str, filter: &TaxRuleFilter) -> Result<Vec<TaxRule>> {
        let mut query: QueryBuilder<MySql> = QueryBuilder::new(SELECT_COLUMNS);
        query.push(" WHERE restaurant_id = ").push_bind(restaurant_id);

        if let Some(branch_id) = &filter.branch_id {
            query
                .push(" AND (scope = 'restaurant' OR branch_id = ")
                .push_bind(branch_id)
                .push(")");
        }
        if let Some(active) = filter.active {
            query.push(" AND is_active = ").push_bind(active);
        }
        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category.as_str());
        }
        query.push(" ORDER BY display_order, name, id");

        let rows = query
            .build_query_as::<TaxRuleRow>()
            .fetch_all(&self.pool)
            .await?;

        into_rules(rows)
    }

    async fn list_active_rules(
        &self,
        restaurant_id: &str,
        branch_id: Option<&str>,
    ) -> Result<Vec<TaxRule>> {
        let rows = match branch_id {
            Some(branch_id) => {
                sqlx::query_as::<_, TaxRuleRow>(&format!(
                    "{} WHERE restaurant_id = ? AND is_active = TRUE \
                     AND (scope = 'restaurant' OR (scope = 'branch' AND branch_id = ?)) \
                     ORDER BY display_order, name, id",
                    SELECT_COLUMNS
                ))
                .bind(restaurant_id)
                .bind(branch_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TaxRuleRow>(&format!(
                    "{} WHERE restaurant_id = ? AND is_active = TRUE AND scope = 'restaurant' \
                     ORDER BY display_order, name, id",
                    SELECT_COLUMNS
                ))
                .bind(restaurant_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        into_rules(rows)
    }

    async fn update(&self, rule: &TaxRule) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tax_rules
            SET scope = ?, branch_id = ?, name = ?, description = ?, kind = ?, value = ?,
                phase = ?, category = ?, conditions = ?, group_name = ?, display_order = ?,
                is_active = ?, updated_at = ?
            WHERE restaurant_id = ? AND id = ?
            "#,
        )
        .bind(rule.scope.as_str())
        .bind(rule.branch_id())
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.kind.as_str())
        .bind(rule.value)
        .bind(rule.phase.as_str())
        .bind(rule.category.as_str())
        .bind(conditions_json(&rule.conditions)?)
        .bind(&rule.group_name)
        .bind(rule.display_order)
        .bind(rule.is_active)
        .bind(rule.updated_at)
        .bind(&rule.restaurant_id)
        .bind(&rule.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.ensure_exists(&rule.restaurant_id, &rule.id).await?;
        }

        Ok(())
    }

    async fn set_active(&self, restaurant_id: &str, id: &str, active: bool) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tax_rules
            SET is_active = ?, updated_at = ?
            WHERE restaurant_id = ? AND id = ?
            "#,
        )
        .bind(active)
        .bind(Utc::now())
        .bind(restaurant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.ensure_exists(restaurant_id, id).await?;
        }

        Ok(())
    }
}
