use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::taxes::models::{OrderTaxSnapshot, TaxSnapshot};

/// Persistence of the tax lines frozen on finalized orders
#[async_trait]
pub trait OrderTaxStore: Send + Sync {
    /// Store a snapshot; an order can only be finalized once per restaurant
    async fn save_snapshot(&self, snapshot: &OrderTaxSnapshot) -> Result<()>;

    async fn find_snapshot(
        &self,
        restaurant_id: &str,
        order_id: &str,
    ) -> Result<Option<OrderTaxSnapshot>>;

    /// Whether any finalized order carries a line produced by the rule
    async fn is_rule_referenced(&self, rule_id: &str) -> Result<bool>;
}

/// MySQL-backed snapshot store
pub struct MySqlOrderTaxRepository {
    pool: MySqlPool,
}

impl MySqlOrderTaxRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    order_id: String,
    restaurant_id: String,
    subtotal: Decimal,
    total_tax: Decimal,
    grand_total: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SnapshotLineRow {
    rule_id: String,
    name: String,
    kind: String,
    value: Decimal,
    phase: String,
    group_name: Option<String>,
    amount: Decimal,
}

impl TryFrom<SnapshotLineRow> for TaxSnapshot {
    type Error = AppError;

    fn try_from(row: SnapshotLineRow) -> Result<Self> {
        Ok(TaxSnapshot {
            kind: row.kind.parse().map_err(AppError::internal)?,
            phase: row.phase.parse().map_err(AppError::internal)?,
            rule_id: row.rule_id,
            name: row.name,
            value: row.value,
            group_name: row.group_name,
            amount: row.amount,
        })
    }
}

#[async_trait]
impl OrderTaxStore for MySqlOrderTaxRepository {
    async fn save_snapshot(&self, snapshot: &OrderTaxSnapshot) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO order_tax_snapshots (
                order_id, restaurant_id, subtotal, total_tax, grand_total, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.order_id)
        .bind(&snapshot.restaurant_id)
        .bind(snapshot.subtotal)
        .bind(snapshot.total_tax)
        .bind(snapshot.grand_total)
        .bind(snapshot.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::conflict(format!(
                        "Taxes for order {} are already finalized",
                        snapshot.order_id
                    ));
                }
            }
            AppError::Database(e)
        })?;

        for (position, line) in snapshot.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_tax_lines (
                    restaurant_id, order_id, position, rule_id, name, kind, value, phase,
                    group_name, amount
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&snapshot.restaurant_id)
            .bind(&snapshot.order_id)
            .bind(position as i32)
            .bind(&line.rule_id)
            .bind(&line.name)
            .bind(line.kind.as_str())
            .bind(line.value)
            .bind(line.phase.as_str())
            .bind(&line.group_name)
            .bind(line.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn find_snapshot(
        &self,
        restaurant_id: &str,
        order_id: &str,
    ) -> Result<Option<OrderTaxSnapshot>> {
        let header = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT order_id, restaurant_id, subtotal, total_tax, grand_total, created_at
            FROM order_tax_snapshots
            WHERE restaurant_id = ? AND order_id = ?
            "#,
        )
        .bind(restaurant_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, SnapshotLineRow>(
            r#"
            SELECT rule_id, name, kind, value, phase, group_name, amount
            FROM order_tax_lines
            WHERE restaurant_id = ? AND order_id = ?
            ORDER BY position
            "#,
        )
        .bind(restaurant_id)
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TaxSnapshot::try_from)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(OrderTaxSnapshot {
            order_id: header.order_id,
            restaurant_id: header.restaurant_id,
            subtotal: header.subtotal,
            total_tax: header.total_tax,
            grand_total: header.grand_total,
            lines,
            created_at: header.created_at,
        }))
    }

    async fn is_rule_referenced(&self, rule_id: &str) -> Result<bool> {
        let references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_tax_lines WHERE rule_id = ?")
                .bind(rule_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(references > 0)
    }
}
