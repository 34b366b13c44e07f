use crate::domain::order::{status::validate_transition, LineItem, Order};
use crate::domain::records::OrderStatusLogEntry;
use crate::domain::repositories::{OrderRepository, StuckOrderRow};
use crate::domain::types::{OrderId, OrderStatus, PaymentStatus, ProductId, RetailerId, VendorId};
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::order_writer::insert_status_log;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

pub struct SqliteOrderRepository {
    database: Database,
}

impl SqliteOrderRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    async fn load_items(&self, order_id: &str) -> Result<Vec<LineItem>> {
        type ItemRow = (String, String, String, String, String, String, String, String);
        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT product_id, product_name, sku, quantity, unit, unit_price, tax_rate, line_total
            FROM order_items WHERE order_id = $1 ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load order items")?;

        rows.into_iter()
            .map(
                |(product_id, product_name, sku, quantity, unit, unit_price, tax_rate, line_total)| {
                    Ok(LineItem {
                        product_id: Uuid::parse_str(&product_id).context("Bad product id")?,
                        product_name,
                        sku,
                        quantity: Decimal::from_str(&quantity).unwrap_or_default(),
                        unit,
                        unit_price: Decimal::from_str(&unit_price).unwrap_or_default(),
                        tax_rate: Decimal::from_str(&tax_rate).unwrap_or_default(),
                        line_total: Decimal::from_str(&line_total).unwrap_or_default(),
                    })
                },
            )
            .collect()
    }
}

type OrderRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

const ORDER_FIELDS: &str = r#"
    id, order_number, retailer_id, vendor_id, total, credit_used,
    status, payment_status, amount_paid, status_changed_at,
    created_at, delivered_at, cancelled_at
"#;

fn row_to_order(row: OrderRow, line_items: Vec<LineItem>) -> Result<(Order, DateTime<Utc>)> {
    let (
        id,
        order_number,
        retailer_id,
        vendor_id,
        total,
        credit_used,
        status,
        payment_status,
        amount_paid,
        status_changed_at,
        created_at,
        delivered_at,
        cancelled_at,
    ) = row;
    let order = Order {
        id: Uuid::parse_str(&id).context("Bad order id")?,
        order_number,
        retailer_id: Uuid::parse_str(&retailer_id).context("Bad retailer id")?,
        vendor_id: Uuid::parse_str(&vendor_id).context("Bad vendor id")?,
        line_items,
        total: Decimal::from_str(&total).unwrap_or_default(),
        credit_used: Decimal::from_str(&credit_used).unwrap_or_default(),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        payment_status: payment_status
            .parse::<PaymentStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        amount_paid: Decimal::from_str(&amount_paid).unwrap_or_default(),
        created_at,
        delivered_at,
        cancelled_at,
    };
    Ok((order, status_changed_at))
}

async fn load_order_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: OrderId,
) -> Result<Option<OrderRow>> {
    sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM orders WHERE id = $1",
        ORDER_FIELDS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut **tx)
    .await
    .context("Failed to load order")
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_FIELDS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load order")?;

        match row {
            Some(row) => {
                let items = self.load_items(&row.0.clone()).await?;
                Ok(Some(row_to_order(row, items)?.0))
            }
            None => Ok(None),
        }
    }

    async fn transition_status(
        &self,
        id: OrderId,
        to: OrderStatus,
        actor: &str,
        note: Option<&str>,
    ) -> Result<Order> {
        let now = Utc::now();
        let mut tx = self.database.pool.begin().await?;

        let row = load_order_in_tx(&mut tx, id)
            .await?
            .with_context(|| format!("Order {} not found", id))?;
        let from = row
            .6
            .parse::<OrderStatus>()
            .map_err(|e| anyhow::anyhow!(e))?;

        validate_transition(from, to).map_err(|e| anyhow::anyhow!("{}", e))?;

        let delivered_at = if to == OrderStatus::Delivered {
            Some(now)
        } else {
            None
        };
        let cancelled_at = if to == OrderStatus::Cancelled {
            Some(now)
        } else {
            None
        };
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                status_changed_at = $3,
                delivered_at = COALESCE($4, delivered_at),
                cancelled_at = COALESCE($5, cancelled_at)
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(to.to_string())
        .bind(now)
        .bind(delivered_at)
        .bind(cancelled_at)
        .execute(&mut *tx)
        .await
        .context("Failed to update order status")?;

        insert_status_log(&mut tx, id, Some(from), to, actor, note, now).await?;

        tx.commit().await.context("Failed to commit status change")?;

        self.find(id)
            .await?
            .with_context(|| format!("Order {} disappeared after transition", id))
    }

    async fn set_vendor(&self, id: OrderId, vendor_id: VendorId) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET vendor_id = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(vendor_id.to_string())
            .execute(&self.database.pool)
            .await
            .context("Failed to reassign order vendor")?;

        anyhow::ensure!(result.rows_affected() == 1, "Order {} not found", id);
        Ok(())
    }

    async fn record_payment_state(
        &self,
        id: OrderId,
        amount_paid: Decimal,
        payment_status: PaymentStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE orders SET amount_paid = $2, payment_status = $3 WHERE id = $1")
            .bind(id.to_string())
            .bind(amount_paid.to_string())
            .bind(payment_status.to_string())
            .execute(&self.database.pool)
            .await
            .context("Failed to record payment state")?;
        Ok(())
    }

    async fn load_counts(
        &self,
        vendor_ids: &[VendorId],
    ) -> Result<HashMap<VendorId, (u32, u32)>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT vendor_id, status, COUNT(*) FROM orders
            WHERE status IN ('PENDING', 'CONFIRMED', 'ACCEPTED', 'DISPATCHED')
            GROUP BY vendor_id, status
            "#,
        )
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load vendor load counts")?;

        let mut counts: HashMap<VendorId, (u32, u32)> = HashMap::new();
        for (vendor_id, status, count) in rows {
            let Ok(vendor_id) = Uuid::parse_str(&vendor_id) else {
                continue;
            };
            let entry = counts.entry(vendor_id).or_insert((0, 0));
            if status == "PENDING" {
                entry.1 += count as u32;
            } else {
                entry.0 += count as u32;
            }
        }
        for id in vendor_ids {
            counts.entry(*id).or_insert((0, 0));
        }
        Ok(counts)
    }

    async fn vendor_share_30d(&self, product_id: ProductId) -> Result<HashMap<VendorId, f64>> {
        let cutoff = Utc::now() - Duration::days(30);
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT o.vendor_id, COUNT(DISTINCT o.id) FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            WHERE oi.product_id = $1 AND o.created_at >= $2 AND o.status != 'CANCELLED'
            GROUP BY o.vendor_id
            "#,
        )
        .bind(product_id.to_string())
        .bind(cutoff)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to compute vendor shares")?;

        let total: i64 = rows.iter().map(|(_, c)| c).sum();
        let mut shares = HashMap::new();
        if total == 0 {
            return Ok(shares);
        }
        for (vendor_id, count) in rows {
            if let Ok(vendor_id) = Uuid::parse_str(&vendor_id) {
                shares.insert(vendor_id, count as f64 / total as f64);
            }
        }
        Ok(shares)
    }

    async fn non_terminal_orders(&self) -> Result<Vec<StuckOrderRow>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE status NOT IN ('DELIVERED', 'CANCELLED')",
            ORDER_FIELDS
        ))
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list non-terminal orders")?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.load_items(&row.0.clone()).await?;
            let (order, in_status_since) = row_to_order(row, items)?;
            result.push(StuckOrderRow {
                order,
                in_status_since,
            });
        }
        Ok(result)
    }

    async fn vendor_event_counts(
        &self,
        vendor_id: VendorId,
        window_days: i64,
    ) -> Result<crate::domain::analytics::VendorEventCounts> {
        let cutoff = Utc::now() - Duration::days(window_days);

        let (assigned, accepted): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0)
            FROM vendor_assignment_retries
            WHERE vendor_id = $1 AND created_at >= $2
            "#,
        )
        .bind(vendor_id.to_string())
        .bind(cutoff)
        .fetch_one(&self.database.pool)
        .await
        .context("Failed to count vendor assignments")?;

        let (completed, cancelled, avg_hours): (i64, i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'DELIVERED' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'CANCELLED' THEN 1 ELSE 0 END), 0),
                AVG(CASE WHEN delivered_at IS NOT NULL
                    THEN (julianday(delivered_at) - julianday(created_at)) * 24.0
                    END)
            FROM orders
            WHERE vendor_id = $1 AND created_at >= $2
            "#,
        )
        .bind(vendor_id.to_string())
        .bind(cutoff)
        .fetch_one(&self.database.pool)
        .await
        .context("Failed to count vendor order events")?;

        Ok(crate::domain::analytics::VendorEventCounts {
            assigned: assigned as u64,
            accepted: accepted as u64,
            completed: completed as u64,
            cancelled: cancelled as u64,
            avg_fulfillment_hours: avg_hours.unwrap_or(0.0),
        })
    }

    async fn list_unpaid_delivered(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE status = 'DELIVERED' AND payment_status != 'PAID'",
            ORDER_FIELDS
        ))
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list unpaid delivered orders")?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.load_items(&row.0.clone()).await?;
            result.push(row_to_order(row, items)?.0);
        }
        Ok(result)
    }

    async fn list_for_retailer(&self, retailer_id: RetailerId) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE retailer_id = $1 ORDER BY created_at",
            ORDER_FIELDS
        ))
        .bind(retailer_id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list retailer orders")?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.load_items(&row.0.clone()).await?;
            result.push(row_to_order(row, items)?.0);
        }
        Ok(result)
    }

    async fn status_log(&self, id: OrderId) -> Result<Vec<OrderStatusLogEntry>> {
        type LogRow = (String, String, Option<String>, String, String, Option<String>, DateTime<Utc>);
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, from_status, to_status, actor, note, created_at
            FROM order_status_log WHERE order_id = $1 ORDER BY created_at
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load status log")?;

        rows.into_iter()
            .map(|(id, order_id, from, to, actor, note, created_at)| {
                Ok(OrderStatusLogEntry {
                    id: Uuid::parse_str(&id).context("Bad log id")?,
                    order_id: Uuid::parse_str(&order_id).context("Bad order id")?,
                    from_status: from
                        .map(|s| s.parse::<OrderStatus>().map_err(|e| anyhow::anyhow!(e)))
                        .transpose()?,
                    to_status: to.parse::<OrderStatus>().map_err(|e| anyhow::anyhow!(e))?,
                    actor,
                    note,
                    created_at,
                })
            })
            .collect()
    }
}
