//! The atomic order write path.
//!
//! Everything between re-reading the retailer and the final status log
//! entry happens in one transaction: a failure at any step rolls the whole
//! order back and the order id never escapes. SQLite's single-writer lock
//! stands in for row-level `FOR UPDATE`; the retailer row is re-read inside
//! the transaction so the credit check sees the committed balance.

use crate::domain::credit::{CreditCheckResult, CreditContext, CreditPipeline, CreditPolicy};
use crate::domain::ledger::CreditLedgerEntry;
use crate::domain::order::{format_order_number, NewOrder, Order};
use crate::domain::party::{Retailer, WorkingHours};
use crate::domain::repositories::{AtomicOrderWriter, CreateOrderResult, CreditRejection};
use crate::domain::types::{OrderStatus, PaymentStatus, TransactionType};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

pub struct SqliteOrderWriter {
    database: Database,
    pipeline: CreditPipeline,
    policy: CreditPolicy,
}

impl SqliteOrderWriter {
    pub fn new(database: Database, policy: CreditPolicy) -> Self {
        Self {
            database,
            pipeline: CreditPipeline::standard(),
            policy,
        }
    }

    async fn load_retailer_for_update(
        tx: &mut Transaction<'_, Sqlite>,
        retailer_id: Uuid,
    ) -> Result<Option<Retailer>> {
        type Row = (
            String,
            String,
            String,
            String,
            String,
            String,
            i64,
            bool,
            bool,
            bool,
            Option<String>,
            Option<String>,
            Option<String>,
            DateTime<Utc>,
        );
        let row: Option<Row> = sqlx::query_as(
            r#"
            SELECT id, name, phone, credit_limit, outstanding_debt, available_credit,
                   risk_score, is_approved, is_active, high_risk_override,
                   delivery_zone, district, working_hours_json, created_at
            FROM retailers WHERE id = $1
            "#,
        )
        .bind(retailer_id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to re-read retailer")?;

        let Some((
            id,
            name,
            phone,
            credit_limit,
            outstanding_debt,
            available_credit,
            risk_score,
            is_approved,
            is_active,
            high_risk_override,
            delivery_zone,
            district,
            working_hours_json,
            created_at,
        )) = row
        else {
            return Ok(None);
        };

        let working_hours: Option<WorkingHours> =
            working_hours_json.and_then(|json| serde_json::from_str(&json).ok());
        Ok(Some(Retailer {
            id: Uuid::parse_str(&id).context("Bad retailer id")?,
            name,
            phone,
            credit_limit: Decimal::from_str(&credit_limit).unwrap_or_default(),
            outstanding_debt: Decimal::from_str(&outstanding_debt).unwrap_or_default(),
            available_credit: Decimal::from_str(&available_credit).unwrap_or_default(),
            risk_score: risk_score.clamp(0, 100) as u8,
            is_approved,
            is_active,
            high_risk_override,
            delivery_zone,
            district,
            working_hours,
            created_at,
        }))
    }

    async fn oldest_unpaid_due(
        tx: &mut Transaction<'_, Sqlite>,
        retailer_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            r#"
            SELECT MIN(delivered_at) FROM orders
            WHERE retailer_id = $1 AND status = 'DELIVERED' AND payment_status != 'PAID'
            "#,
        )
        .bind(retailer_id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to check unpaid invoices")?;

        Ok(row.and_then(|(due,)| due))
    }

    async fn next_order_number(
        tx: &mut Transaction<'_, Sqlite>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let day = now.format("%Y%m%d").to_string();
        let (seq,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO order_sequences (day, last_value) VALUES ($1, 1)
            ON CONFLICT(day) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(&day)
        .fetch_one(&mut **tx)
        .await
        .context("Failed to advance order sequence")?;

        Ok(format_order_number(now, seq as u64))
    }

    /// Latest (running_balance, seq) for the (retailer, vendor) chain.
    async fn pair_balance(
        tx: &mut Transaction<'_, Sqlite>,
        retailer_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<(Decimal, i64)> {
        let row: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT running_balance, seq FROM credit_ledger
            WHERE retailer_id = $1 AND vendor_id = $2
            ORDER BY seq DESC LIMIT 1
            "#,
        )
        .bind(retailer_id.to_string())
        .bind(vendor_id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to read pair balance")?;

        Ok(row
            .map(|(balance, seq)| (Decimal::from_str(&balance).unwrap_or_default(), seq))
            .unwrap_or((Decimal::ZERO, 0)))
    }
}

pub(crate) async fn insert_ledger_entry(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &CreditLedgerEntry,
    seq: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO credit_ledger (
            id, retailer_id, vendor_id, transaction_type, amount,
            previous_balance, running_balance, linked_order_id,
            is_reversed, reversal_of_entry_id, note, created_at, seq
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.retailer_id.to_string())
    .bind(entry.vendor_id.to_string())
    .bind(entry.transaction_type.to_string())
    .bind(entry.amount.to_string())
    .bind(entry.previous_balance.to_string())
    .bind(entry.running_balance.to_string())
    .bind(entry.linked_order_id.map(|id| id.to_string()))
    .bind(entry.is_reversed)
    .bind(entry.reversal_of_entry_id.map(|id| id.to_string()))
    .bind(&entry.note)
    .bind(entry.created_at)
    .bind(seq)
    .execute(&mut **tx)
    .await
    .context("Failed to insert ledger entry")?;
    Ok(())
}

pub(crate) async fn update_retailer_balances(
    tx: &mut Transaction<'_, Sqlite>,
    retailer_id: Uuid,
    outstanding_debt: Decimal,
    available_credit: Decimal,
) -> Result<()> {
    sqlx::query(
        "UPDATE retailers SET outstanding_debt = $2, available_credit = $3 WHERE id = $1",
    )
    .bind(retailer_id.to_string())
    .bind(outstanding_debt.to_string())
    .bind(available_credit.to_string())
    .execute(&mut **tx)
    .await
    .context("Failed to update retailer balances")?;
    Ok(())
}

pub(crate) async fn insert_status_log(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: Uuid,
    from: Option<OrderStatus>,
    to: OrderStatus,
    actor: &str,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_status_log (id, order_id, from_status, to_status, actor, note, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(order_id.to_string())
    .bind(from.map(|s| s.to_string()))
    .bind(to.to_string())
    .bind(actor)
    .bind(note)
    .bind(now)
    .execute(&mut **tx)
    .await
    .context("Failed to insert status log entry")?;
    Ok(())
}

#[async_trait]
impl AtomicOrderWriter for SqliteOrderWriter {
    async fn create_order(&self, new_order: &NewOrder) -> Result<CreateOrderResult> {
        new_order
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid order: {}", e))?;

        let now = Utc::now();
        let mut tx = self
            .database
            .pool
            .begin()
            .await
            .context("Failed to begin order transaction")?;

        // 1. Re-read the retailer inside the transaction
        let Some(retailer) =
            Self::load_retailer_for_update(&mut tx, new_order.retailer_id).await?
        else {
            anyhow::bail!("Retailer {} not found", new_order.retailer_id);
        };

        // 2. Recompute and validate credit against the committed balance
        let oldest_unpaid = Self::oldest_unpaid_due(&mut tx, retailer.id).await?;
        let ctx = CreditContext {
            retailer: &retailer,
            requested_amount: new_order.total,
            oldest_unpaid_due: oldest_unpaid,
            now,
            overdue_block_days: self.policy.overdue_block_days,
            high_risk_threshold: self.policy.high_risk_threshold,
        };
        if let CreditCheckResult::Reject { reason, shortfall } = self.pipeline.evaluate(&ctx).await
        {
            // Dropping the transaction rolls everything back
            warn!(
                retailer_id = %retailer.id,
                %reason,
                "Order rejected by credit validation"
            );
            return Ok(CreateOrderResult::Rejected(CreditRejection {
                reason,
                shortfall,
                available_credit: retailer.available_credit,
            }));
        }

        // 3. Insert the order and its item snapshots
        let order_id = Uuid::new_v4();
        let order_number = Self::next_order_number(&mut tx, now).await?;
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, retailer_id, vendor_id, total, credit_used,
                status, payment_status, amount_paid, status_changed_at,
                created_at, delivered_at, cancelled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, '0', $9, $9, NULL, NULL)
            "#,
        )
        .bind(order_id.to_string())
        .bind(&order_number)
        .bind(new_order.retailer_id.to_string())
        .bind(new_order.vendor_id.to_string())
        .bind(new_order.total.to_string())
        .bind(new_order.total.to_string())
        .bind(OrderStatus::Pending.to_string())
        .bind(PaymentStatus::Unpaid.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to insert order")?;

        for item in &new_order.line_items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, product_name, sku, quantity, unit,
                    unit_price, tax_rate, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(order_id.to_string())
            .bind(item.product_id.to_string())
            .bind(&item.product_name)
            .bind(&item.sku)
            .bind(item.quantity.to_string())
            .bind(&item.unit)
            .bind(item.unit_price.to_string())
            .bind(item.tax_rate.to_string())
            .bind(item.line_total.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to insert order item")?;
        }

        // 4. Append the ledger entry on the (retailer, vendor) chain
        let (pair_balance, last_seq) =
            Self::pair_balance(&mut tx, retailer.id, new_order.vendor_id).await?;
        let entry = CreditLedgerEntry::next(
            retailer.id,
            new_order.vendor_id,
            TransactionType::OrderCredit,
            new_order.total,
            pair_balance,
            Some(order_id),
            None,
        );
        insert_ledger_entry(&mut tx, &entry, last_seq + 1).await?;

        // 5. Update retailer debt and available credit
        update_retailer_balances(
            &mut tx,
            retailer.id,
            retailer.outstanding_debt + new_order.total,
            retailer.available_credit - new_order.total,
        )
        .await?;

        // 6. Initial status log entry
        insert_status_log(
            &mut tx,
            order_id,
            None,
            OrderStatus::Pending,
            "system",
            Some("order created"),
            now,
        )
        .await?;

        tx.commit().await.context("Failed to commit order")?;

        info!(
            order_id = %order_id,
            order_number = %order_number,
            total = %new_order.total,
            "Order created"
        );

        Ok(CreateOrderResult::Created {
            order: Order {
                id: order_id,
                order_number,
                retailer_id: new_order.retailer_id,
                vendor_id: new_order.vendor_id,
                line_items: new_order.line_items.clone(),
                total: new_order.total,
                credit_used: new_order.total,
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Unpaid,
                amount_paid: Decimal::ZERO,
                created_at: now,
                delivered_at: None,
                cancelled_at: None,
            },
            ledger_entry: entry,
        })
    }
}
