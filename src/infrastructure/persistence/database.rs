use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared database handle.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .await
                        .context("Failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// In-memory database for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS retailers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT NOT NULL UNIQUE,
                credit_limit TEXT NOT NULL,
                outstanding_debt TEXT NOT NULL,
                available_credit TEXT NOT NULL,
                risk_score INTEGER NOT NULL DEFAULT 0,
                is_approved BOOLEAN NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                high_risk_override BOOLEAN NOT NULL DEFAULT 0,
                delivery_zone TEXT,
                district TEXT,
                working_hours_json TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create retailers table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vendors (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                is_approved BOOLEAN NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                reliability_score TEXT NOT NULL,
                work_start TEXT NOT NULL,
                work_end TEXT NOT NULL,
                utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
                max_active_orders INTEGER NOT NULL,
                max_pending_orders INTEGER NOT NULL,
                delivery_zones TEXT NOT NULL DEFAULT '[]',
                district TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create vendors table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                sku TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                unit TEXT NOT NULL,
                aliases TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create products table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vendor_products (
                vendor_id TEXT NOT NULL,
                product_id TEXT NOT NULL,
                price TEXT NOT NULL,
                stock TEXT NOT NULL,
                is_available BOOLEAN NOT NULL DEFAULT 1,
                min_order_qty TEXT NOT NULL,
                max_order_qty TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (vendor_id, product_id)
            );
            CREATE INDEX IF NOT EXISTS idx_vendor_products_product
            ON vendor_products (product_id, is_available);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create vendor_products table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                order_number TEXT NOT NULL UNIQUE,
                retailer_id TEXT NOT NULL,
                vendor_id TEXT NOT NULL,
                total TEXT NOT NULL,
                credit_used TEXT NOT NULL,
                status TEXT NOT NULL,
                payment_status TEXT NOT NULL DEFAULT 'UNPAID',
                amount_paid TEXT NOT NULL DEFAULT '0',
                status_changed_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                delivered_at TEXT,
                cancelled_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_orders_vendor_status
            ON orders (vendor_id, status);
            CREATE INDEX IF NOT EXISTS idx_orders_retailer
            ON orders (retailer_id, created_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create orders table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT NOT NULL,
                product_id TEXT NOT NULL,
                product_name TEXT NOT NULL,
                sku TEXT NOT NULL,
                quantity TEXT NOT NULL,
                unit TEXT NOT NULL,
                unit_price TEXT NOT NULL,
                tax_rate TEXT NOT NULL,
                line_total TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items (order_id);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create order_items table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_status_log (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                from_status TEXT,
                to_status TEXT NOT NULL,
                actor TEXT NOT NULL,
                note TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_status_log_order
            ON order_status_log (order_id, created_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create order_status_log table")?;

        // Append-only by contract: rows are never updated except to flag
        // is_reversed, and never deleted.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credit_ledger (
                id TEXT PRIMARY KEY,
                retailer_id TEXT NOT NULL,
                vendor_id TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                amount TEXT NOT NULL,
                previous_balance TEXT NOT NULL,
                running_balance TEXT NOT NULL,
                linked_order_id TEXT,
                is_reversed BOOLEAN NOT NULL DEFAULT 0,
                reversal_of_entry_id TEXT,
                note TEXT,
                created_at TEXT NOT NULL,
                seq INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ledger_pair
            ON credit_ledger (retailer_id, vendor_id, seq);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create credit_ledger table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS webhook_events (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                payload TEXT NOT NULL,
                headers TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'pending',
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 3,
                next_attempt_at TEXT NOT NULL,
                received_at TEXT NOT NULL,
                processed_at TEXT,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_webhooks_status
            ON webhook_events (status, next_attempt_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create webhook_events table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_states (
                id TEXT PRIMARY KEY,
                workflow_type TEXT NOT NULL,
                entity_ref TEXT NOT NULL,
                current_step TEXT NOT NULL,
                step_data TEXT NOT NULL DEFAULT 'null',
                status TEXT NOT NULL DEFAULT 'in_progress',
                last_heartbeat TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_workflows_status
            ON workflow_states (status, last_heartbeat);
            CREATE INDEX IF NOT EXISTS idx_workflows_entity
            ON workflow_states (workflow_type, entity_ref);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create workflow_states table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS idempotency_keys (
                key TEXT PRIMARY KEY,
                operation_type TEXT NOT NULL,
                request_hash TEXT NOT NULL,
                response_payload TEXT,
                status TEXT NOT NULL DEFAULT 'processing',
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create idempotency_keys table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vendor_assignment_retries (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                vendor_id TEXT NOT NULL,
                attempt_number INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                response_deadline TEXT NOT NULL,
                next_retry_at TEXT,
                failure_reason TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_assignment_retries_order
            ON vendor_assignment_retries (order_id, attempt_number);
            CREATE INDEX IF NOT EXISTS idx_assignment_retries_deadline
            ON vendor_assignment_retries (status, response_deadline);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create vendor_assignment_retries table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_recovery_states (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL UNIQUE,
                original_status TEXT NOT NULL,
                recovery_status TEXT NOT NULL DEFAULT 'pending',
                failure_point TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_recovery_status
            ON order_recovery_states (recovery_status, updated_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create order_recovery_states table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decision_log (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                order_id TEXT,
                chosen_vendor_id TEXT NOT NULL,
                decision_json TEXT NOT NULL,
                decided_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decision_log_product
            ON decision_log (product_id, decided_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create decision_log table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rejected_orders (
                id TEXT PRIMARY KEY,
                retailer_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                requested_amount TEXT NOT NULL,
                available_credit TEXT NOT NULL,
                shortfall TEXT,
                raw_input TEXT NOT NULL,
                reviewed BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create rejected_orders table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS parse_sessions (
                id TEXT PRIMARY KEY,
                retailer_id TEXT NOT NULL,
                source TEXT NOT NULL,
                raw_input TEXT NOT NULL,
                session_json TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create parse_sessions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id TEXT PRIMARY KEY,
                vendor_id TEXT NOT NULL,
                product_id TEXT NOT NULL,
                old_price TEXT NOT NULL,
                new_price TEXT NOT NULL,
                changed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_price_history_product
            ON price_history (product_id, changed_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create price_history table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_analytics (
                product_id TEXT PRIMARY KEY,
                analytics_json TEXT NOT NULL,
                computed_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create market_analytics table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_alerts (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                vendor_id TEXT NOT NULL,
                old_price TEXT NOT NULL,
                new_price TEXT NOT NULL,
                change_pct TEXT NOT NULL,
                severity TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create price_alerts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS uploaded_orders (
                id TEXT PRIMARY KEY,
                retailer_id TEXT NOT NULL,
                object_key TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                parse_session_id TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create uploaded_orders table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                actor TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                action TEXT NOT NULL,
                old_value TEXT NOT NULL,
                new_value TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create audit_log table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admin_notifications (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                acknowledged BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create admin_notifications table")?;

        // Daily order-number sequence
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_sequences (
                day TEXT PRIMARY KEY,
                last_value INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create order_sequences table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
