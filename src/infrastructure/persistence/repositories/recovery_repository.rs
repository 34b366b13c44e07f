//! Persistence for vendor assignment retries and order recovery states.

use crate::domain::repositories::{AssignmentRepository, RecoveryRepository};
use crate::domain::types::{AssignmentStatus, OrderId, OrderStatus, RecoveryStatus, VendorId};
use crate::domain::workflow::{OrderRecoveryState, VendorAssignmentRetry};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct SqliteAssignmentRepository {
    database: Database,
}

impl SqliteAssignmentRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type RetryRow = (
    String,
    String,
    String,
    i64,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
    DateTime<Utc>,
);

const RETRY_FIELDS: &str = r#"
    id, order_id, vendor_id, attempt_number, status, response_deadline,
    next_retry_at, failure_reason, created_at
"#;

fn row_to_retry(row: RetryRow) -> Result<VendorAssignmentRetry> {
    let (id, order_id, vendor_id, attempt_number, status, response_deadline, next_retry_at, failure_reason, created_at) =
        row;
    Ok(VendorAssignmentRetry {
        id: Uuid::parse_str(&id).context("Bad retry id")?,
        order_id: Uuid::parse_str(&order_id).context("Bad order id")?,
        vendor_id: Uuid::parse_str(&vendor_id).context("Bad vendor id")?,
        attempt_number: attempt_number as u32,
        status: status
            .parse::<AssignmentStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        response_deadline,
        next_retry_at,
        failure_reason,
        created_at,
    })
}

#[async_trait]
impl AssignmentRepository for SqliteAssignmentRepository {
    async fn insert(&self, retry: &VendorAssignmentRetry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vendor_assignment_retries (
                id, order_id, vendor_id, attempt_number, status,
                response_deadline, next_retry_at, failure_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(retry.id.to_string())
        .bind(retry.order_id.to_string())
        .bind(retry.vendor_id.to_string())
        .bind(retry.attempt_number as i64)
        .bind(retry.status.to_string())
        .bind(retry.response_deadline)
        .bind(retry.next_retry_at)
        .bind(&retry.failure_reason)
        .bind(retry.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert assignment retry")?;

        Ok(())
    }

    async fn save(&self, retry: &VendorAssignmentRetry) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE vendor_assignment_retries
            SET status = $2, next_retry_at = $3, failure_reason = $4
            WHERE id = $1
            "#,
        )
        .bind(retry.id.to_string())
        .bind(retry.status.to_string())
        .bind(retry.next_retry_at)
        .bind(&retry.failure_reason)
        .execute(&self.database.pool)
        .await
        .context("Failed to save assignment retry")?;

        Ok(())
    }

    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<VendorAssignmentRetry>> {
        let rows = sqlx::query_as::<_, RetryRow>(&format!(
            r#"
            SELECT {} FROM vendor_assignment_retries
            WHERE status IN ('pending', 'in_progress') AND response_deadline <= $1
            "#,
            RETRY_FIELDS
        ))
        .bind(now)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list expired assignments")?;

        rows.into_iter().map(row_to_retry).collect()
    }

    async fn latest_for_order(&self, order_id: OrderId) -> Result<Option<VendorAssignmentRetry>> {
        let row = sqlx::query_as::<_, RetryRow>(&format!(
            r#"
            SELECT {} FROM vendor_assignment_retries
            WHERE order_id = $1
            ORDER BY attempt_number DESC LIMIT 1
            "#,
            RETRY_FIELDS
        ))
        .bind(order_id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load latest assignment")?;

        row.map(row_to_retry).transpose()
    }

    async fn vendors_tried(&self, order_id: OrderId) -> Result<Vec<VendorId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT vendor_id FROM vendor_assignment_retries
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list tried vendors")?;

        rows.into_iter()
            .map(|(id,)| Uuid::parse_str(&id).context("Bad vendor id"))
            .collect()
    }
}

pub struct SqliteRecoveryRepository {
    database: Database,
}

impl SqliteRecoveryRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type RecoveryRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const RECOVERY_FIELDS: &str = r#"
    id, order_id, original_status, recovery_status, failure_point,
    attempts, last_error, created_at, updated_at
"#;

fn row_to_recovery(row: RecoveryRow) -> Result<OrderRecoveryState> {
    let (id, order_id, original_status, recovery_status, failure_point, attempts, last_error, created_at, updated_at) =
        row;
    Ok(OrderRecoveryState {
        id: Uuid::parse_str(&id).context("Bad recovery id")?,
        order_id: Uuid::parse_str(&order_id).context("Bad order id")?,
        original_status: original_status
            .parse::<OrderStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        recovery_status: recovery_status
            .parse::<RecoveryStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        failure_point,
        attempts: attempts as u32,
        last_error,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl RecoveryRepository for SqliteRecoveryRepository {
    async fn capture(&self, state: &OrderRecoveryState) -> Result<()> {
        // Unique on order_id: a second failure refreshes the failure point
        // but keeps the attempt count.
        sqlx::query(
            r#"
            INSERT INTO order_recovery_states (
                id, order_id, original_status, recovery_status, failure_point,
                attempts, last_error, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT(order_id) DO UPDATE SET
                failure_point = excluded.failure_point,
                last_error = excluded.last_error,
                recovery_status = CASE
                    WHEN order_recovery_states.recovery_status = 'failed' THEN 'failed'
                    ELSE 'pending'
                END,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(state.id.to_string())
        .bind(state.order_id.to_string())
        .bind(state.original_status.to_string())
        .bind(state.recovery_status.to_string())
        .bind(&state.failure_point)
        .bind(state.attempts as i64)
        .bind(&state.last_error)
        .bind(state.created_at)
        .bind(state.updated_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to capture recovery state")?;

        Ok(())
    }

    async fn save(&self, state: &OrderRecoveryState) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE order_recovery_states
            SET recovery_status = $2, failure_point = $3, attempts = $4,
                last_error = $5, updated_at = $6
            WHERE order_id = $1
            "#,
        )
        .bind(state.order_id.to_string())
        .bind(state.recovery_status.to_string())
        .bind(&state.failure_point)
        .bind(state.attempts as i64)
        .bind(&state.last_error)
        .bind(Utc::now())
        .execute(&self.database.pool)
        .await
        .context("Failed to save recovery state")?;

        Ok(())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<OrderRecoveryState>> {
        let row = sqlx::query_as::<_, RecoveryRow>(&format!(
            "SELECT {} FROM order_recovery_states WHERE order_id = $1",
            RECOVERY_FIELDS
        ))
        .bind(order_id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load recovery state")?;

        row.map(row_to_recovery).transpose()
    }

    async fn pending(&self, limit: u32) -> Result<Vec<OrderRecoveryState>> {
        let rows = sqlx::query_as::<_, RecoveryRow>(&format!(
            r#"
            SELECT {} FROM order_recovery_states
            WHERE recovery_status IN ('pending', 'in_progress')
            ORDER BY updated_at
            LIMIT $1
            "#,
            RECOVERY_FIELDS
        ))
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list pending recoveries")?;

        rows.into_iter().map(row_to_recovery).collect()
    }
}
