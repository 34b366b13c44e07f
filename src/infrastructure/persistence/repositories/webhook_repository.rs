use crate::domain::repositories::WebhookRepository;
use crate::domain::types::WebhookStatus;
use crate::domain::workflow::WebhookEvent;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

pub struct SqliteWebhookRepository {
    database: Database,
}

impl SqliteWebhookRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type EventRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
);

const EVENT_FIELDS: &str = r#"
    id, source, payload, headers, status, retry_count, max_retries,
    next_attempt_at, received_at, processed_at, error
"#;

fn row_to_event(row: EventRow) -> Result<WebhookEvent> {
    let (
        id,
        source,
        payload,
        headers,
        status,
        retry_count,
        max_retries,
        next_attempt_at,
        received_at,
        processed_at,
        error,
    ) = row;
    Ok(WebhookEvent {
        id: Uuid::parse_str(&id).context("Bad webhook id")?,
        source,
        payload,
        headers: serde_json::from_str(&headers).unwrap_or(serde_json::Value::Null),
        status: status
            .parse::<WebhookStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        retry_count: retry_count as u32,
        max_retries: max_retries as u32,
        next_attempt_at,
        received_at,
        processed_at,
        error,
    })
}

#[async_trait]
impl WebhookRepository for SqliteWebhookRepository {
    async fn insert(&self, event: &WebhookEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events (
                id, source, payload, headers, status, retry_count, max_retries,
                next_attempt_at, received_at, processed_at, error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.source)
        .bind(&event.payload)
        .bind(serde_json::to_string(&event.headers)?)
        .bind(event.status.to_string())
        .bind(event.retry_count as i64)
        .bind(event.max_retries as i64)
        .bind(event.next_attempt_at)
        .bind(event.received_at)
        .bind(event.processed_at)
        .bind(&event.error)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert webhook event")?;

        Ok(())
    }

    async fn save(&self, event: &WebhookEvent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = $2, retry_count = $3, next_attempt_at = $4,
                processed_at = $5, error = $6
            WHERE id = $1
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.status.to_string())
        .bind(event.retry_count as i64)
        .bind(event.next_attempt_at)
        .bind(event.processed_at)
        .bind(&event.error)
        .execute(&self.database.pool)
        .await
        .context("Failed to save webhook event")?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<WebhookEvent>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {} FROM webhook_events WHERE id = $1",
            EVENT_FIELDS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load webhook event")?;

        row.map(row_to_event).transpose()
    }

    async fn due_pending(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<WebhookEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {} FROM webhook_events
            WHERE status = 'pending' AND next_attempt_at <= $1
            ORDER BY next_attempt_at
            LIMIT $2
            "#,
            EVENT_FIELDS
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list due webhooks")?;

        rows.into_iter().map(row_to_event).collect()
    }

    async fn stuck(&self, now: DateTime<Utc>, threshold: Duration) -> Result<Vec<WebhookEvent>> {
        let cutoff = now - threshold;
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {} FROM webhook_events
            WHERE status = 'processing' AND received_at < $1
            "#,
            EVENT_FIELDS
        ))
        .bind(cutoff)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list stuck webhooks")?;

        rows.into_iter().map(row_to_event).collect()
    }

    async fn counts_by_status(&self) -> Result<HashMap<String, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM webhook_events GROUP BY status")
                .fetch_all(&self.database.pool)
                .await
                .context("Failed to count webhooks")?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status, count as u64))
            .collect())
    }
}
