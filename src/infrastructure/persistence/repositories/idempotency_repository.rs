use crate::domain::repositories::{IdempotencyRepository, KeyClaim};
use crate::domain::workflow::idempotency::IdempotencyStatus;
use crate::domain::workflow::IdempotencyKey;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct SqliteIdempotencyRepository {
    database: Database,
}

impl SqliteIdempotencyRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type KeyRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn row_to_key(row: KeyRow) -> Result<IdempotencyKey> {
    let (key, operation_type, request_hash, response_payload, status, created_at, expires_at) = row;
    Ok(IdempotencyKey {
        key,
        operation_type,
        request_hash,
        response_payload,
        status: status
            .parse::<IdempotencyStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        created_at,
        expires_at,
    })
}

#[async_trait]
impl IdempotencyRepository for SqliteIdempotencyRepository {
    async fn claim(&self, key: &IdempotencyKey) -> Result<KeyClaim> {
        // The primary key on `key` arbitrates concurrent submissions.
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO idempotency_keys (
                key, operation_type, request_hash, response_payload,
                status, created_at, expires_at
            )
            VALUES ($1, $2, $3, NULL, $4, $5, $6)
            "#,
        )
        .bind(&key.key)
        .bind(&key.operation_type)
        .bind(&key.request_hash)
        .bind(key.status.to_string())
        .bind(key.created_at)
        .bind(key.expires_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to claim idempotency key")?;

        if inserted.rows_affected() == 1 {
            return Ok(KeyClaim::Acquired);
        }

        let existing = self
            .find(&key.key)
            .await?
            .context("Idempotency key vanished between claim and read")?;
        Ok(KeyClaim::Existing(existing))
    }

    async fn find(&self, key: &str) -> Result<Option<IdempotencyKey>> {
        let row = sqlx::query_as::<_, KeyRow>(
            r#"
            SELECT key, operation_type, request_hash, response_payload,
                   status, created_at, expires_at
            FROM idempotency_keys WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load idempotency key")?;

        row.map(row_to_key).transpose()
    }

    async fn complete(&self, key: &str, response_payload: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET response_payload = $2, status = 'completed'
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(response_payload)
        .execute(&self.database.pool)
        .await
        .context("Failed to complete idempotency key")?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.database.pool)
            .await
            .context("Failed to purge expired keys")?;

        Ok(result.rows_affected())
    }
}
