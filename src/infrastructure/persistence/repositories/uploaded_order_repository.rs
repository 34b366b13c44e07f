use crate::domain::records::{UploadStatus, UploadedOrder};
use crate::domain::repositories::UploadedOrderRepository;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct SqliteUploadedOrderRepository {
    database: Database,
}

impl SqliteUploadedOrderRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl UploadedOrderRepository for SqliteUploadedOrderRepository {
    async fn insert(&self, upload: &UploadedOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO uploaded_orders (
                id, retailer_id, object_key, status, parse_session_id,
                error, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(upload.id.to_string())
        .bind(upload.retailer_id.to_string())
        .bind(&upload.object_key)
        .bind(upload.status.to_string())
        .bind(upload.parse_session_id.map(|id| id.to_string()))
        .bind(&upload.error)
        .bind(upload.created_at)
        .bind(upload.updated_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert uploaded order")?;

        Ok(())
    }

    async fn save(&self, upload: &UploadedOrder) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE uploaded_orders
            SET status = $2, parse_session_id = $3, error = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(upload.id.to_string())
        .bind(upload.status.to_string())
        .bind(upload.parse_session_id.map(|id| id.to_string()))
        .bind(&upload.error)
        .bind(Utc::now())
        .execute(&self.database.pool)
        .await
        .context("Failed to save uploaded order")?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<UploadedOrder>> {
        type Row = (
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            DateTime<Utc>,
            DateTime<Utc>,
        );
        let row: Option<Row> = sqlx::query_as(
            r#"
            SELECT id, retailer_id, object_key, status, parse_session_id,
                   error, created_at, updated_at
            FROM uploaded_orders WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load uploaded order")?;

        row.map(
            |(id, retailer_id, object_key, status, parse_session_id, error, created_at, updated_at)| {
                Ok(UploadedOrder {
                    id: Uuid::parse_str(&id).context("Bad upload id")?,
                    retailer_id: Uuid::parse_str(&retailer_id).context("Bad retailer id")?,
                    object_key,
                    status: status
                        .parse::<UploadStatus>()
                        .map_err(|e| anyhow::anyhow!(e))?,
                    parse_session_id: parse_session_id
                        .map(|id| Uuid::parse_str(&id).context("Bad session id"))
                        .transpose()?,
                    error,
                    created_at,
                    updated_at,
                })
            },
        )
        .transpose()
    }
}
