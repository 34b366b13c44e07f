use crate::domain::records::RejectedOrder;
use crate::domain::repositories::RejectedOrderRepository;
use crate::domain::types::RejectionReason;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

pub struct SqliteRejectedOrderRepository {
    database: Database,
}

impl SqliteRejectedOrderRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl RejectedOrderRepository for SqliteRejectedOrderRepository {
    async fn insert(&self, rejection: &RejectedOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rejected_orders (
                id, retailer_id, reason, requested_amount, available_credit,
                shortfall, raw_input, reviewed, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(rejection.id.to_string())
        .bind(rejection.retailer_id.to_string())
        .bind(rejection.reason.to_string())
        .bind(rejection.requested_amount.to_string())
        .bind(rejection.available_credit.to_string())
        .bind(rejection.shortfall.map(|s| s.to_string()))
        .bind(&rejection.raw_input)
        .bind(rejection.reviewed)
        .bind(rejection.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert rejected order")?;

        Ok(())
    }

    async fn unreviewed(&self, limit: u32) -> Result<Vec<RejectedOrder>> {
        type Row = (
            String,
            String,
            String,
            String,
            String,
            Option<String>,
            String,
            bool,
            DateTime<Utc>,
        );
        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT id, retailer_id, reason, requested_amount, available_credit,
                   shortfall, raw_input, reviewed, created_at
            FROM rejected_orders
            WHERE reviewed = 0
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list unreviewed rejections")?;

        rows.into_iter()
            .map(
                |(id, retailer_id, reason, requested, available, shortfall, raw_input, reviewed, created_at)| {
                    Ok(RejectedOrder {
                        id: Uuid::parse_str(&id).context("Bad rejection id")?,
                        retailer_id: Uuid::parse_str(&retailer_id).context("Bad retailer id")?,
                        reason: reason
                            .parse::<RejectionReason>()
                            .map_err(|e| anyhow::anyhow!(e))?,
                        requested_amount: Decimal::from_str(&requested).unwrap_or_default(),
                        available_credit: Decimal::from_str(&available).unwrap_or_default(),
                        shortfall: shortfall.map(|s| Decimal::from_str(&s).unwrap_or_default()),
                        raw_input,
                        reviewed,
                        created_at,
                    })
                },
            )
            .collect()
    }
}
