use crate::domain::analytics::{MarketAnalytics, PriceHistoryEvent};
use crate::domain::records::PriceAlert;
use crate::domain::repositories::PriceAnalyticsRepository;
use crate::domain::types::ProductId;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

pub struct SqlitePriceRepository {
    database: Database,
}

impl SqlitePriceRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl PriceAnalyticsRepository for SqlitePriceRepository {
    async fn insert_history(&self, event: &PriceHistoryEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (id, vendor_id, product_id, old_price, new_price, changed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.vendor_id.to_string())
        .bind(event.product_id.to_string())
        .bind(event.old_price.to_string())
        .bind(event.new_price.to_string())
        .bind(event.changed_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert price history")?;

        Ok(())
    }

    async fn history_for_product(
        &self,
        product_id: ProductId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEvent>> {
        type Row = (String, String, String, String, String, DateTime<Utc>);
        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT id, vendor_id, product_id, old_price, new_price, changed_at
            FROM price_history
            WHERE product_id = $1
            ORDER BY changed_at DESC
            LIMIT $2
            "#,
        )
        .bind(product_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load price history")?;

        let mut events: Vec<PriceHistoryEvent> = rows
            .into_iter()
            .map(|(id, vendor_id, product_id, old_price, new_price, changed_at)| {
                Ok(PriceHistoryEvent {
                    id: Uuid::parse_str(&id).context("Bad history id")?,
                    vendor_id: Uuid::parse_str(&vendor_id).context("Bad vendor id")?,
                    product_id: Uuid::parse_str(&product_id).context("Bad product id")?,
                    old_price: Decimal::from_str(&old_price).unwrap_or_default(),
                    new_price: Decimal::from_str(&new_price).unwrap_or_default(),
                    changed_at,
                })
            })
            .collect::<Result<_>>()?;
        // Oldest first for trend analysis
        events.reverse();
        Ok(events)
    }

    async fn store_market(&self, analytics: &MarketAnalytics) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_analytics (product_id, analytics_json, computed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(product_id) DO UPDATE SET
                analytics_json = excluded.analytics_json,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(analytics.product_id.to_string())
        .bind(serde_json::to_string(analytics)?)
        .bind(analytics.computed_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to store market analytics")?;

        Ok(())
    }

    async fn latest_market(&self, product_id: ProductId) -> Result<Option<MarketAnalytics>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT analytics_json FROM market_analytics WHERE product_id = $1")
                .bind(product_id.to_string())
                .fetch_optional(&self.database.pool)
                .await
                .context("Failed to load market analytics")?;

        row.map(|(json,)| serde_json::from_str(&json).context("Bad analytics JSON"))
            .transpose()
    }

    async fn insert_alert(&self, alert: &PriceAlert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_alerts (
                id, product_id, vendor_id, old_price, new_price,
                change_pct, severity, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(alert.id.to_string())
        .bind(alert.product_id.to_string())
        .bind(alert.vendor_id.to_string())
        .bind(alert.old_price.to_string())
        .bind(alert.new_price.to_string())
        .bind(alert.change_pct.to_string())
        .bind(format!("{:?}", alert.severity))
        .bind(alert.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert price alert")?;

        Ok(())
    }
}
