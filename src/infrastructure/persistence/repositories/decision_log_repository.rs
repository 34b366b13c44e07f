use crate::domain::repositories::DecisionLogRepository;
use crate::domain::routing::SelectionDecision;
use crate::domain::types::{ProductId, VendorId};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Immutable log of selection runs; the full decision is kept as JSON so
/// the snapshot survives config schema drift.
pub struct SqliteDecisionLogRepository {
    database: Database,
}

impl SqliteDecisionLogRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl DecisionLogRepository for SqliteDecisionLogRepository {
    async fn insert(&self, decision: &SelectionDecision) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO decision_log (
                id, product_id, order_id, chosen_vendor_id, decision_json, decided_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(decision.id.to_string())
        .bind(decision.product_id.to_string())
        .bind(decision.order_id.map(|id| id.to_string()))
        .bind(decision.chosen_vendor_id.to_string())
        .bind(serde_json::to_string(decision)?)
        .bind(decision.decided_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert selection decision")?;

        Ok(())
    }

    async fn last_vendor_for_product(&self, product_id: ProductId) -> Result<Option<VendorId>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT chosen_vendor_id FROM decision_log
            WHERE product_id = $1
            ORDER BY decided_at DESC LIMIT 1
            "#,
        )
        .bind(product_id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load last decision")?;

        row.map(|(id,)| Uuid::parse_str(&id).context("Bad vendor id"))
            .transpose()
    }
}
