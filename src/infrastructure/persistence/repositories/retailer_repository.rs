use crate::domain::party::{Retailer, WorkingHours};
use crate::domain::repositories::RetailerRepository;
use crate::domain::types::RetailerId;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

pub struct SqliteRetailerRepository {
    database: Database,
}

impl SqliteRetailerRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type RetailerRow = (
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

fn row_to_retailer(row: RetailerRow) -> Result<Retailer> {
    let (
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
    ) = row;
    let working_hours: Option<WorkingHours> = match working_hours_json {
        Some(json) => serde_json::from_str(&json).ok(),
        None => None,
    };
    Ok(Retailer {
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
    })
}

const SELECT_FIELDS: &str = r#"
    id, name, phone, credit_limit, outstanding_debt, available_credit,
    risk_score, is_approved, is_active, high_risk_override,
    delivery_zone, district, working_hours_json, created_at
"#;

#[async_trait]
impl RetailerRepository for SqliteRetailerRepository {
    async fn find(&self, id: RetailerId) -> Result<Option<Retailer>> {
        let row = sqlx::query_as::<_, RetailerRow>(&format!(
            "SELECT {} FROM retailers WHERE id = $1",
            SELECT_FIELDS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load retailer")?;

        row.map(row_to_retailer).transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Retailer>> {
        let row = sqlx::query_as::<_, RetailerRow>(&format!(
            "SELECT {} FROM retailers WHERE phone = $1",
            SELECT_FIELDS
        ))
        .bind(phone)
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load retailer by phone")?;

        row.map(row_to_retailer).transpose()
    }

    async fn insert(&self, retailer: &Retailer) -> Result<()> {
        let working_hours_json = retailer
            .working_hours
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO retailers (
                id, name, phone, credit_limit, outstanding_debt, available_credit,
                risk_score, is_approved, is_active, high_risk_override,
                delivery_zone, district, working_hours_json, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(retailer.id.to_string())
        .bind(&retailer.name)
        .bind(&retailer.phone)
        .bind(retailer.credit_limit.to_string())
        .bind(retailer.outstanding_debt.to_string())
        .bind(retailer.available_credit.to_string())
        .bind(retailer.risk_score as i64)
        .bind(retailer.is_approved)
        .bind(retailer.is_active)
        .bind(retailer.high_risk_override)
        .bind(&retailer.delivery_zone)
        .bind(&retailer.district)
        .bind(working_hours_json)
        .bind(retailer.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert retailer")?;

        Ok(())
    }

    async fn set_credit_limit(&self, id: RetailerId, new_limit: Decimal) -> Result<()> {
        // Recompute available inside the transaction so the invariant
        // survives concurrent ledger appends.
        let mut tx = self.database.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT outstanding_debt FROM retailers WHERE id = $1")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to load outstanding debt")?;
        let outstanding = match row {
            Some((debt,)) => Decimal::from_str(&debt).unwrap_or_default(),
            None => anyhow::bail!("Retailer {} not found", id),
        };

        sqlx::query(
            "UPDATE retailers SET credit_limit = $2, available_credit = $3 WHERE id = $1",
        )
        .bind(id.to_string())
        .bind(new_limit.to_string())
        .bind((new_limit - outstanding).to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update credit limit")?;

        tx.commit().await.context("Failed to commit credit limit update")?;
        Ok(())
    }

    async fn set_risk_score(&self, id: RetailerId, score: u8) -> Result<()> {
        let result = sqlx::query("UPDATE retailers SET risk_score = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(score.min(100) as i64)
            .execute(&self.database.pool)
            .await
            .context("Failed to update risk score")?;

        anyhow::ensure!(result.rows_affected() == 1, "Retailer {} not found", id);
        Ok(())
    }
}
