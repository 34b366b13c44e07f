use crate::domain::parser::ParseSession;
use crate::domain::repositories::ParseSessionRepository;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Sessions are short-lived; the full session is stored as JSON with the
/// status and expiry lifted into columns for sweeping.
pub struct SqliteParseSessionRepository {
    database: Database,
}

impl SqliteParseSessionRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl ParseSessionRepository for SqliteParseSessionRepository {
    async fn insert(&self, session: &ParseSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO parse_sessions (
                id, retailer_id, source, raw_input, session_json,
                status, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.retailer_id.to_string())
        .bind(session.source.to_string())
        .bind(&session.raw_input)
        .bind(serde_json::to_string(session)?)
        .bind(session.status.to_string())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert parse session")?;

        Ok(())
    }

    async fn save(&self, session: &ParseSession) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE parse_sessions
            SET session_json = $2, status = $3
            WHERE id = $1
            "#,
        )
        .bind(session.id.to_string())
        .bind(serde_json::to_string(session)?)
        .bind(session.status.to_string())
        .execute(&self.database.pool)
        .await
        .context("Failed to save parse session")?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ParseSession>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT session_json FROM parse_sessions WHERE id = $1")
                .bind(id.to_string())
                .fetch_optional(&self.database.pool)
                .await
                .context("Failed to load parse session")?;

        row.map(|(json,)| serde_json::from_str(&json).context("Bad session JSON"))
            .transpose()
    }
}
