use crate::domain::records::{AdminNotification, AuditLogEntry, NotificationKind};
use crate::domain::repositories::{AuditLogRepository, NotificationRepository};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct SqliteAuditLogRepository {
    database: Database,
}

impl SqliteAuditLogRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl AuditLogRepository for SqliteAuditLogRepository {
    async fn insert(&self, entry: &AuditLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, actor, entity_type, entity_id, action,
                old_value, new_value, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.actor)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.action)
        .bind(serde_json::to_string(&entry.old_value)?)
        .bind(serde_json::to_string(&entry.new_value)?)
        .bind(entry.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert audit log entry")?;

        Ok(())
    }
}

pub struct SqliteNotificationRepository {
    database: Database,
}

impl SqliteNotificationRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn insert(&self, notification: &AdminNotification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_notifications (id, kind, subject, body, acknowledged, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(notification.id.to_string())
        .bind(notification.kind.to_string())
        .bind(&notification.subject)
        .bind(&notification.body)
        .bind(notification.acknowledged)
        .bind(notification.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert admin notification")?;

        Ok(())
    }

    async fn unacknowledged(&self, limit: u32) -> Result<Vec<AdminNotification>> {
        type Row = (String, String, String, String, bool, DateTime<Utc>);
        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT id, kind, subject, body, acknowledged, created_at
            FROM admin_notifications
            WHERE acknowledged = 0
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list notifications")?;

        rows.into_iter()
            .map(|(id, kind, subject, body, acknowledged, created_at)| {
                let kind = match kind.as_str() {
                    "MANUAL_INTERVENTION" => NotificationKind::ManualIntervention,
                    "PRICE_ALERT" => NotificationKind::PriceAlert,
                    "RECOVERY_FAILED" => NotificationKind::RecoveryFailed,
                    other => anyhow::bail!("Unknown notification kind: {}", other),
                };
                Ok(AdminNotification {
                    id: Uuid::parse_str(&id).context("Bad notification id")?,
                    kind,
                    subject,
                    body,
                    acknowledged,
                    created_at,
                })
            })
            .collect()
    }
}
