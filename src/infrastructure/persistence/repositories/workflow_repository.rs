use crate::domain::repositories::WorkflowRepository;
use crate::domain::types::WorkflowStatus;
use crate::domain::workflow::{WorkflowState, WorkflowType};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub struct SqliteWorkflowRepository {
    database: Database,
}

impl SqliteWorkflowRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type WorkflowRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    i64,
    DateTime<Utc>,
);

const WORKFLOW_FIELDS: &str = r#"
    id, workflow_type, entity_ref, current_step, step_data, status,
    last_heartbeat, attempts, created_at
"#;

fn row_to_state(row: WorkflowRow) -> Result<WorkflowState> {
    let (id, workflow_type, entity_ref, current_step, step_data, status, last_heartbeat, attempts, created_at) =
        row;
    Ok(WorkflowState {
        id: Uuid::parse_str(&id).context("Bad workflow id")?,
        workflow_type: workflow_type
            .parse::<WorkflowType>()
            .map_err(|e| anyhow::anyhow!(e))?,
        entity_ref,
        current_step,
        step_data: serde_json::from_str(&step_data).unwrap_or(serde_json::Value::Null),
        status: status
            .parse::<WorkflowStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        last_heartbeat,
        attempts: attempts as u32,
        created_at,
    })
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    async fn insert(&self, state: &WorkflowState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_states (
                id, workflow_type, entity_ref, current_step, step_data,
                status, last_heartbeat, attempts, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(state.id.to_string())
        .bind(state.workflow_type.to_string())
        .bind(&state.entity_ref)
        .bind(&state.current_step)
        .bind(serde_json::to_string(&state.step_data)?)
        .bind(state.status.to_string())
        .bind(state.last_heartbeat)
        .bind(state.attempts as i64)
        .bind(state.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert workflow state")?;

        Ok(())
    }

    async fn save(&self, state: &WorkflowState) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE workflow_states
            SET current_step = $2, step_data = $3, status = $4,
                last_heartbeat = $5, attempts = $6
            WHERE id = $1
            "#,
        )
        .bind(state.id.to_string())
        .bind(&state.current_step)
        .bind(serde_json::to_string(&state.step_data)?)
        .bind(state.status.to_string())
        .bind(state.last_heartbeat)
        .bind(state.attempts as i64)
        .execute(&self.database.pool)
        .await
        .context("Failed to save workflow state")?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<WorkflowState>> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {} FROM workflow_states WHERE id = $1",
            WORKFLOW_FIELDS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load workflow state")?;

        row.map(row_to_state).transpose()
    }

    async fn find_by_entity(
        &self,
        workflow_type: WorkflowType,
        entity_ref: &str,
    ) -> Result<Option<WorkflowState>> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            r#"
            SELECT {} FROM workflow_states
            WHERE workflow_type = $1 AND entity_ref = $2
            ORDER BY created_at DESC LIMIT 1
            "#,
            WORKFLOW_FIELDS
        ))
        .bind(workflow_type.to_string())
        .bind(entity_ref)
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load workflow by entity")?;

        row.map(row_to_state).transpose()
    }

    async fn stale(
        &self,
        now: DateTime<Utc>,
        heartbeat_timeout: Duration,
    ) -> Result<Vec<WorkflowState>> {
        let cutoff = now - heartbeat_timeout;
        let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
            r#"
            SELECT {} FROM workflow_states
            WHERE status = 'in_progress' AND last_heartbeat < $1
            "#,
            WORKFLOW_FIELDS
        ))
        .bind(cutoff)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list stale workflows")?;

        rows.into_iter().map(row_to_state).collect()
    }
}
