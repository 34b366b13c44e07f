//! Per-operation workflow state with heartbeats.
//!
//! A row is created at step 1 of every multi-step operation; each step
//! boundary updates `current_step`, `step_data` and the heartbeat. A
//! workflow left `in_progress` past the heartbeat timeout is stale and
//! resumed by the recovery worker from its last recorded step.

use crate::domain::errors::WorkflowError;
use crate::domain::types::WorkflowStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowType {
    OrderCreation,
    VendorRouting,
    PaymentSettlement,
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowType::OrderCreation => write!(f, "order_creation"),
            WorkflowType::VendorRouting => write!(f, "vendor_routing"),
            WorkflowType::PaymentSettlement => write!(f, "payment_settlement"),
        }
    }
}

impl FromStr for WorkflowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_creation" => Ok(WorkflowType::OrderCreation),
            "vendor_routing" => Ok(WorkflowType::VendorRouting),
            "payment_settlement" => Ok(WorkflowType::PaymentSettlement),
            other => Err(format!("Unknown workflow type: {}", other)),
        }
    }
}

/// Ordered step names per workflow type.
pub fn steps_for(workflow_type: WorkflowType) -> &'static [&'static str] {
    match workflow_type {
        WorkflowType::OrderCreation => &[
            "validate_credit",
            "select_vendor",
            "write_order",
            "send_confirmation",
        ],
        WorkflowType::VendorRouting => &["select_vendor", "notify_vendor", "await_response"],
        WorkflowType::PaymentSettlement => &["append_ledger", "update_order", "send_receipt"],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub workflow_type: WorkflowType,
    /// The entity this workflow drives (order id, payment id, ...).
    pub entity_ref: String,
    pub current_step: String,
    /// Opaque step payload carried across resume; shape is owned by the
    /// processor for the workflow type.
    pub step_data: serde_json::Value,
    pub status: WorkflowStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl WorkflowState {
    pub const DEFAULT_HEARTBEAT_TIMEOUT_MINUTES: i64 = 5;

    pub fn begin(workflow_type: WorkflowType, entity_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_type,
            entity_ref: entity_ref.into(),
            current_step: steps_for(workflow_type)[0].to_string(),
            step_data: serde_json::Value::Null,
            status: WorkflowStatus::InProgress,
            last_heartbeat: now,
            attempts: 0,
            created_at: now,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, heartbeat_timeout: Duration) -> bool {
        self.status == WorkflowStatus::InProgress && now - self.last_heartbeat > heartbeat_timeout
    }

    /// Validates and records a step advance, refreshing the heartbeat.
    pub fn advance_to(
        &mut self,
        step: &str,
        step_data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if !steps_for(self.workflow_type).contains(&step) {
            return Err(WorkflowError::UnknownStep {
                workflow_type: self.workflow_type.to_string(),
                step: step.to_string(),
            });
        }
        self.current_step = step.to_string();
        self.step_data = step_data;
        self.last_heartbeat = now;
        Ok(())
    }

    /// The step after the current one, if any.
    pub fn next_step(&self) -> Option<&'static str> {
        let steps = steps_for(self.workflow_type);
        steps
            .iter()
            .position(|s| *s == self.current_step)
            .and_then(|i| steps.get(i + 1))
            .copied()
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Completed;
        self.last_heartbeat = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_begin_starts_at_first_step() {
        let wf = WorkflowState::begin(WorkflowType::OrderCreation, "order-1");
        assert_eq!(wf.current_step, "validate_credit");
        assert_eq!(wf.status, WorkflowStatus::InProgress);
    }

    #[test]
    fn test_staleness_is_strictly_past_timeout() {
        let mut wf = WorkflowState::begin(WorkflowType::OrderCreation, "order-1");
        let timeout = Duration::minutes(5);
        let now = wf.last_heartbeat;
        assert!(!wf.is_stale(now + Duration::minutes(5), timeout));
        assert!(wf.is_stale(now + Duration::minutes(5) + Duration::seconds(1), timeout));

        wf.status = WorkflowStatus::Completed;
        assert!(!wf.is_stale(now + Duration::hours(1), timeout));
    }

    #[test]
    fn test_advance_refreshes_heartbeat() {
        let mut wf = WorkflowState::begin(WorkflowType::OrderCreation, "order-1");
        let later = Utc::now() + Duration::minutes(2);
        wf.advance_to("select_vendor", json!({"attempt": 1}), later)
            .unwrap();
        assert_eq!(wf.current_step, "select_vendor");
        assert_eq!(wf.last_heartbeat, later);
    }

    #[test]
    fn test_unknown_step_rejected() {
        let mut wf = WorkflowState::begin(WorkflowType::OrderCreation, "order-1");
        assert!(matches!(
            wf.advance_to("launch_rocket", serde_json::Value::Null, Utc::now()),
            Err(WorkflowError::UnknownStep { .. })
        ));
    }

    #[test]
    fn test_next_step_walks_the_list() {
        let mut wf = WorkflowState::begin(WorkflowType::OrderCreation, "order-1");
        assert_eq!(wf.next_step(), Some("select_vendor"));
        wf.advance_to("send_confirmation", serde_json::Value::Null, Utc::now())
            .unwrap();
        assert_eq!(wf.next_step(), None);
    }
}
