//! Recovery records and the stuck-order policy.

use crate::domain::types::{AssignmentStatus, OrderId, OrderStatus, RecoveryStatus, VendorId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One vendor assignment attempt, with the deadline by which the vendor
/// must accept. An elapsed deadline schedules a retry that re-runs
/// selection with this vendor excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorAssignmentRetry {
    pub id: Uuid,
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub attempt_number: u32,
    pub status: AssignmentStatus,
    pub response_deadline: DateTime<Utc>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VendorAssignmentRetry {
    pub const MAX_ATTEMPTS: u32 = 5;

    pub fn assign(
        order_id: OrderId,
        vendor_id: VendorId,
        attempt_number: u32,
        response_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            vendor_id,
            attempt_number,
            status: AssignmentStatus::Pending,
            response_deadline,
            next_retry_at: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// The deadline has elapsed without an accept.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            AssignmentStatus::Pending | AssignmentStatus::InProgress
        ) && now >= self.response_deadline
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_number >= Self::MAX_ATTEMPTS
    }
}

/// Created instead of ever marking an order FAILED: records where
/// processing stopped so the recovery worker can re-drive the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecoveryState {
    pub id: Uuid,
    pub order_id: OrderId,
    pub original_status: OrderStatus,
    pub recovery_status: RecoveryStatus,
    pub failure_point: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecoveryState {
    pub const MAX_ATTEMPTS: u32 = 5;

    pub fn capture(
        order_id: OrderId,
        original_status: OrderStatus,
        failure_point: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            original_status,
            recovery_status: RecoveryStatus::Pending,
            failure_point: failure_point.into(),
            attempts: 0,
            last_error: Some(error.into()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= Self::MAX_ATTEMPTS
    }
}

/// What the self-healing sweep does with a stuck order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StuckAction {
    ReassignVendor,
    RetryWorkflow,
}

/// Per-status stuck thresholds. An order is stuck when it has sat in a
/// status strictly longer than the threshold.
pub fn stuck_threshold(status: OrderStatus) -> Option<Duration> {
    match status {
        OrderStatus::Pending => Some(Duration::minutes(30)),
        OrderStatus::Confirmed => Some(Duration::minutes(60)),
        OrderStatus::Accepted => Some(Duration::minutes(120)),
        OrderStatus::Dispatched => Some(Duration::minutes(180)),
        OrderStatus::Delivered | OrderStatus::Cancelled => None,
    }
}

/// Action for an order that has been in `status` for `stuck_for`.
pub fn stuck_action(status: OrderStatus, stuck_for: Duration) -> Option<StuckAction> {
    let threshold = stuck_threshold(status)?;
    if stuck_for <= threshold {
        return None;
    }
    match status {
        OrderStatus::Pending | OrderStatus::Accepted => Some(StuckAction::ReassignVendor),
        OrderStatus::Confirmed | OrderStatus::Dispatched => Some(StuckAction::RetryWorkflow),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_fire_strictly_past() {
        let t = Duration::minutes(30);
        assert_eq!(stuck_action(OrderStatus::Pending, t), None);
        assert_eq!(
            stuck_action(OrderStatus::Pending, t + Duration::seconds(1)),
            Some(StuckAction::ReassignVendor)
        );
    }

    #[test]
    fn test_actions_per_status() {
        let long = Duration::hours(10);
        assert_eq!(
            stuck_action(OrderStatus::Pending, long),
            Some(StuckAction::ReassignVendor)
        );
        assert_eq!(
            stuck_action(OrderStatus::Confirmed, long),
            Some(StuckAction::RetryWorkflow)
        );
        assert_eq!(
            stuck_action(OrderStatus::Accepted, long),
            Some(StuckAction::ReassignVendor)
        );
        assert_eq!(
            stuck_action(OrderStatus::Dispatched, long),
            Some(StuckAction::RetryWorkflow)
        );
        assert_eq!(stuck_action(OrderStatus::Delivered, long), None);
        assert_eq!(stuck_action(OrderStatus::Cancelled, long), None);
    }

    #[test]
    fn test_assignment_deadline_expiry() {
        let deadline = Utc::now() + Duration::hours(2);
        let retry = VendorAssignmentRetry::assign(Uuid::new_v4(), Uuid::new_v4(), 1, deadline);
        assert!(!retry.is_expired(deadline - Duration::seconds(1)));
        assert!(retry.is_expired(deadline));
        assert!(!retry.attempts_exhausted());
    }

    #[test]
    fn test_accepted_assignment_never_expires() {
        let deadline = Utc::now();
        let mut retry = VendorAssignmentRetry::assign(Uuid::new_v4(), Uuid::new_v4(), 1, deadline);
        retry.status = AssignmentStatus::Success;
        assert!(!retry.is_expired(deadline + Duration::hours(5)));
    }

    #[test]
    fn test_recovery_attempts_cap() {
        let mut rec = OrderRecoveryState::capture(
            Uuid::new_v4(),
            OrderStatus::Pending,
            "send_confirmation",
            "broker unreachable",
        );
        assert!(!rec.attempts_exhausted());
        rec.attempts = OrderRecoveryState::MAX_ATTEMPTS;
        assert!(rec.attempts_exhausted());
    }
}
