pub mod idempotency;
pub mod recovery;
pub mod state;
pub mod webhook;

pub use idempotency::{request_hash, IdempotencyKey, IdempotencyStatus};
pub use recovery::{
    stuck_action, stuck_threshold, OrderRecoveryState, StuckAction, VendorAssignmentRetry,
};
pub use state::{steps_for, WorkflowState, WorkflowType};
pub use webhook::WebhookEvent;
