use crate::domain::types::{OrderStatus, RejectionReason};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the credit validation and atomic order creation path.
#[derive(Debug, Error)]
pub enum CreditError {
    #[error("Order rejected: {reason}")]
    Rejected {
        reason: RejectionReason,
        /// Exact amount by which the request exceeds available credit.
        /// Only populated for `CREDIT_LIMIT_EXCEEDED`.
        shortfall: Option<Decimal>,
        available_credit: Decimal,
    },

    #[error("Retailer not found: {retailer_id}")]
    RetailerNotFound { retailer_id: Uuid },

    #[error("Idempotency conflict for key {key}: request hash mismatch")]
    IdempotencyHashMismatch { key: String },
}

impl CreditError {
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            CreditError::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Errors raised by the vendor selection engine.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("No eligible vendor for product {product_id} (quantity {quantity})")]
    NoEligibleVendor { product_id: Uuid, quantity: Decimal },

    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: Uuid },

    #[error("Reassignment attempts exhausted for order {order_id} after {attempts} tries")]
    AttemptsExhausted { order_id: Uuid, attempts: u32 },
}

/// Errors raised by the append-only ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger entry not found: {entry_id}")]
    EntryNotFound { entry_id: Uuid },

    #[error("Entry {entry_id} is already reversed")]
    AlreadyReversed { entry_id: Uuid },

    #[error("Cannot reverse a reversal entry: {entry_id}")]
    ReversalOfReversal { entry_id: Uuid },

    #[error(
        "Running balance mismatch for retailer {retailer_id}: expected {expected}, found {found}"
    )]
    BalanceMismatch {
        retailer_id: Uuid,
        expected: Decimal,
        found: Decimal,
    },

    #[error("Payment of {amount} exceeds outstanding balance {outstanding}")]
    Overpayment { amount: Decimal, outstanding: Decimal },
}

/// Errors raised by the order state machine.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order not found: {order_id}")]
    NotFound { order_id: Uuid },

    #[error("Invalid order: {reason}")]
    Invalid { reason: String },
}

/// Errors raised by the workflow and recovery layer.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow not found: {workflow_id}")]
    NotFound { workflow_id: Uuid },

    #[error("Unknown workflow step '{step}' for type {workflow_type}")]
    UnknownStep { workflow_type: String, step: String },

    #[error("Recovery attempts exhausted for order {order_id}")]
    RecoveryExhausted { order_id: Uuid },
}

/// Errors raised by the parse pipeline's internals. The public `Parse`
/// contract never surfaces these; they are folded into a low-confidence
/// or rejected `ParseResult`.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Parse session not found: {session_id}")]
    SessionNotFound { session_id: Uuid },

    #[error("Parse session {session_id} has expired")]
    SessionExpired { session_id: Uuid },

    #[error("Extraction tier '{tier}' failed: {reason}")]
    ExtractionFailed { tier: String, reason: String },
}

/// Errors raised by the job fabric.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Broker unreachable: {reason}")]
    BrokerUnreachable { reason: String },

    #[error("Unknown queue: {name}")]
    UnknownQueue { name: String },

    #[error("Dead-letter job not found: {job_id}")]
    DeadLetterNotFound { job_id: String },

    #[error("Job payload could not be decoded: {reason}")]
    BadPayload { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_rejection_formatting() {
        let err = CreditError::Rejected {
            reason: RejectionReason::CreditLimitExceeded,
            shortfall: Some(dec!(200)),
            available_credit: dec!(300),
        };
        assert!(err.to_string().contains("CREDIT_LIMIT_EXCEEDED"));
        assert_eq!(
            err.rejection_reason(),
            Some(RejectionReason::CreditLimitExceeded)
        );
    }

    #[test]
    fn test_illegal_transition_formatting() {
        let err = OrderError::IllegalTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        let msg = err.to_string();
        assert!(msg.contains("DELIVERED"));
        assert!(msg.contains("PENDING"));
    }
}
