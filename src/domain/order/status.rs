//! The fixed order status graph.
//!
//! PENDING -> CONFIRMED -> ACCEPTED -> DISPATCHED -> DELIVERED, and any
//! non-terminal status -> CANCELLED. There is no FAILED outcome: internal
//! failures leave the order where it is and create a recovery record.

use crate::domain::errors::OrderError;
use crate::domain::types::OrderStatus;

/// Returns the statuses reachable from `from` in one transition.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
        OrderStatus::Confirmed => &[OrderStatus::Accepted, OrderStatus::Cancelled],
        OrderStatus::Accepted => &[OrderStatus::Dispatched, OrderStatus::Cancelled],
        OrderStatus::Dispatched => &[OrderStatus::Delivered, OrderStatus::Cancelled],
        OrderStatus::Delivered => &[],
        OrderStatus::Cancelled => &[],
    }
}

/// Validates a transition against the graph.
pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(OrderError::IllegalTransition { from, to })
    }
}

pub fn is_terminal(status: OrderStatus) -> bool {
    allowed_transitions(status).is_empty()
}
