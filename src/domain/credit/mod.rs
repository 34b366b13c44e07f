pub mod pipeline;
pub mod validators;

pub use pipeline::CreditPipeline;
pub use validators::{CreditCheckResult, CreditContext, CreditValidator};

/// Thresholds consulted by the validation rules.
#[derive(Debug, Clone, Copy)]
pub struct CreditPolicy {
    /// Risk score at or above which orders are blocked without an override.
    pub high_risk_threshold: u8,
    /// Days past delivery after which an unpaid invoice blocks new orders.
    pub overdue_block_days: i64,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            high_risk_threshold: 70,
            overdue_block_days: 14,
        }
    }
}
