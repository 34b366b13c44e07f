use crate::domain::party::Retailer;
use crate::domain::types::RejectionReason;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Result of a single credit validation check.
#[derive(Debug, Clone, PartialEq)]
pub enum CreditCheckResult {
    /// Check passed, continue down the pipeline.
    Approve,
    /// Check failed; first failure wins and aborts the pipeline.
    Reject {
        reason: RejectionReason,
        /// Populated only for credit-limit failures.
        shortfall: Option<Decimal>,
    },
}

impl CreditCheckResult {
    pub fn reject(reason: RejectionReason) -> Self {
        CreditCheckResult::Reject {
            reason,
            shortfall: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, CreditCheckResult::Approve)
    }
}

/// Everything a validator may consult when deciding on a request.
///
/// Validators never reach into repositories themselves; the caller loads
/// the retailer under lock and hands over a consistent snapshot.
#[derive(Debug)]
pub struct CreditContext<'a> {
    pub retailer: &'a Retailer,
    pub requested_amount: Decimal,
    /// Oldest unpaid delivered order, if any.
    pub oldest_unpaid_due: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    /// Days past due after which new orders are blocked.
    pub overdue_block_days: i64,
    /// Risk score at or above this value blocks unless overridden.
    pub high_risk_threshold: u8,
}

/// A single ordered rule in the credit validation pipeline.
///
/// Rules execute in ascending `priority`, fixed as
/// inactive, not-approved, high-risk, credit-limit, overdue-block.
#[async_trait]
pub trait CreditValidator: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, ctx: &CreditContext<'_>) -> CreditCheckResult;

    /// Lower runs earlier.
    fn priority(&self) -> u8 {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_accessors() {
        assert!(CreditCheckResult::Approve.is_approved());
        assert!(!CreditCheckResult::reject(RejectionReason::AccountInactive).is_approved());
    }
}
