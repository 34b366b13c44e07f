use async_trait::async_trait;
use tracing::debug;

use crate::domain::credit::validators::validator_trait::{
    CreditCheckResult, CreditContext, CreditValidator,
};
use crate::domain::types::RejectionReason;

/// Rejects requests exceeding available credit, reporting the exact
/// shortfall. Credit equal to the requested amount passes.
pub struct CreditLimitValidator;

#[async_trait]
impl CreditValidator for CreditLimitValidator {
    fn name(&self) -> &str {
        "CreditLimitValidator"
    }

    async fn validate(&self, ctx: &CreditContext<'_>) -> CreditCheckResult {
        if ctx.requested_amount > ctx.retailer.available_credit {
            let shortfall = ctx.requested_amount - ctx.retailer.available_credit;
            debug!(
                "CreditLimitValidator: retailer {} requested {} > available {} (shortfall {})",
                ctx.retailer.id, ctx.requested_amount, ctx.retailer.available_credit, shortfall
            );
            return CreditCheckResult::Reject {
                reason: RejectionReason::CreditLimitExceeded,
                shortfall: Some(shortfall),
            };
        }
        CreditCheckResult::Approve
    }

    fn priority(&self) -> u8 {
        40
    }
}
