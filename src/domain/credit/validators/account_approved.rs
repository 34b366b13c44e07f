use async_trait::async_trait;
use tracing::debug;

use crate::domain::credit::validators::validator_trait::{
    CreditCheckResult, CreditContext, CreditValidator,
};
use crate::domain::types::RejectionReason;

/// Rejects orders from accounts that have not completed approval.
pub struct AccountApprovedValidator;

#[async_trait]
impl CreditValidator for AccountApprovedValidator {
    fn name(&self) -> &str {
        "AccountApprovedValidator"
    }

    async fn validate(&self, ctx: &CreditContext<'_>) -> CreditCheckResult {
        if !ctx.retailer.is_approved {
            debug!(
                "AccountApprovedValidator: retailer {} is not approved",
                ctx.retailer.id
            );
            return CreditCheckResult::reject(RejectionReason::AccountNotApproved);
        }
        CreditCheckResult::Approve
    }

    fn priority(&self) -> u8 {
        20
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credit::validators::test_support::{context_with, retailer};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_rejects_unapproved_account() {
        let mut r = retailer();
        r.is_approved = false;
        let ctx = context_with(&r, dec!(100));
        assert_eq!(
            AccountApprovedValidator.validate(&ctx).await,
            CreditCheckResult::reject(RejectionReason::AccountNotApproved)
        );
    }
}
