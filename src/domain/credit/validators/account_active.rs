use async_trait::async_trait;
use tracing::debug;

use crate::domain::credit::validators::validator_trait::{
    CreditCheckResult, CreditContext, CreditValidator,
};
use crate::domain::types::RejectionReason;

/// Rejects orders from deactivated retailer accounts.
pub struct AccountActiveValidator;

#[async_trait]
impl CreditValidator for AccountActiveValidator {
    fn name(&self) -> &str {
        "AccountActiveValidator"
    }

    async fn validate(&self, ctx: &CreditContext<'_>) -> CreditCheckResult {
        if !ctx.retailer.is_active {
            debug!(
                "AccountActiveValidator: retailer {} is inactive",
                ctx.retailer.id
            );
            return CreditCheckResult::reject(RejectionReason::AccountInactive);
        }
        CreditCheckResult::Approve
    }

    fn priority(&self) -> u8 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credit::validators::test_support::context_with;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_rejects_inactive_account() {
        let mut retailer = crate::domain::credit::validators::test_support::retailer();
        retailer.is_active = false;
        let ctx = context_with(&retailer, dec!(100));
        let result = AccountActiveValidator.validate(&ctx).await;
        assert_eq!(
            result,
            CreditCheckResult::reject(RejectionReason::AccountInactive)
        );
    }

    #[tokio::test]
    async fn test_approves_active_account() {
        let retailer = crate::domain::credit::validators::test_support::retailer();
        let ctx = context_with(&retailer, dec!(100));
        assert!(AccountActiveValidator.validate(&ctx).await.is_approved());
    }
}
