use async_trait::async_trait;
use tracing::debug;

use crate::domain::credit::validators::validator_trait::{
    CreditCheckResult, CreditContext, CreditValidator,
};
use crate::domain::types::RejectionReason;

/// Blocks accounts whose risk score is at or above the high-risk threshold,
/// unless an admin override is set on the account.
pub struct RiskScoreValidator;

#[async_trait]
impl CreditValidator for RiskScoreValidator {
    fn name(&self) -> &str {
        "RiskScoreValidator"
    }

    async fn validate(&self, ctx: &CreditContext<'_>) -> CreditCheckResult {
        if ctx.retailer.risk_score >= ctx.high_risk_threshold && !ctx.retailer.high_risk_override {
            debug!(
                "RiskScoreValidator: retailer {} risk score {} >= {}",
                ctx.retailer.id, ctx.retailer.risk_score, ctx.high_risk_threshold
            );
            return CreditCheckResult::reject(RejectionReason::HighRiskAccount);
        }
        CreditCheckResult::Approve
    }

    fn priority(&self) -> u8 {
        30
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credit::validators::test_support::{context_with, retailer};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_blocks_at_threshold() {
        let mut r = retailer();
        r.risk_score = 70;
        let ctx = context_with(&r, dec!(100));
        assert_eq!(
            RiskScoreValidator.validate(&ctx).await,
            CreditCheckResult::reject(RejectionReason::HighRiskAccount)
        );
    }

    #[tokio::test]
    async fn test_allows_below_threshold() {
        let mut r = retailer();
        r.risk_score = 69;
        let ctx = context_with(&r, dec!(100));
        assert!(RiskScoreValidator.validate(&ctx).await.is_approved());
    }

    #[tokio::test]
    async fn test_admin_override_allows_high_risk() {
        let mut r = retailer();
        r.risk_score = 95;
        r.high_risk_override = true;
        let ctx = context_with(&r, dec!(100));
        assert!(RiskScoreValidator.validate(&ctx).await.is_approved());
    }
}
