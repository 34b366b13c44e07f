use async_trait::async_trait;
use chrono::Duration;
use tracing::debug;

use crate::domain::credit::validators::validator_trait::{
    CreditCheckResult, CreditContext, CreditValidator,
};
use crate::domain::types::RejectionReason;

/// Blocks new orders while any unpaid invoice is overdue beyond the
/// configured block threshold.
pub struct OverdueInvoiceValidator;

#[async_trait]
impl CreditValidator for OverdueInvoiceValidator {
    fn name(&self) -> &str {
        "OverdueInvoiceValidator"
    }

    async fn validate(&self, ctx: &CreditContext<'_>) -> CreditCheckResult {
        if let Some(due) = ctx.oldest_unpaid_due {
            let overdue_for = ctx.now - due;
            if overdue_for > Duration::days(ctx.overdue_block_days) {
                debug!(
                    "OverdueInvoiceValidator: retailer {} has an invoice {} days overdue",
                    ctx.retailer.id,
                    overdue_for.num_days()
                );
                return CreditCheckResult::reject(RejectionReason::OverdueBlock);
            }
        }
        CreditCheckResult::Approve
    }

    fn priority(&self) -> u8 {
        50
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credit::validators::test_support::{context_with, retailer};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_blocks_past_threshold() {
        let r = retailer();
        let mut ctx = context_with(&r, dec!(100));
        ctx.oldest_unpaid_due = Some(Utc::now() - Duration::days(20));
        ctx.overdue_block_days = 14;
        assert_eq!(
            OverdueInvoiceValidator.validate(&ctx).await,
            CreditCheckResult::reject(RejectionReason::OverdueBlock)
        );
    }

    #[tokio::test]
    async fn test_allows_within_grace() {
        let r = retailer();
        let mut ctx = context_with(&r, dec!(100));
        ctx.oldest_unpaid_due = Some(Utc::now() - Duration::days(7));
        ctx.overdue_block_days = 14;
        assert!(OverdueInvoiceValidator.validate(&ctx).await.is_approved());
    }

    #[tokio::test]
    async fn test_allows_when_nothing_unpaid() {
        let r = retailer();
        let ctx = context_with(&r, dec!(100));
        assert!(OverdueInvoiceValidator.validate(&ctx).await.is_approved());
    }
}
