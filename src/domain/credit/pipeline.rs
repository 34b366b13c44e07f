//! Ordered execution of the credit validation rules.

use crate::domain::credit::validators::{
    AccountActiveValidator, AccountApprovedValidator, CreditCheckResult, CreditContext,
    CreditLimitValidator, CreditValidator, OverdueInvoiceValidator, RiskScoreValidator,
};
use std::sync::Arc;
use tracing::debug;

/// Runs validators in priority order; the first rejection wins.
pub struct CreditPipeline {
    validators: Vec<Arc<dyn CreditValidator>>,
}

impl CreditPipeline {
    /// The standard rule set, in evaluation order.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(AccountActiveValidator),
            Arc::new(AccountApprovedValidator),
            Arc::new(RiskScoreValidator),
            Arc::new(CreditLimitValidator),
            Arc::new(OverdueInvoiceValidator),
        ])
    }

    pub fn new(mut validators: Vec<Arc<dyn CreditValidator>>) -> Self {
        validators.sort_by_key(|v| v.priority());
        Self { validators }
    }

    pub async fn evaluate(&self, ctx: &CreditContext<'_>) -> CreditCheckResult {
        for validator in &self.validators {
            let result = validator.validate(ctx).await;
            if !result.is_approved() {
                debug!("Credit pipeline rejected by {}", validator.name());
                return result;
            }
        }
        CreditCheckResult::Approve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credit::validators::test_support::{context_with, retailer};
    use crate::domain::types::RejectionReason;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_first_failure_wins() {
        // An inactive, unapproved, high-risk, over-limit account must be
        // reported as inactive: that rule runs first.
        let mut r = retailer();
        r.is_active = false;
        r.is_approved = false;
        r.risk_score = 99;
        let ctx = context_with(&r, dec!(999999));

        let result = CreditPipeline::standard().evaluate(&ctx).await;
        assert_eq!(
            result,
            CreditCheckResult::reject(RejectionReason::AccountInactive)
        );
    }

    #[tokio::test]
    async fn test_clean_account_passes_all_rules() {
        let r = retailer();
        let ctx = context_with(&r, dec!(1000));
        assert!(CreditPipeline::standard().evaluate(&ctx).await.is_approved());
    }

    #[tokio::test]
    async fn test_limit_checked_before_overdue() {
        let mut r = retailer();
        r.available_credit = dec!(100);
        let mut ctx = context_with(&r, dec!(500));
        ctx.oldest_unpaid_due = Some(chrono::Utc::now() - chrono::Duration::days(60));

        match CreditPipeline::standard().evaluate(&ctx).await {
            CreditCheckResult::Reject { reason, shortfall } => {
                assert_eq!(reason, RejectionReason::CreditLimitExceeded);
                assert_eq!(shortfall, Some(dec!(400)));
            }
            other => panic!("expected limit rejection, got {:?}", other),
        }
    }
}
