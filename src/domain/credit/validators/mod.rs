mod account_active;
mod account_approved;
mod credit_limit;
mod overdue_invoices;
mod risk_score;
mod validator_trait;

pub use account_active::AccountActiveValidator;
pub use account_approved::AccountApprovedValidator;
pub use credit_limit::CreditLimitValidator;
pub use overdue_invoices::OverdueInvoiceValidator;
pub use risk_score::RiskScoreValidator;
pub use validator_trait::{CreditCheckResult, CreditContext, CreditValidator};

#[cfg(test)]
pub(crate) mod test_support {
    use super::CreditContext;
    use crate::domain::party::Retailer;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    pub fn retailer() -> Retailer {
        Retailer {
            id: Uuid::new_v4(),
            name: "Test Traders".to_string(),
            phone: "+8801000000000".to_string(),
            credit_limit: dec!(5000),
            outstanding_debt: Decimal::ZERO,
            available_credit: dec!(5000),
            risk_score: 10,
            is_approved: true,
            is_active: true,
            high_risk_override: false,
            delivery_zone: None,
            district: None,
            working_hours: None,
            created_at: Utc::now(),
        }
    }

    pub fn context_with(retailer: &Retailer, requested: Decimal) -> CreditContext<'_> {
        CreditContext {
            retailer,
            requested_amount: requested,
            oldest_unpaid_due: None,
            now: Utc::now(),
            overdue_block_days: 14,
            high_risk_threshold: 70,
        }
    }
}
