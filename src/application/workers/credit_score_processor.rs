use crate::application::analytics_service::AnalyticsService;
use crate::infrastructure::queue::{Job, JobPayload, JobProcessor, QueueName};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Recomputes a retailer's derived metrics. The metrics are derived
/// views; the stored risk_score only moves through the audit-logged
/// admin path.
pub struct CreditScoreProcessor {
    analytics: Arc<AnalyticsService>,
}

impl CreditScoreProcessor {
    pub fn new(analytics: Arc<AnalyticsService>) -> Self {
        Self { analytics }
    }
}

#[async_trait]
impl JobProcessor for CreditScoreProcessor {
    fn queue(&self) -> QueueName {
        QueueName::CreditScore
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let JobPayload::RecomputeCreditScore { retailer_id } = &job.payload else {
            anyhow::bail!("Wrong payload on credit-score: {:?}", job.payload);
        };

        let metrics = self.analytics.retailer_metrics(*retailer_id).await?;
        info!(
            %retailer_id,
            orders_30d = metrics.orders_last_30d,
            utilization = %metrics.credit_utilization_pct,
            on_time = %metrics.on_time_payment_ratio,
            "Retailer metrics recomputed"
        );
        Ok(())
    }
}
