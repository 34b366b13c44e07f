use crate::domain::repositories::{RejectedOrderRepository, WebhookRepository};
use crate::infrastructure::queue::{Job, JobFabric, JobPayload, JobProcessor, QueueName};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Builds the operational summary report. Rendering (CSV/PDF) is out of
/// scope; the structured summary is logged and available to callers.
pub struct ReportProcessor {
    webhooks: Arc<dyn WebhookRepository>,
    rejected: Arc<dyn RejectedOrderRepository>,
    fabric: Arc<JobFabric>,
}

impl ReportProcessor {
    pub fn new(
        webhooks: Arc<dyn WebhookRepository>,
        rejected: Arc<dyn RejectedOrderRepository>,
        fabric: Arc<JobFabric>,
    ) -> Self {
        Self {
            webhooks,
            rejected,
            fabric,
        }
    }
}

#[async_trait]
impl JobProcessor for ReportProcessor {
    fn queue(&self) -> QueueName {
        QueueName::ReportGeneration
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let JobPayload::GenerateReport { report } = &job.payload else {
            anyhow::bail!("Wrong payload on report-generation: {:?}", job.payload);
        };

        let webhook_counts = self.webhooks.counts_by_status().await?;
        let unreviewed = self.rejected.unreviewed(100).await?;
        let queue_stats = self.fabric.stats().await?;

        let summary = serde_json::json!({
            "report": report,
            "webhooks": webhook_counts,
            "unreviewed_rejections": unreviewed.len(),
            "queues": queue_stats,
            "mode": self.fabric.mode().to_string(),
        });
        info!(report = %report, summary = %summary, "Report generated");
        Ok(())
    }
}
