use crate::application::intake::OrderIntakeService;
use crate::infrastructure::queue::{Job, JobPayload, JobProcessor, QueueName};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Turns an accepted parse session into orders. Runs off the request
/// path so intake handlers only enqueue.
pub struct OrderProcessor {
    intake: Arc<OrderIntakeService>,
}

impl OrderProcessor {
    pub fn new(intake: Arc<OrderIntakeService>) -> Self {
        Self { intake }
    }
}

#[async_trait]
impl JobProcessor for OrderProcessor {
    fn queue(&self) -> QueueName {
        QueueName::OrderProcessing
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let JobPayload::ProcessOrder { session_id, .. } = &job.payload else {
            anyhow::bail!("Wrong payload on order-processing: {:?}", job.payload);
        };
        self.intake.place_from_session(*session_id).await?;
        Ok(())
    }
}
