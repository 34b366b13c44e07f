use crate::application::routing_service::RoutingService;
use crate::infrastructure::queue::{Job, JobPayload, JobProcessor, QueueName};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Asynchronous vendor (re)routing: every tried vendor is excluded by the
/// service, the order stays PENDING throughout.
pub struct RoutingProcessor {
    routing: Arc<RoutingService>,
}

impl RoutingProcessor {
    pub fn new(routing: Arc<RoutingService>) -> Self {
        Self { routing }
    }
}

#[async_trait]
impl JobProcessor for RoutingProcessor {
    fn queue(&self) -> QueueName {
        QueueName::OrderRouting
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let JobPayload::RouteOrder { order_id, .. } = &job.payload else {
            anyhow::bail!("Wrong payload on order-routing: {:?}", job.payload);
        };
        self.routing.reassign(*order_id).await?;
        Ok(())
    }
}
