use crate::application::intake::OrderIntakeService;
use crate::infrastructure::queue::{Job, JobPayload, JobProcessor, QueueName};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Drives uploaded order images through signed-URL fetch, OCR and the
/// unified parser.
pub struct ImageProcessor {
    intake: Arc<OrderIntakeService>,
}

impl ImageProcessor {
    pub fn new(intake: Arc<OrderIntakeService>) -> Self {
        Self { intake }
    }
}

#[async_trait]
impl JobProcessor for ImageProcessor {
    fn queue(&self) -> QueueName {
        QueueName::ImageProcessing
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let JobPayload::ProcessImage { upload_id } = &job.payload else {
            anyhow::bail!("Wrong payload on image-processing: {:?}", job.payload);
        };
        self.intake.process_uploaded_image(*upload_id).await
    }
}
