//! Outbound WhatsApp send adapter.
//!
//! Send contract: template name plus positional variables; the provider
//! answers with its message id. Throughput is capped at the queue layer
//! (whatsapp-messages, 50/s), not here.

use crate::domain::ports::WhatsAppSender;
use crate::infrastructure::external::http_client_factory::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub struct HttpWhatsAppSender {
    client: ClientWithMiddleware,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

#[derive(Deserialize)]
struct SendResponse {
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

impl HttpWhatsAppSender {
    pub fn new(base_url: String, access_token: String, phone_number_id: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(Duration::from_secs(30)),
            base_url,
            access_token,
            phone_number_id,
        }
    }
}

#[async_trait]
impl WhatsAppSender for HttpWhatsAppSender {
    async fn send_template(
        &self,
        to_phone: &str,
        template: &str,
        variables: &[String],
    ) -> Result<String> {
        let parameters: Vec<_> = variables
            .iter()
            .map(|v| json!({ "type": "text", "text": v }))
            .collect();

        let response = self
            .client
            .post(format!(
                "{}/{}/messages",
                self.base_url, self.phone_number_id
            ))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to_phone,
                "type": "template",
                "template": {
                    "name": template,
                    "components": [{ "type": "body", "parameters": parameters }],
                },
            }))
            .send()
            .await
            .context("WhatsApp send failed")?
            .error_for_status()
            .context("WhatsApp API returned an error status")?
            .json::<SendResponse>()
            .await
            .context("Bad WhatsApp send response")?;

        response
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .context("WhatsApp response contained no message id")
    }
}
