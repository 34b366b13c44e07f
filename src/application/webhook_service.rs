//! Webhook-before-processing.
//!
//! Signature verification, the subscribe handshake, persist-then-ACK
//! intake, and the worker-side processing of pending events. Raw payloads
//! are stored before any parsing.

use crate::application::intake::OrderIntakeService;
use crate::domain::repositories::{RetailerRepository, WebhookRepository};
use crate::domain::types::{InputSource, WebhookStatus};
use crate::domain::workflow::WebhookEvent;
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Verifies an `X-Hub-Signature-256` header ("sha256=<hex>") over the raw
/// body with the shared app secret.
pub fn verify_signature(app_secret: &str, raw_body: &[u8], signature_header: &str) -> bool {
    let Some(expected_hex) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}

/// The GET verification handshake: echoes the challenge when the mode and
/// token match.
pub fn verify_handshake(
    verify_token: &str,
    mode: &str,
    token: &str,
    challenge: &str,
) -> Option<String> {
    if mode == "subscribe" && !verify_token.is_empty() && token == verify_token {
        Some(challenge.to_string())
    } else {
        None
    }
}

pub struct WebhookService {
    webhooks: Arc<dyn WebhookRepository>,
    retailers: Arc<dyn RetailerRepository>,
    intake: Arc<OrderIntakeService>,
    metrics: Metrics,
    app_secret: String,
    verify_token: String,
    max_retries: u32,
    stuck_threshold: Duration,
}

impl WebhookService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        webhooks: Arc<dyn WebhookRepository>,
        retailers: Arc<dyn RetailerRepository>,
        intake: Arc<OrderIntakeService>,
        metrics: Metrics,
        app_secret: String,
        verify_token: String,
        max_retries: u32,
        stuck_threshold: Duration,
    ) -> Self {
        Self {
            webhooks,
            retailers,
            intake,
            metrics,
            app_secret,
            verify_token,
            max_retries,
            stuck_threshold,
        }
    }

    pub fn check_signature(&self, raw_body: &[u8], signature_header: &str) -> bool {
        verify_signature(&self.app_secret, raw_body, signature_header)
    }

    pub fn check_handshake(&self, mode: &str, token: &str, challenge: &str) -> Option<String> {
        verify_handshake(&self.verify_token, mode, token, challenge)
    }

    /// Persists the raw event and returns immediately; the caller ACKs
    /// the sender before any business logic runs.
    pub async fn receive(
        &self,
        source: &str,
        raw_payload: &str,
        headers: serde_json::Value,
    ) -> Result<Uuid> {
        let event = WebhookEvent::receive(source, raw_payload, headers, self.max_retries);
        self.webhooks.insert(&event).await?;
        self.metrics
            .webhooks_received_total
            .with_label_values(&[source])
            .inc();
        info!(event_id = %event.id, source, "Webhook persisted");
        Ok(event.id)
    }

    /// Drains due pending events. Out-of-order delivery is safe: order
    /// creation dedupes through idempotency keys.
    pub async fn process_due(&self, limit: u32) -> Result<u32> {
        let now = Utc::now();
        let due = self.webhooks.due_pending(now, limit).await?;
        let mut processed = 0;

        for mut event in due {
            event.status = WebhookStatus::Processing;
            self.webhooks.save(&event).await?;

            match self.process_event(&event).await {
                Ok(()) => {
                    event.record_success(Utc::now());
                    processed += 1;
                }
                Err(e) => {
                    warn!(event_id = %event.id, "Webhook processing failed: {:#}", e);
                    event.record_failure(format!("{:#}", e), Utc::now());
                }
            }
            self.webhooks.save(&event).await?;
        }
        Ok(processed)
    }

    /// Event counts by status for the recovery dashboard.
    pub async fn counts(&self) -> Result<std::collections::HashMap<String, u64>> {
        self.webhooks.counts_by_status().await
    }

    /// Returns events stuck in `processing` to the pending pool.
    pub async fn repickup_stuck(&self) -> Result<u32> {
        let stuck = self.webhooks.stuck(Utc::now(), self.stuck_threshold).await?;
        let count = stuck.len() as u32;
        for mut event in stuck {
            warn!(event_id = %event.id, "Re-picking stuck webhook");
            event.status = WebhookStatus::Pending;
            event.next_attempt_at = Utc::now();
            self.webhooks.save(&event).await?;
        }
        Ok(count)
    }

    async fn process_event(&self, event: &WebhookEvent) -> Result<()> {
        let (phone, text) = extract_message(&event.payload)
            .with_context(|| format!("Unrecognized {} payload shape", event.source))?;

        let retailer = self
            .retailers
            .find_by_phone(&phone)
            .await?
            .with_context(|| format!("No retailer registered for {}", phone))?;

        self.intake
            .handle_inbound(InputSource::WhatsApp, &text, retailer.id)
            .await?;
        Ok(())
    }
}

/// Pulls (sender phone, message text) out of a WhatsApp payload. Accepts
/// the provider's nested shape and the flattened shape used in tests.
fn extract_message(payload: &str) -> Option<(String, String)> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;

    // Flat shape: {"from": "...", "text": "..."}
    if let (Some(from), Some(text)) = (value["from"].as_str(), value["text"].as_str()) {
        return Some((from.to_string(), text.to_string()));
    }

    // Provider shape: entry[0].changes[0].value.messages[0]
    let message = value["entry"][0]["changes"][0]["value"]["messages"][0].clone();
    let from = message["from"].as_str()?;
    let text = message["text"]["body"].as_str()?;
    Some((from.to_string(), text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let secret = "shared-secret";
        let body = b"{\"from\":\"+880\",\"text\":\"10 kg rice\"}";

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let header = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_signature(secret, body, &header));
        assert!(!verify_signature(secret, b"tampered", &header));
        assert!(!verify_signature("wrong-secret", body, &header));
        assert!(!verify_signature(secret, body, "sha256=nothex"));
        assert!(!verify_signature(secret, body, "md5=abc"));
    }

    #[test]
    fn test_handshake() {
        assert_eq!(
            verify_handshake("tok", "subscribe", "tok", "challenge-42"),
            Some("challenge-42".to_string())
        );
        assert_eq!(verify_handshake("tok", "subscribe", "wrong", "c"), None);
        assert_eq!(verify_handshake("tok", "unsubscribe", "tok", "c"), None);
        assert_eq!(verify_handshake("", "subscribe", "", "c"), None);
    }

    #[test]
    fn test_extract_flat_and_nested_payloads() {
        let flat = r#"{"from":"+8801712345678","text":"10 kg rice"}"#;
        assert_eq!(
            extract_message(flat),
            Some(("+8801712345678".to_string(), "10 kg rice".to_string()))
        );

        let nested = r#"{
            "entry": [{"changes": [{"value": {"messages": [
                {"from": "+8801712345678", "text": {"body": "5 l oil"}}
            ]}}]}
        ]}"#;
        assert_eq!(
            extract_message(nested),
            Some(("+8801712345678".to_string(), "5 l oil".to_string()))
        );

        assert_eq!(extract_message("not json"), None);
        assert_eq!(extract_message("{}"), None);
    }
}
