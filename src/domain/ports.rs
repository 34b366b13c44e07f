//! External provider seams. Implementations live in
//! `infrastructure::external`; tests use the mocks in
//! `infrastructure::mock`.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OCR provider: image in, extracted text out.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn extract_text(&self, image_url: &str) -> Result<String>;
}

/// A line item as extracted by an LLM tier, before catalog matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub product_text: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
}

/// Structured-output LLM extractor. Two implementations are wired as the
/// primary and fallback tiers ahead of the rule-based parser.
#[async_trait]
pub trait LlmExtractor: Send + Sync {
    async fn extract_items(&self, text: &str) -> Result<Vec<ExtractedItem>>;

    /// Tier label recorded on the parse session.
    fn tier_name(&self) -> &str;
}

/// Outbound WhatsApp sender; returns the provider message id.
#[async_trait]
pub trait WhatsAppSender: Send + Sync {
    async fn send_template(
        &self,
        to_phone: &str,
        template: &str,
        variables: &[String],
    ) -> Result<String>;
}

/// Object store with signed-URL access for order images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Signed upload URL for a new object key.
    async fn signed_upload_url(&self, key: &str, ttl: Duration) -> Result<String>;

    /// Signed private read URL, TTL capped at one hour.
    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String>;
}
