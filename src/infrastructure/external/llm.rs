//! HTTP adapter for the LLM item extractor.
//!
//! The provider takes a prompt plus a strict JSON schema and must answer
//! with `{"items": [{"product_text", "quantity", "unit"}]}`. Two instances
//! are wired as the primary and fallback tiers; the rule-based parser is
//! the final tier and lives in the domain.

use crate::domain::ports::{ExtractedItem, LlmExtractor};
use crate::infrastructure::core::circuit_breaker::CircuitBreaker;
use crate::infrastructure::external::http_client_factory::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const ITEM_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "items": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "product_text": {"type": "string"},
          "quantity": {"type": ["number", "null"]},
          "unit": {"type": ["string", "null"]}
        },
        "required": ["product_text"]
      }
    }
  },
  "required": ["items"]
}"#;

pub struct HttpLlmExtractor {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    model: String,
    tier: String,
    breaker: CircuitBreaker,
}

#[derive(Deserialize)]
struct ExtractionResponse {
    items: Vec<ExtractedItem>,
}

impl HttpLlmExtractor {
    pub fn new(base_url: String, api_key: String, model: String, tier: impl Into<String>) -> Self {
        let tier = tier.into();
        Self {
            client: HttpClientFactory::create_client(Duration::from_secs(30)),
            base_url,
            api_key,
            model,
            breaker: CircuitBreaker::new(format!("llm-{}", tier), 5, 2, Duration::from_secs(60)),
            tier,
        }
    }

    fn prompt_for(text: &str) -> String {
        format!(
            "Extract the ordered items from this wholesale order message. \
             Return only items actually requested.\n\nMessage:\n{}",
            text
        )
    }
}

#[async_trait]
impl LlmExtractor for HttpLlmExtractor {
    async fn extract_items(&self, text: &str) -> Result<Vec<ExtractedItem>> {
        let schema: serde_json::Value = serde_json::from_str(ITEM_SCHEMA).expect("static schema");
        let request = self
            .client
            .post(format!("{}/v1/extract", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "prompt": Self::prompt_for(text),
                "response_schema": schema,
            }));

        let body = self
            .breaker
            .call(async {
                let response = request.send().await.context("LLM request failed")?;
                let response = response
                    .error_for_status()
                    .context("LLM provider returned an error status")?;
                response
                    .json::<ExtractionResponse>()
                    .await
                    .context("LLM response did not match the item schema")
            })
            .await?;
        Ok(body.items)
    }

    fn tier_name(&self) -> &str {
        &self.tier
    }
}
