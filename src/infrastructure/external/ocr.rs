//! HTTP adapter for the external OCR provider.
//!
//! Contract: `POST {base_url}/extract` with `{"image_url": ...}`, response
//! `{"text": ...}`. Calls are wrapped in a circuit breaker so a degraded
//! provider fails fast instead of stalling the image queue.

use crate::domain::ports::OcrProvider;
use crate::infrastructure::core::circuit_breaker::CircuitBreaker;
use crate::infrastructure::external::http_client_factory::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub struct HttpOcrProvider {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    breaker: CircuitBreaker,
}

#[derive(Deserialize)]
struct OcrResponse {
    text: String,
}

impl HttpOcrProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(Duration::from_secs(60)),
            base_url,
            api_key,
            breaker: CircuitBreaker::new("ocr", 5, 2, Duration::from_secs(60)),
        }
    }
}

#[async_trait]
impl OcrProvider for HttpOcrProvider {
    async fn extract_text(&self, image_url: &str) -> Result<String> {
        let request = self
            .client
            .post(format!("{}/extract", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "image_url": image_url }));

        let body = self
            .breaker
            .call(async {
                let response = request.send().await.context("OCR request failed")?;
                let response = response
                    .error_for_status()
                    .context("OCR provider returned an error status")?;
                response
                    .json::<OcrResponse>()
                    .await
                    .context("Bad OCR response body")
            })
            .await?;
        Ok(body.text)
    }
}
