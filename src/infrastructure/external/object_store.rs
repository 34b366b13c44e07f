//! Signed-URL object store adapter for order images.

use crate::domain::ports::ObjectStore;
use crate::infrastructure::external::http_client_factory::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Read URLs never live longer than this.
const MAX_READ_TTL: Duration = Duration::from_secs(3600);

pub struct HttpObjectStore {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    bucket: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: String, api_key: String, bucket: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(Duration::from_secs(30)),
            base_url,
            api_key,
            bucket,
        }
    }

    async fn sign(&self, key: &str, method: &str, ttl: Duration) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/sign", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "bucket": self.bucket,
                "key": key,
                "method": method,
                "ttl_seconds": ttl.as_secs(),
            }))
            .send()
            .await
            .context("Object store sign request failed")?
            .error_for_status()
            .context("Object store returned an error status")?
            .json::<SignedUrlResponse>()
            .await
            .context("Bad signed-URL response")?;
        Ok(response.url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn signed_upload_url(&self, key: &str, ttl: Duration) -> Result<String> {
        self.sign(key, "PUT", ttl).await
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String> {
        self.sign(key, "GET", ttl.min(MAX_READ_TTL)).await
    }
}
