//! Mock external providers for tests and local development.

use crate::domain::ports::{ExtractedItem, LlmExtractor, ObjectStore, OcrProvider, WhatsAppSender};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// OCR mock returning canned text per image URL suffix, or a fixed default.
pub struct MockOcrProvider {
    pub canned_text: String,
    pub fail: bool,
}

impl MockOcrProvider {
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            canned_text: text.into(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            canned_text: String::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl OcrProvider for MockOcrProvider {
    async fn extract_text(&self, _image_url: &str) -> Result<String> {
        if self.fail {
            anyhow::bail!("mock OCR failure");
        }
        Ok(self.canned_text.clone())
    }
}

/// LLM mock; `fail: true` simulates an outage so the tier fallback engages.
pub struct MockLlmExtractor {
    pub items: Vec<ExtractedItem>,
    pub fail: bool,
    tier: String,
    pub calls: AtomicUsize,
}

impl MockLlmExtractor {
    pub fn returning(items: Vec<ExtractedItem>, tier: impl Into<String>) -> Self {
        Self {
            items,
            fail: false,
            tier: tier.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(tier: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            fail: true,
            tier: tier.into(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmExtractor for MockLlmExtractor {
    async fn extract_items(&self, _text: &str) -> Result<Vec<ExtractedItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("mock LLM failure");
        }
        Ok(self.items.clone())
    }

    fn tier_name(&self) -> &str {
        &self.tier
    }
}

/// Records every outbound message instead of sending it.
#[derive(Default)]
pub struct MockWhatsAppSender {
    pub sent: Mutex<Vec<SentTemplate>>,
}

#[derive(Debug, Clone)]
pub struct SentTemplate {
    pub to_phone: String,
    pub template: String,
    pub variables: Vec<String>,
}

impl MockWhatsAppSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sent log poisoned").len()
    }

    pub fn sent_templates(&self) -> Vec<SentTemplate> {
        self.sent.lock().expect("sent log poisoned").clone()
    }
}

#[async_trait]
impl WhatsAppSender for MockWhatsAppSender {
    async fn send_template(
        &self,
        to_phone: &str,
        template: &str,
        variables: &[String],
    ) -> Result<String> {
        self.sent.lock().expect("sent log poisoned").push(SentTemplate {
            to_phone: to_phone.to_string(),
            template: template.to_string(),
            variables: variables.to_vec(),
        });
        Ok(format!("mock-msg-{}", Uuid::new_v4()))
    }
}

/// Object store mock producing deterministic fake URLs.
pub struct MockObjectStore;

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn signed_upload_url(&self, key: &str, _ttl: Duration) -> Result<String> {
        Ok(format!("https://mock-store.local/upload/{}", key))
    }

    async fn signed_read_url(&self, key: &str, _ttl: Duration) -> Result<String> {
        Ok(format!("https://mock-store.local/read/{}", key))
    }
}
