//! External provider endpoints and secrets.
//!
//! All optional: absent providers fall back to mocks, which keeps local
//! development and tests off the network.

use std::env;

#[derive(Debug, Clone, Default)]
pub struct ProvidersEnvConfig {
    pub ocr_base_url: Option<String>,
    pub ocr_api_key: String,
    pub llm_base_url: Option<String>,
    pub llm_api_key: String,
    pub llm_primary_model: String,
    pub llm_fallback_model: String,
    pub whatsapp_base_url: Option<String>,
    pub whatsapp_access_token: String,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_verify_token: String,
    pub whatsapp_app_secret: String,
    pub object_store_base_url: Option<String>,
    pub object_store_api_key: String,
    pub object_store_bucket: String,
}

impl ProvidersEnvConfig {
    pub fn from_env() -> Self {
        Self {
            ocr_base_url: env::var("OCR_BASE_URL").ok(),
            ocr_api_key: env::var("OCR_API_KEY").unwrap_or_default(),
            llm_base_url: env::var("LLM_BASE_URL").ok(),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_primary_model: env::var("LLM_PRIMARY_MODEL")
                .unwrap_or_else(|_| "extractor-large".to_string()),
            llm_fallback_model: env::var("LLM_FALLBACK_MODEL")
                .unwrap_or_else(|_| "extractor-small".to_string()),
            whatsapp_base_url: env::var("WHATSAPP_BASE_URL").ok(),
            whatsapp_access_token: env::var("WHATSAPP_ACCESS_TOKEN").unwrap_or_default(),
            whatsapp_phone_number_id: env::var("WHATSAPP_PHONE_NUMBER_ID").unwrap_or_default(),
            whatsapp_verify_token: env::var("WHATSAPP_VERIFY_TOKEN").unwrap_or_default(),
            whatsapp_app_secret: env::var("WHATSAPP_APP_SECRET").unwrap_or_default(),
            object_store_base_url: env::var("OBJECT_STORE_BASE_URL").ok(),
            object_store_api_key: env::var("OBJECT_STORE_API_KEY").unwrap_or_default(),
            object_store_bucket: env::var("OBJECT_STORE_BUCKET")
                .unwrap_or_else(|_| "order-images".to_string()),
        }
    }
}
