//! Idempotency keys for externally visible state changes.
//!
//! A unique constraint on `key` serializes concurrent submissions. A
//! completed key replays its stored response byte-for-byte; a key still
//! `processing` makes the duplicate caller poll briefly for the stored
//! response instead of re-running the operation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdempotencyStatus {
    Processing,
    Completed,
}

impl fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdempotencyStatus::Processing => write!(f, "processing"),
            IdempotencyStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for IdempotencyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(IdempotencyStatus::Processing),
            "completed" => Ok(IdempotencyStatus::Completed),
            other => Err(format!("Unknown idempotency status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub key: String,
    pub operation_type: String,
    pub request_hash: String,
    pub response_payload: Option<String>,
    pub status: IdempotencyStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyKey {
    pub const TTL_HOURS: i64 = 24;

    pub fn begin(key: impl Into<String>, operation_type: impl Into<String>, request: &[u8]) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            operation_type: operation_type.into(),
            request_hash: request_hash(request),
            response_payload: None,
            status: IdempotencyStatus::Processing,
            created_at: now,
            expires_at: now + Duration::hours(Self::TTL_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether a replayed request is the same request. A differing hash on
    /// the same key is a caller bug, surfaced as a conflict.
    pub fn matches_request(&self, request: &[u8]) -> bool {
        self.request_hash == request_hash(request)
    }

    pub fn complete(&mut self, response_payload: String) {
        self.response_payload = Some(response_payload);
        self.status = IdempotencyStatus::Completed;
    }
}

/// SHA-256 hex digest of the raw request body.
pub fn request_hash(request: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request);
    hex::encode(hasher.finalize())
}
