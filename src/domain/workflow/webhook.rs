//! Webhook-before-processing.
//!
//! Every inbound webhook is persisted with `status=pending` and ACKed
//! before any business logic runs. A worker drains pending events; failed
//! events reschedule with exponential backoff while retries remain, and
//! events stuck in `processing` past the stuck threshold are re-picked.

use crate::domain::types::WebhookStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub source: String,
    /// Raw payload bytes as received, stored before any parsing.
    pub payload: String,
    pub headers: serde_json::Value,
    pub status: WebhookStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl WebhookEvent {
    pub const BACKOFF_BASE_SECONDS: i64 = 5;
    pub const DEFAULT_STUCK_THRESHOLD_MINUTES: i64 = 10;

    pub fn receive(
        source: impl Into<String>,
        payload: impl Into<String>,
        headers: serde_json::Value,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            payload: payload.into(),
            headers,
            status: WebhookStatus::Pending,
            retry_count: 0,
            max_retries,
            next_attempt_at: now,
            received_at: now,
            processed_at: None,
            error: None,
        }
    }

    pub fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Delay before attempt `n` (1-based): base * 2^(n-1).
    pub fn backoff_delay(attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::seconds(Self::BACKOFF_BASE_SECONDS * 2i64.pow(exponent))
    }

    /// Records a processing failure and schedules the next attempt, or
    /// marks the event failed when retries are exhausted.
    pub fn record_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.error = Some(error.into());
        if self.has_retries_left() {
            self.status = WebhookStatus::Pending;
            self.next_attempt_at = now + Self::backoff_delay(self.retry_count + 1);
        } else {
            self.status = WebhookStatus::Failed;
            self.processed_at = Some(now);
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.status = WebhookStatus::Completed;
        self.processed_at = Some(now);
        self.error = None;
    }

    /// Stuck in `processing` longer than the threshold; eligible for
    /// re-pickup by the recovery sweep.
    pub fn is_stuck(&self, now: DateTime<Utc>, stuck_threshold: Duration) -> bool {
        self.status == WebhookStatus::Processing && now - self.received_at > stuck_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> WebhookEvent {
        WebhookEvent::receive("whatsapp", "{\"text\":\"10 kg rice\"}", json!({}), 3)
    }

    #[test]
    fn test_received_event_is_pending_with_timestamp() {
        let e = event();
        assert_eq!(e.status, WebhookStatus::Pending);
        assert!(e.processed_at.is_none());
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        assert_eq!(WebhookEvent::backoff_delay(1), Duration::seconds(5));
        assert_eq!(WebhookEvent::backoff_delay(2), Duration::seconds(10));
        assert_eq!(WebhookEvent::backoff_delay(3), Duration::seconds(20));
    }

    #[test]
    fn test_failure_schedules_retry_until_exhausted() {
        let mut e = event();
        let now = Utc::now();

        e.record_failure("timeout", now);
        assert_eq!(e.status, WebhookStatus::Pending);
        assert_eq!(e.retry_count, 1);
        assert!(e.next_attempt_at > now);

        e.record_failure("timeout", now);
        e.record_failure("timeout", now);
        assert_eq!(e.status, WebhookStatus::Failed);
        assert!(e.processed_at.is_some());
    }

    #[test]
    fn test_stuck_detection_strictly_past_threshold() {
        let mut e = event();
        e.status = WebhookStatus::Processing;
        let threshold = Duration::minutes(10);
        assert!(!e.is_stuck(e.received_at + Duration::minutes(10), threshold));
        assert!(e.is_stuck(
            e.received_at + Duration::minutes(10) + Duration::seconds(1),
            threshold
        ));
    }
}
