//! Queue names, per-queue policy and the job envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    OrderProcessing,
    WhatsAppMessages,
    ImageProcessing,
    CreditScore,
    OrderRouting,
    PaymentReminders,
    ReportGeneration,
}

impl QueueName {
    pub const ALL: [QueueName; 7] = [
        QueueName::OrderProcessing,
        QueueName::WhatsAppMessages,
        QueueName::ImageProcessing,
        QueueName::CreditScore,
        QueueName::OrderRouting,
        QueueName::PaymentReminders,
        QueueName::ReportGeneration,
    ];
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueName::OrderProcessing => write!(f, "order-processing"),
            QueueName::WhatsAppMessages => write!(f, "whatsapp-messages"),
            QueueName::ImageProcessing => write!(f, "image-processing"),
            QueueName::CreditScore => write!(f, "credit-score"),
            QueueName::OrderRouting => write!(f, "order-routing"),
            QueueName::PaymentReminders => write!(f, "payment-reminders"),
            QueueName::ReportGeneration => write!(f, "report-generation"),
        }
    }
}

impl FromStr for QueueName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order-processing" => Ok(QueueName::OrderProcessing),
            "whatsapp-messages" => Ok(QueueName::WhatsAppMessages),
            "image-processing" => Ok(QueueName::ImageProcessing),
            "credit-score" => Ok(QueueName::CreditScore),
            "order-routing" => Ok(QueueName::OrderRouting),
            "payment-reminders" => Ok(QueueName::PaymentReminders),
            "report-generation" => Ok(QueueName::ReportGeneration),
            other => Err(format!("Unknown queue: {}", other)),
        }
    }
}

/// Declarative retry/limits policy attached to each queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Per-second throughput cap, where the external API demands one.
    pub rate_per_sec: Option<u32>,
    pub timeout: Duration,
}

impl QueueName {
    pub fn config(&self) -> QueueConfig {
        match self {
            QueueName::OrderProcessing => QueueConfig {
                concurrency: 5,
                max_attempts: 3,
                backoff_base: Duration::from_secs(5),
                // 100/min
                rate_per_sec: Some(2),
                timeout: Duration::from_secs(120),
            },
            QueueName::WhatsAppMessages => QueueConfig {
                concurrency: 10,
                max_attempts: 5,
                backoff_base: Duration::from_secs(5),
                rate_per_sec: Some(50),
                timeout: Duration::from_secs(30),
            },
            QueueName::ImageProcessing => QueueConfig {
                concurrency: 2,
                max_attempts: 3,
                backoff_base: Duration::from_secs(5),
                rate_per_sec: None,
                timeout: Duration::from_secs(300),
            },
            QueueName::CreditScore => QueueConfig {
                concurrency: 3,
                max_attempts: 3,
                backoff_base: Duration::from_secs(5),
                rate_per_sec: None,
                timeout: Duration::from_secs(90),
            },
            QueueName::OrderRouting => QueueConfig {
                concurrency: 3,
                max_attempts: 3,
                backoff_base: Duration::from_secs(5),
                rate_per_sec: None,
                timeout: Duration::from_secs(60),
            },
            QueueName::PaymentReminders => QueueConfig {
                concurrency: 5,
                max_attempts: 3,
                backoff_base: Duration::from_secs(5),
                rate_per_sec: None,
                timeout: Duration::from_secs(30),
            },
            QueueName::ReportGeneration => QueueConfig {
                concurrency: 1,
                max_attempts: 3,
                backoff_base: Duration::from_secs(5),
                rate_per_sec: None,
                timeout: Duration::from_secs(600),
            },
        }
    }
}

/// Typed job payloads. The `kind` tag keeps stored jobs readable and lets
/// old payload shapes fail loudly instead of being misrouted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    ProcessOrder {
        session_id: Uuid,
        retailer_id: Uuid,
    },
    SendWhatsApp {
        to_phone: String,
        template: String,
        variables: Vec<String>,
        idempotency_key: Option<String>,
    },
    ProcessImage {
        upload_id: Uuid,
    },
    RecomputeCreditScore {
        retailer_id: Uuid,
    },
    RouteOrder {
        order_id: Uuid,
        exclude_vendors: Vec<Uuid>,
        attempt: u32,
    },
    PaymentReminder {
        order_id: Uuid,
    },
    GenerateReport {
        report: String,
    },
}

impl JobPayload {
    /// The queue this payload belongs on.
    pub fn queue(&self) -> QueueName {
        match self {
            JobPayload::ProcessOrder { .. } => QueueName::OrderProcessing,
            JobPayload::SendWhatsApp { .. } => QueueName::WhatsAppMessages,
            JobPayload::ProcessImage { .. } => QueueName::ImageProcessing,
            JobPayload::RecomputeCreditScore { .. } => QueueName::CreditScore,
            JobPayload::RouteOrder { .. } => QueueName::OrderRouting,
            JobPayload::PaymentReminder { .. } => QueueName::PaymentReminders,
            JobPayload::GenerateReport { .. } => QueueName::ReportGeneration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub queue: QueueName,
    pub payload: JobPayload,
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: payload.queue(),
            payload,
            attempt: 1,
            enqueued_at: Utc::now(),
        }
    }
}

/// A job's final resting place after exhausting retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub job: Job,
    pub original_queue: QueueName,
    pub last_error: String,
    pub attempt_count: u32,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_table_matches_policy() {
        let wa = QueueName::WhatsAppMessages.config();
        assert_eq!(wa.concurrency, 10);
        assert_eq!(wa.max_attempts, 5);
        assert_eq!(wa.rate_per_sec, Some(50));
        assert_eq!(wa.timeout, Duration::from_secs(30));

        let report = QueueName::ReportGeneration.config();
        assert_eq!(report.concurrency, 1);
        assert_eq!(report.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_payload_routes_to_queue() {
        let payload = JobPayload::PaymentReminder {
            order_id: Uuid::new_v4(),
        };
        assert_eq!(payload.queue(), QueueName::PaymentReminders);
        assert_eq!(Job::new(payload).queue, QueueName::PaymentReminders);
    }

    #[test]
    fn test_payload_roundtrips_through_json() {
        let payload = JobPayload::RouteOrder {
            order_id: Uuid::new_v4(),
            exclude_vendors: vec![Uuid::new_v4()],
            attempt: 2,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"route_order\""));
        let back: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.queue(), QueueName::OrderRouting);
    }

    #[test]
    fn test_queue_name_roundtrip() {
        for queue in QueueName::ALL {
            assert_eq!(queue.to_string().parse::<QueueName>().unwrap(), queue);
        }
    }
}
