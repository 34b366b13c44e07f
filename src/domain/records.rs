//! Secondary records: rejection log, status log, uploads, audit trail,
//! admin notifications and price alerts.

use crate::domain::analytics::AlertSeverity;
use crate::domain::types::{OrderId, OrderStatus, ProductId, RejectionReason, RetailerId, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A refused order, kept for admin review. Never blocks a retry and never
/// becomes an Order row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub id: Uuid,
    pub retailer_id: RetailerId,
    pub reason: RejectionReason,
    pub requested_amount: Decimal,
    pub available_credit: Decimal,
    pub shortfall: Option<Decimal>,
    pub raw_input: String,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

/// Every status transition appends one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusLogEntry {
    pub id: Uuid,
    pub order_id: OrderId,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    Queued,
    Processing,
    Parsed,
    Failed,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Queued => write!(f, "queued"),
            UploadStatus::Processing => write!(f, "processing"),
            UploadStatus::Parsed => write!(f, "parsed"),
            UploadStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(UploadStatus::Queued),
            "processing" => Ok(UploadStatus::Processing),
            "parsed" => Ok(UploadStatus::Parsed),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("Unknown upload status: {}", other)),
        }
    }
}

/// An order image dropped into the object store, driving the
/// image-processing queue. Polled by the uploader until parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedOrder {
    pub id: Uuid,
    pub retailer_id: RetailerId,
    pub object_key: String,
    pub status: UploadStatus,
    pub parse_session_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-initiated state changes, with old/new values for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    ManualIntervention,
    PriceAlert,
    RecoveryFailed,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::ManualIntervention => write!(f, "MANUAL_INTERVENTION"),
            NotificationKind::PriceAlert => write!(f, "PRICE_ALERT"),
            NotificationKind::RecoveryFailed => write!(f, "RECOVERY_FAILED"),
        }
    }
}

/// Raised only on recovery exhaustion or critical anomalies, never on
/// first detection or successful recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNotification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

impl AdminNotification {
    pub fn raise(kind: NotificationKind, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subject: subject.into(),
            body: body.into(),
            acknowledged: false,
            created_at: Utc::now(),
        }
    }
}

/// Severity-graded abnormal price change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: Uuid,
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub change_pct: Decimal,
    pub severity: AlertSeverity,
    pub created_at: DateTime<Utc>,
}
