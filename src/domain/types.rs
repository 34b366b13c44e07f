use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type RetailerId = Uuid;
pub type VendorId = Uuid;
pub type ProductId = Uuid;
pub type OrderId = Uuid;
pub type LedgerEntryId = Uuid;

/// Lifecycle status of an order.
///
/// Transitions follow a fixed graph (see `domain::order::status`); there is
/// deliberately no `Failed` variant. Internal failures keep the order in
/// `Pending` and hand it to the recovery worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Accepted,
    Dispatched,
    Delivered,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Accepted => write!(f, "ACCEPTED"),
            OrderStatus::Dispatched => write!(f, "DISPATCHED"),
            OrderStatus::Delivered => write!(f, "DELIVERED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "ACCEPTED" => Ok(OrderStatus::Accepted),
            "DISPATCHED" => Ok(OrderStatus::Dispatched),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("Unknown order status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "UNPAID"),
            PaymentStatus::Partial => write!(f, "PARTIAL"),
            PaymentStatus::Paid => write!(f, "PAID"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(PaymentStatus::Unpaid),
            "PARTIAL" => Ok(PaymentStatus::Partial),
            "PAID" => Ok(PaymentStatus::Paid),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// Ledger entry kind. Credits increase the retailer's outstanding debt,
/// debits reduce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    OrderCredit,
    PaymentDebit,
    AdjustmentCredit,
    AdjustmentDebit,
}

impl TransactionType {
    /// Whether this entry type increases outstanding debt.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionType::OrderCredit | TransactionType::AdjustmentCredit
        )
    }

    /// Sign applied to the amount when accumulating the running balance.
    pub fn sign(&self) -> i8 {
        if self.is_credit() { 1 } else { -1 }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::OrderCredit => write!(f, "ORDER_CREDIT"),
            TransactionType::PaymentDebit => write!(f, "PAYMENT_DEBIT"),
            TransactionType::AdjustmentCredit => write!(f, "ADJUSTMENT_CREDIT"),
            TransactionType::AdjustmentDebit => write!(f, "ADJUSTMENT_DEBIT"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORDER_CREDIT" => Ok(TransactionType::OrderCredit),
            "PAYMENT_DEBIT" => Ok(TransactionType::PaymentDebit),
            "ADJUSTMENT_CREDIT" => Ok(TransactionType::AdjustmentCredit),
            "ADJUSTMENT_DEBIT" => Ok(TransactionType::AdjustmentDebit),
            other => Err(format!("Unknown transaction type: {}", other)),
        }
    }
}

/// Where a raw order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    Text,
    WhatsApp,
    Ocr,
    Voice,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Text => write!(f, "text"),
            InputSource::WhatsApp => write!(f, "whatsapp"),
            InputSource::Ocr => write!(f, "ocr"),
            InputSource::Voice => write!(f, "voice"),
        }
    }
}

impl FromStr for InputSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(InputSource::Text),
            "whatsapp" => Ok(InputSource::WhatsApp),
            "ocr" => Ok(InputSource::Ocr),
            "voice" => Ok(InputSource::Voice),
            other => Err(format!("Unknown input source: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookStatus::Pending => write!(f, "pending"),
            WebhookStatus::Processing => write!(f, "processing"),
            WebhookStatus::Completed => write!(f, "completed"),
            WebhookStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for WebhookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WebhookStatus::Pending),
            "processing" => Ok(WebhookStatus::Processing),
            "completed" => Ok(WebhookStatus::Completed),
            "failed" => Ok(WebhookStatus::Failed),
            other => Err(format!("Unknown webhook status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    InProgress,
    Completed,
    Failed,
    Paused,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::InProgress => write!(f, "in_progress"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Paused => write!(f, "paused"),
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(WorkflowStatus::InProgress),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            "paused" => Ok(WorkflowStatus::Paused),
            other => Err(format!("Unknown workflow status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryStatus {
    Pending,
    InProgress,
    Recovered,
    Failed,
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStatus::Pending => write!(f, "pending"),
            RecoveryStatus::InProgress => write!(f, "in_progress"),
            RecoveryStatus::Recovered => write!(f, "recovered"),
            RecoveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RecoveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecoveryStatus::Pending),
            "in_progress" => Ok(RecoveryStatus::InProgress),
            "recovered" => Ok(RecoveryStatus::Recovered),
            "failed" => Ok(RecoveryStatus::Failed),
            other => Err(format!("Unknown recovery status: {}", other)),
        }
    }
}

/// Status of a single vendor assignment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Timeout,
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Pending => write!(f, "pending"),
            AssignmentStatus::InProgress => write!(f, "in_progress"),
            AssignmentStatus::Success => write!(f, "success"),
            AssignmentStatus::Failed => write!(f, "failed"),
            AssignmentStatus::Timeout => write!(f, "timeout"),
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssignmentStatus::Pending),
            "in_progress" => Ok(AssignmentStatus::InProgress),
            "success" => Ok(AssignmentStatus::Success),
            "failed" => Ok(AssignmentStatus::Failed),
            "timeout" => Ok(AssignmentStatus::Timeout),
            other => Err(format!("Unknown assignment status: {}", other)),
        }
    }
}

/// Reason an order was refused before it was ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    CreditLimitExceeded,
    OverdueBlock,
    AccountInactive,
    AccountNotApproved,
    HighRiskAccount,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::CreditLimitExceeded => write!(f, "CREDIT_LIMIT_EXCEEDED"),
            RejectionReason::OverdueBlock => write!(f, "OVERDUE_BLOCK"),
            RejectionReason::AccountInactive => write!(f, "ACCOUNT_INACTIVE"),
            RejectionReason::AccountNotApproved => write!(f, "ACCOUNT_NOT_APPROVED"),
            RejectionReason::HighRiskAccount => write!(f, "HIGH_RISK_ACCOUNT"),
        }
    }
}

impl FromStr for RejectionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT_LIMIT_EXCEEDED" => Ok(RejectionReason::CreditLimitExceeded),
            "OVERDUE_BLOCK" => Ok(RejectionReason::OverdueBlock),
            "ACCOUNT_INACTIVE" => Ok(RejectionReason::AccountInactive),
            "ACCOUNT_NOT_APPROVED" => Ok(RejectionReason::AccountNotApproved),
            "HIGH_RISK_ACCOUNT" => Ok(RejectionReason::HighRiskAccount),
            other => Err(format!("Unknown rejection reason: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_signs() {
        assert_eq!(TransactionType::OrderCredit.sign(), 1);
        assert_eq!(TransactionType::AdjustmentCredit.sign(), 1);
        assert_eq!(TransactionType::PaymentDebit.sign(), -1);
        assert_eq!(TransactionType::AdjustmentDebit.sign(), -1);
    }

    #[test]
    fn test_order_status_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Accepted,
            OrderStatus::Dispatched,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!("FAILED".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_input_source_case_insensitive() {
        assert_eq!("WhatsApp".parse::<InputSource>().unwrap(), InputSource::WhatsApp);
        assert_eq!("OCR".parse::<InputSource>().unwrap(), InputSource::Ocr);
    }
}
