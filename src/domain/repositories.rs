//! Repository trait seams between business logic and storage.
//!
//! SQLite implementations live under `infrastructure::persistence`. The
//! atomic order writer is deliberately its own trait: the §credit rules,
//! order insert, ledger append and retailer balance update must commit or
//! roll back as one transaction, so one implementation owns that unit.

use crate::domain::analytics::{MarketAnalytics, PriceHistoryEvent};
use crate::domain::catalog::{Product, VendorProduct};
use crate::domain::ledger::CreditLedgerEntry;
use crate::domain::order::{NewOrder, Order};
use crate::domain::parser::ParseSession;
use crate::domain::party::{Retailer, Vendor};
use crate::domain::records::{
    AdminNotification, AuditLogEntry, OrderStatusLogEntry, PriceAlert, RejectedOrder,
    UploadedOrder,
};
use crate::domain::routing::SelectionDecision;
use crate::domain::types::{
    OrderId, OrderStatus, ProductId, RejectionReason, RetailerId, TransactionType, VendorId,
};
use crate::domain::workflow::{
    IdempotencyKey, OrderRecoveryState, VendorAssignmentRetry, WebhookEvent, WorkflowState,
    WorkflowType,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait RetailerRepository: Send + Sync {
    async fn find(&self, id: RetailerId) -> Result<Option<Retailer>>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Retailer>>;
    async fn insert(&self, retailer: &Retailer) -> Result<()>;
    /// Admin path: adjust the credit limit, keeping the invariant
    /// `available = limit - outstanding`. Audit logging is the caller's job.
    async fn set_credit_limit(&self, id: RetailerId, new_limit: Decimal) -> Result<()>;
    async fn set_risk_score(&self, id: RetailerId, score: u8) -> Result<()>;
}

#[async_trait]
pub trait VendorRepository: Send + Sync {
    async fn find(&self, id: VendorId) -> Result<Option<Vendor>>;
    async fn insert(&self, vendor: &Vendor, listings: &[VendorProduct]) -> Result<()>;
    /// Vendors listing a product, with their listings.
    async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<(Vendor, VendorProduct)>>;
    async fn listings_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<VendorProduct>>;
    async fn set_reliability(&self, id: VendorId, score: Decimal) -> Result<()>;
    /// Updates a listing price, returning the previous price.
    async fn set_price(
        &self,
        vendor_id: VendorId,
        product_id: ProductId,
        new_price: Decimal,
    ) -> Result<Decimal>;
    async fn list_ids(&self) -> Result<Vec<VendorId>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find(&self, id: ProductId) -> Result<Option<Product>>;
    async fn list_all(&self) -> Result<Vec<Product>>;
    async fn insert(&self, product: &Product) -> Result<()>;
    async fn list_ids(&self) -> Result<Vec<ProductId>>;
}

/// Typed rejection carried out of the atomic writer.
#[derive(Debug, Clone)]
pub struct CreditRejection {
    pub reason: RejectionReason,
    pub shortfall: Option<Decimal>,
    pub available_credit: Decimal,
}

#[derive(Debug, Clone)]
pub enum CreateOrderResult {
    Created {
        order: Order,
        ledger_entry: CreditLedgerEntry,
    },
    Rejected(CreditRejection),
}

/// The single-transaction order write path (§credit validation, order +
/// items insert, ledger append, retailer debt update, status log).
#[async_trait]
pub trait AtomicOrderWriter: Send + Sync {
    async fn create_order(&self, new_order: &NewOrder) -> Result<CreateOrderResult>;
}

/// An order together with how long it has sat in its current status.
#[derive(Debug, Clone)]
pub struct StuckOrderRow {
    pub order: Order,
    pub in_status_since: DateTime<Utc>,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find(&self, id: OrderId) -> Result<Option<Order>>;
    /// Validates against the status graph, updates the row and appends a
    /// status log entry in one transaction.
    async fn transition_status(
        &self,
        id: OrderId,
        to: OrderStatus,
        actor: &str,
        note: Option<&str>,
    ) -> Result<Order>;
    /// Reassignment: points the order at a new vendor. Exactly one update
    /// per reassignment attempt.
    async fn set_vendor(&self, id: OrderId, vendor_id: VendorId) -> Result<()>;
    async fn record_payment_state(
        &self,
        id: OrderId,
        amount_paid: Decimal,
        payment_status: crate::domain::types::PaymentStatus,
    ) -> Result<()>;
    /// Active/pending load per vendor, for the capacity projection.
    async fn load_counts(&self, vendor_ids: &[VendorId]) -> Result<HashMap<VendorId, (u32, u32)>>;
    /// 30-day share of order count per vendor for a product.
    async fn vendor_share_30d(&self, product_id: ProductId) -> Result<HashMap<VendorId, f64>>;
    /// Orders sitting in a non-terminal status, with when they entered it.
    async fn non_terminal_orders(&self) -> Result<Vec<StuckOrderRow>>;
    /// Assignment/fulfilment counts feeding the reliability recompute.
    async fn vendor_event_counts(
        &self,
        vendor_id: VendorId,
        window_days: i64,
    ) -> Result<crate::domain::analytics::VendorEventCounts>;
    async fn list_unpaid_delivered(&self) -> Result<Vec<Order>>;
    async fn list_for_retailer(&self, retailer_id: RetailerId) -> Result<Vec<Order>>;
    async fn status_log(&self, id: OrderId) -> Result<Vec<OrderStatusLogEntry>>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Appends an entry and updates the retailer's outstanding debt and
    /// available credit in the same transaction.
    async fn append(
        &self,
        retailer_id: RetailerId,
        vendor_id: VendorId,
        transaction_type: TransactionType,
        amount: Decimal,
        linked_order_id: Option<OrderId>,
        note: Option<&str>,
    ) -> Result<CreditLedgerEntry>;
    /// Inserts the compensating entry for `entry_id` and rolls the
    /// retailer balances back accordingly.
    async fn reverse(&self, entry_id: Uuid, reason: &str) -> Result<CreditLedgerEntry>;
    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<CreditLedgerEntry>>;
    /// Full (retailer, vendor) chain ordered by created_at.
    async fn chain(&self, retailer_id: RetailerId, vendor_id: VendorId)
        -> Result<Vec<CreditLedgerEntry>>;
    /// Authoritative balance: the latest row's running balance.
    async fn latest_balance(&self, retailer_id: RetailerId, vendor_id: VendorId)
        -> Result<Decimal>;
    /// Payment-debit entries for a retailer across all vendors, oldest
    /// first; feeds the punctuality metrics.
    async fn payments_for_retailer(&self, retailer_id: RetailerId)
        -> Result<Vec<CreditLedgerEntry>>;
}

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn insert(&self, event: &WebhookEvent) -> Result<()>;
    async fn save(&self, event: &WebhookEvent) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<WebhookEvent>>;
    /// Pending events whose next attempt is due.
    async fn due_pending(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<WebhookEvent>>;
    /// Events stuck in `processing` past the threshold.
    async fn stuck(&self, now: DateTime<Utc>, threshold: Duration) -> Result<Vec<WebhookEvent>>;
    async fn counts_by_status(&self) -> Result<HashMap<String, u64>>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn insert(&self, state: &WorkflowState) -> Result<()>;
    async fn save(&self, state: &WorkflowState) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<WorkflowState>>;
    async fn find_by_entity(
        &self,
        workflow_type: WorkflowType,
        entity_ref: &str,
    ) -> Result<Option<WorkflowState>>;
    async fn stale(&self, now: DateTime<Utc>, heartbeat_timeout: Duration)
        -> Result<Vec<WorkflowState>>;
}

/// Outcome of claiming an idempotency key.
#[derive(Debug, Clone)]
pub enum KeyClaim {
    /// This caller owns the key; run the operation.
    Acquired,
    /// Another submission already holds it.
    Existing(IdempotencyKey),
}

#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Claims the key via the unique constraint.
    async fn claim(&self, key: &IdempotencyKey) -> Result<KeyClaim>;
    async fn find(&self, key: &str) -> Result<Option<IdempotencyKey>>;
    async fn complete(&self, key: &str, response_payload: &str) -> Result<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn insert(&self, retry: &VendorAssignmentRetry) -> Result<()>;
    async fn save(&self, retry: &VendorAssignmentRetry) -> Result<()>;
    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<VendorAssignmentRetry>>;
    async fn latest_for_order(&self, order_id: OrderId) -> Result<Option<VendorAssignmentRetry>>;
    async fn vendors_tried(&self, order_id: OrderId) -> Result<Vec<VendorId>>;
}

#[async_trait]
pub trait RecoveryRepository: Send + Sync {
    /// Insert-or-refresh keyed by order_id (unique).
    async fn capture(&self, state: &OrderRecoveryState) -> Result<()>;
    async fn save(&self, state: &OrderRecoveryState) -> Result<()>;
    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<OrderRecoveryState>>;
    async fn pending(&self, limit: u32) -> Result<Vec<OrderRecoveryState>>;
}

#[async_trait]
pub trait DecisionLogRepository: Send + Sync {
    async fn insert(&self, decision: &SelectionDecision) -> Result<()>;
    /// Vendor chosen by the most recent decision for this product.
    async fn last_vendor_for_product(&self, product_id: ProductId) -> Result<Option<VendorId>>;
}

#[async_trait]
pub trait RejectedOrderRepository: Send + Sync {
    async fn insert(&self, rejection: &RejectedOrder) -> Result<()>;
    async fn unreviewed(&self, limit: u32) -> Result<Vec<RejectedOrder>>;
}

#[async_trait]
pub trait ParseSessionRepository: Send + Sync {
    async fn insert(&self, session: &ParseSession) -> Result<()>;
    async fn save(&self, session: &ParseSession) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<ParseSession>>;
}

#[async_trait]
pub trait PriceAnalyticsRepository: Send + Sync {
    async fn insert_history(&self, event: &PriceHistoryEvent) -> Result<()>;
    /// Oldest-first history for a product.
    async fn history_for_product(
        &self,
        product_id: ProductId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEvent>>;
    async fn store_market(&self, analytics: &MarketAnalytics) -> Result<()>;
    async fn latest_market(&self, product_id: ProductId) -> Result<Option<MarketAnalytics>>;
    async fn insert_alert(&self, alert: &PriceAlert) -> Result<()>;
}

#[async_trait]
pub trait UploadedOrderRepository: Send + Sync {
    async fn insert(&self, upload: &UploadedOrder) -> Result<()>;
    async fn save(&self, upload: &UploadedOrder) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<UploadedOrder>>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert(&self, entry: &AuditLogEntry) -> Result<()>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &AdminNotification) -> Result<()>;
    async fn unacknowledged(&self, limit: u32) -> Result<Vec<AdminNotification>>;
}
