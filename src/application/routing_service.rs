//! Vendor selection orchestration: candidate assembly, decision
//! persistence, deadline-driven assignment and reassignment.

use crate::config::RoutingEnvConfig;
use crate::domain::events::MarketplaceEvent;
use crate::domain::order::Order;
use crate::domain::party::Retailer;
use crate::domain::records::{AdminNotification, NotificationKind};
use crate::domain::repositories::{
    AssignmentRepository, DecisionLogRepository, NotificationRepository, OrderRepository,
    RecoveryRepository, RetailerRepository, VendorRepository,
};
use crate::domain::routing::{
    select_vendor, RetailerLocation, SelectionDecision, VendorCandidate,
};
use crate::domain::types::{AssignmentStatus, OrderId, ProductId, RecoveryStatus, VendorId};
use crate::domain::workflow::VendorAssignmentRetry;
use crate::infrastructure::event_bus::EventBus;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Capacity projection staleness bound.
const LOAD_CACHE_TTL_SECS: u64 = 5;

pub struct RoutingService {
    vendors: Arc<dyn VendorRepository>,
    retailers: Arc<dyn RetailerRepository>,
    orders: Arc<dyn OrderRepository>,
    decisions: Arc<dyn DecisionLogRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    recovery: Arc<dyn RecoveryRepository>,
    notifications: Arc<dyn NotificationRepository>,
    events: EventBus,
    config: RoutingEnvConfig,
    load_cache: Mutex<Option<(Instant, HashMap<VendorId, (u32, u32)>)>>,
}

impl RoutingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vendors: Arc<dyn VendorRepository>,
        retailers: Arc<dyn RetailerRepository>,
        orders: Arc<dyn OrderRepository>,
        decisions: Arc<dyn DecisionLogRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        recovery: Arc<dyn RecoveryRepository>,
        notifications: Arc<dyn NotificationRepository>,
        events: EventBus,
        config: RoutingEnvConfig,
    ) -> Self {
        Self {
            vendors,
            retailers,
            orders,
            decisions,
            assignments,
            recovery,
            notifications,
            events,
            config,
            load_cache: Mutex::new(None),
        }
    }

    /// Eventually consistent load projection, cached a few seconds.
    async fn load_counts(&self) -> Result<HashMap<VendorId, (u32, u32)>> {
        let mut cache = self.load_cache.lock().await;
        if let Some((at, counts)) = cache.as_ref() {
            if at.elapsed().as_secs() < LOAD_CACHE_TTL_SECS {
                return Ok(counts.clone());
            }
        }
        let counts = self.orders.load_counts(&[]).await?;
        *cache = Some((Instant::now(), counts.clone()));
        Ok(counts)
    }

    async fn candidates_for(
        &self,
        product_id: ProductId,
        _quantity: Decimal,
    ) -> Result<Vec<VendorCandidate>> {
        let listings = self.vendors.list_for_product(product_id).await?;
        if listings.is_empty() {
            return Ok(Vec::new());
        }

        let loads = self.load_counts().await?;
        let shares = self.orders.vendor_share_30d(product_id).await?;
        let available: Vec<&Decimal> = listings
            .iter()
            .filter(|(_, l)| l.is_available)
            .map(|(_, l)| &l.price)
            .collect();
        let market_avg = if available.is_empty() {
            Decimal::ZERO
        } else {
            available.iter().copied().sum::<Decimal>() / Decimal::from(available.len())
        };

        Ok(listings
            .into_iter()
            .map(|(vendor, listing)| {
                let (active, pending) = loads.get(&vendor.id).copied().unwrap_or((0, 0));
                let market_share_30d = shares.get(&vendor.id).copied().unwrap_or(0.0);
                VendorCandidate {
                    vendor,
                    listing,
                    active_orders: active,
                    pending_orders: pending,
                    market_share_30d,
                    market_avg_price: market_avg,
                }
            })
            .collect())
    }

    /// Runs one selection and persists the decision log row.
    pub async fn select_for_product(
        &self,
        product_id: ProductId,
        quantity: Decimal,
        retailer: &Retailer,
        exclude: &[VendorId],
        order_id: Option<OrderId>,
    ) -> Result<SelectionDecision> {
        let candidates = self.candidates_for(product_id, quantity).await?;
        let last_vendor = self.decisions.last_vendor_for_product(product_id).await?;
        let location = RetailerLocation {
            delivery_zone: retailer.delivery_zone.clone(),
            district: retailer.district.clone(),
        };

        let mut decision = select_vendor(
            &candidates,
            product_id,
            quantity,
            &location,
            exclude,
            last_vendor,
            &self.config.to_routing_config(),
            Utc::now(),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?;
        decision.order_id = order_id;

        self.decisions.insert(&decision).await?;
        info!(
            product_id = %product_id,
            vendor_id = %decision.chosen_vendor_id,
            reason = %decision.reason,
            "Vendor selected"
        );
        Ok(decision)
    }

    /// Records an assignment attempt with its response deadline.
    pub async fn assign_vendor(
        &self,
        order: &Order,
        vendor_id: VendorId,
        attempt_number: u32,
    ) -> Result<VendorAssignmentRetry> {
        let deadline = Utc::now() + Duration::hours(self.config.vendor_response_deadline_hours);
        let retry = VendorAssignmentRetry::assign(order.id, vendor_id, attempt_number, deadline);
        self.assignments.insert(&retry).await?;

        self.events.publish(&MarketplaceEvent::VendorAssigned {
            order_id: order.id,
            vendor_id,
            attempt: attempt_number,
        });
        Ok(retry)
    }

    /// Vendor accepted: close the assignment and confirm the order.
    pub async fn accept_assignment(&self, order_id: OrderId, vendor_id: VendorId) -> Result<Order> {
        let mut retry = self
            .assignments
            .latest_for_order(order_id)
            .await?
            .with_context(|| format!("No assignment for order {}", order_id))?;
        anyhow::ensure!(
            retry.vendor_id == vendor_id,
            "Assignment for order {} belongs to a different vendor",
            order_id
        );

        retry.status = AssignmentStatus::Success;
        self.assignments.save(&retry).await?;

        let order = self
            .orders
            .transition_status(
                order_id,
                crate::domain::types::OrderStatus::Confirmed,
                "vendor",
                Some("vendor accepted assignment"),
            )
            .await?;
        Ok(order)
    }

    /// Vendor declined: close the attempt and reroute immediately.
    pub async fn reject_assignment(
        &self,
        order_id: OrderId,
        vendor_id: VendorId,
        reason: &str,
    ) -> Result<Option<VendorAssignmentRetry>> {
        let mut retry = self
            .assignments
            .latest_for_order(order_id)
            .await?
            .with_context(|| format!("No assignment for order {}", order_id))?;
        anyhow::ensure!(
            retry.vendor_id == vendor_id,
            "Assignment for order {} belongs to a different vendor",
            order_id
        );

        retry.status = AssignmentStatus::Failed;
        retry.failure_reason = Some(reason.to_string());
        self.assignments.save(&retry).await?;

        self.reassign(order_id).await
    }

    /// Deadline elapsed without an accept: mark the timeout and reroute.
    pub async fn handle_timeout(&self, retry: &VendorAssignmentRetry) -> Result<Option<VendorAssignmentRetry>> {
        let mut timed_out = retry.clone();
        timed_out.status = AssignmentStatus::Timeout;
        timed_out.failure_reason = Some("response deadline elapsed".to_string());
        self.assignments.save(&timed_out).await?;

        self.events.publish(&MarketplaceEvent::VendorTimedOut {
            order_id: retry.order_id,
            vendor_id: retry.vendor_id,
            attempt: retry.attempt_number,
        });

        self.reassign(retry.order_id).await
    }

    /// Re-runs selection with every previously tried vendor excluded. The
    /// order stays PENDING throughout; only after exhausting attempts is
    /// it escalated for manual routing.
    pub async fn reassign(&self, order_id: OrderId) -> Result<Option<VendorAssignmentRetry>> {
        let order = self
            .orders
            .find(order_id)
            .await?
            .with_context(|| format!("Order {} not found", order_id))?;
        let tried = self.assignments.vendors_tried(order_id).await?;
        let attempt_number = self
            .assignments
            .latest_for_order(order_id)
            .await?
            .map(|r| r.attempt_number + 1)
            .unwrap_or(1);

        if attempt_number > self.config.max_vendor_attempts {
            return self.escalate(&order).await.map(|_| None);
        }

        // Every line on the order ships from one vendor; the first
        // product anchors re-selection.
        let product_id = order
            .line_items
            .first()
            .map(|li| li.product_id)
            .context("Order has no line items")?;

        let retailer = self
            .retailers
            .find(order.retailer_id)
            .await?
            .with_context(|| format!("Retailer {} not found", order.retailer_id))?;

        match self
            .select_for_product(product_id, total_quantity(&order), &retailer, &tried, Some(order_id))
            .await
        {
            Ok(decision) => {
                self.orders
                    .set_vendor(order_id, decision.chosen_vendor_id)
                    .await?;
                let retry = self
                    .assign_vendor(&order, decision.chosen_vendor_id, attempt_number)
                    .await?;
                info!(
                    order_id = %order_id,
                    vendor_id = %decision.chosen_vendor_id,
                    attempt = attempt_number,
                    "Order reassigned"
                );
                Ok(Some(retry))
            }
            Err(e) => {
                warn!(order_id = %order_id, "Reassignment found no vendor: {:#}", e);
                // Stay PENDING; the recovery sweep will retry.
                Ok(None)
            }
        }
    }

    /// Attempts exhausted: notify admins and mark recovery failed. The
    /// order itself remains PENDING for manual routing, never FAILED.
    async fn escalate(&self, order: &Order) -> Result<()> {
        warn!(
            order_id = %order.id,
            attempts = self.config.max_vendor_attempts,
            "Vendor assignment attempts exhausted, escalating to manual routing"
        );
        self.notifications
            .insert(&AdminNotification::raise(
                NotificationKind::ManualIntervention,
                format!("Order {} needs manual vendor routing", order.order_number),
                format!(
                    "All {} assignment attempts expired or were rejected. The order remains PENDING.",
                    self.config.max_vendor_attempts
                ),
            ))
            .await?;

        if let Some(mut recovery) = self.recovery.find_by_order(order.id).await? {
            recovery.recovery_status = RecoveryStatus::Failed;
            self.recovery.save(&recovery).await?;
        }
        Ok(())
    }
}

fn total_quantity(order: &Order) -> Decimal {
    order.line_items.iter().map(|li| li.quantity).sum()
}
