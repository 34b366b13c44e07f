//! Credit-validated order creation above the atomic writer: idempotency
//! replay, rejection bookkeeping, workflow state, confirmation dispatch
//! and the first vendor assignment.

use crate::application::messaging;
use crate::application::routing_service::RoutingService;
use crate::domain::events::MarketplaceEvent;
use crate::domain::order::{NewOrder, Order};
use crate::domain::records::RejectedOrder;
use crate::domain::repositories::{
    AtomicOrderWriter, CreateOrderResult, CreditRejection, IdempotencyRepository, KeyClaim,
    RejectedOrderRepository, RetailerRepository, WorkflowRepository,
};
use crate::domain::types::RejectionReason;
use crate::domain::workflow::{IdempotencyKey, WorkflowState, WorkflowType};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::queue::{JobFabric, JobPayload};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// The externally visible response payload, stored against the
/// idempotency key so replays return identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: String,
    pub status: String,
}

#[derive(Debug)]
pub enum PlaceOrderOutcome {
    Created { order: Order, response: String },
    Replayed { response: String },
    Rejected(CreditRejection),
}

pub struct OrderService {
    writer: Arc<dyn AtomicOrderWriter>,
    idempotency: Arc<dyn IdempotencyRepository>,
    rejected: Arc<dyn RejectedOrderRepository>,
    retailers: Arc<dyn RetailerRepository>,
    workflows: Arc<dyn WorkflowRepository>,
    routing: Arc<RoutingService>,
    fabric: Arc<JobFabric>,
    events: EventBus,
    metrics: Metrics,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        writer: Arc<dyn AtomicOrderWriter>,
        idempotency: Arc<dyn IdempotencyRepository>,
        rejected: Arc<dyn RejectedOrderRepository>,
        retailers: Arc<dyn RetailerRepository>,
        workflows: Arc<dyn WorkflowRepository>,
        routing: Arc<RoutingService>,
        fabric: Arc<JobFabric>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            writer,
            idempotency,
            rejected,
            retailers,
            workflows,
            routing,
            fabric,
            events,
            metrics,
        }
    }

    /// Creates the order, or replays the stored response for a duplicate
    /// idempotency key, or returns the typed credit rejection.
    pub async fn place_order(
        &self,
        new_order: NewOrder,
        raw_input: &str,
    ) -> Result<PlaceOrderOutcome> {
        let request_body = request_fingerprint(&new_order);

        if let Some(key) = new_order.idempotency_key.clone() {
            let claim = self
                .idempotency
                .claim(&IdempotencyKey::begin(
                    &key,
                    "order_creation",
                    request_body.as_bytes(),
                ))
                .await?;
            if let KeyClaim::Existing(existing) = claim {
                if !existing.matches_request(request_body.as_bytes()) {
                    anyhow::bail!(
                        "Idempotency key {} was already used with a different request",
                        key
                    );
                }
                let response = self.await_stored_response(&key).await?;
                info!(key = %key, "Idempotent replay of order creation");
                return Ok(PlaceOrderOutcome::Replayed { response });
            }
        }

        match self.writer.create_order(&new_order).await? {
            CreateOrderResult::Created {
                order,
                ledger_entry,
            } => {
                self.metrics.orders_total.with_label_values(&["created"]).inc();
                self.metrics
                    .ledger_entries_total
                    .with_label_values(&[&ledger_entry.transaction_type.to_string()])
                    .inc();

                let response = serde_json::to_string(&OrderReceipt {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    total: order.total.to_string(),
                    status: order.status.to_string(),
                })?;
                if let Some(key) = &new_order.idempotency_key {
                    self.idempotency.complete(key, &response).await?;
                }

                self.events.publish(&MarketplaceEvent::OrderCreated {
                    order_id: order.id,
                    retailer_id: order.retailer_id,
                    vendor_id: order.vendor_id,
                    total: order.total,
                });

                self.start_post_creation_workflow(&order).await?;

                Ok(PlaceOrderOutcome::Created { order, response })
            }
            CreateOrderResult::Rejected(rejection) => {
                self.metrics.orders_total.with_label_values(&["rejected"]).inc();
                self.record_rejection(&new_order, &rejection, raw_input)
                    .await?;

                let response = serde_json::to_string(&serde_json::json!({
                    "rejected": rejection.reason.to_string(),
                    "available_credit": rejection.available_credit.to_string(),
                    "shortfall": rejection.shortfall.map(|s| s.to_string()),
                }))?;
                if let Some(key) = &new_order.idempotency_key {
                    self.idempotency.complete(key, &response).await?;
                }

                Ok(PlaceOrderOutcome::Rejected(rejection))
            }
        }
    }

    /// Post-commit work, tracked as an order_creation workflow so a crash
    /// before the confirmation job is enqueued resumes from that step.
    async fn start_post_creation_workflow(&self, order: &Order) -> Result<()> {
        let mut workflow = WorkflowState::begin(WorkflowType::OrderCreation, order.id.to_string());
        workflow
            .advance_to(
                "send_confirmation",
                serde_json::json!({ "order_number": order.order_number }),
                Utc::now(),
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        self.workflows.insert(&workflow).await?;

        self.routing.assign_vendor(order, order.vendor_id, 1).await?;
        self.submit_confirmation(order).await?;

        workflow.complete(Utc::now());
        self.workflows.save(&workflow).await?;
        Ok(())
    }

    /// Enqueues the buyer confirmation. Guarded by a per-order
    /// idempotency key so resume paths send it exactly once.
    pub async fn submit_confirmation(&self, order: &Order) -> Result<()> {
        let retailer = self
            .retailers
            .find(order.retailer_id)
            .await?
            .with_context(|| format!("Retailer {} not found", order.retailer_id))?;

        let summary = order
            .line_items
            .iter()
            .map(|li| format!("{} {} {}", li.quantity, li.unit, li.product_name))
            .collect::<Vec<_>>()
            .join("; ");

        self.fabric
            .submit(JobPayload::SendWhatsApp {
                to_phone: retailer.phone,
                template: messaging::TPL_ORDER_CONFIRMATION.to_string(),
                variables: messaging::order_confirmation_vars(
                    &order.order_number,
                    &summary,
                    order.total,
                ),
                idempotency_key: Some(format!("confirm-{}", order.id)),
            })
            .await?;
        Ok(())
    }

    async fn record_rejection(
        &self,
        new_order: &NewOrder,
        rejection: &CreditRejection,
        raw_input: &str,
    ) -> Result<()> {
        warn!(
            retailer_id = %new_order.retailer_id,
            reason = %rejection.reason,
            "Recording order rejection"
        );

        self.rejected
            .insert(&RejectedOrder {
                id: Uuid::new_v4(),
                retailer_id: new_order.retailer_id,
                reason: rejection.reason,
                requested_amount: new_order.total,
                available_credit: rejection.available_credit,
                shortfall: rejection.shortfall,
                raw_input: raw_input.to_string(),
                reviewed: false,
                created_at: Utc::now(),
            })
            .await?;

        self.events.publish(&MarketplaceEvent::OrderRejected {
            retailer_id: new_order.retailer_id,
            requested_amount: new_order.total,
            reason: rejection.reason.to_string(),
        });

        // WhatsApp-safe explanation through the outbound queue
        if let Some(retailer) = self.retailers.find(new_order.retailer_id).await? {
            let (template, variables) = match rejection.reason {
                RejectionReason::CreditLimitExceeded => (
                    messaging::TPL_ORDER_REJECTED_CREDIT,
                    messaging::credit_rejection_vars(rejection.available_credit),
                ),
                _ => (messaging::TPL_ORDER_REJECTED_GENERIC, vec![]),
            };
            self.fabric
                .submit(JobPayload::SendWhatsApp {
                    to_phone: retailer.phone,
                    template: template.to_string(),
                    variables,
                    idempotency_key: None,
                })
                .await?;
        }
        Ok(())
    }

    /// Short poll for a concurrent submission's stored response.
    async fn await_stored_response(&self, key: &str) -> Result<String> {
        for _ in 0..20 {
            if let Some(stored) = self.idempotency.find(key).await? {
                if let Some(response) = stored.response_payload {
                    return Ok(response);
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        anyhow::bail!(
            "Duplicate submission for key {} is still processing; retry shortly",
            key
        )
    }
}

/// Canonical request body for idempotency hashing: retailer, vendor and
/// the exact line items.
fn request_fingerprint(new_order: &NewOrder) -> String {
    let lines: Vec<String> = new_order
        .line_items
        .iter()
        .map(|li| format!("{}:{}:{}", li.product_id, li.quantity, li.unit_price))
        .collect();
    format!(
        "{}|{}|{}|{}",
        new_order.retailer_id,
        new_order.vendor_id,
        new_order.total,
        lines.join(",")
    )
}
