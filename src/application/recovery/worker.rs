//! The recovery worker: one sweep loop with two responsibilities,
//! durability recovery (webhooks, workflows, vendor deadlines, order
//! recoveries) and self-healing of stuck orders.
//!
//! Admins hear about an order only when recovery is exhausted; first
//! detection and successful recovery stay quiet.

use crate::application::order_service::OrderService;
use crate::application::routing_service::RoutingService;
use crate::application::webhook_service::WebhookService;
use crate::config::RecoveryEnvConfig;
use crate::domain::records::{AdminNotification, NotificationKind};
use crate::domain::repositories::{
    AssignmentRepository, IdempotencyRepository, NotificationRepository, OrderRepository,
    RecoveryRepository, WorkflowRepository,
};
use crate::domain::types::{RecoveryStatus, WorkflowStatus};
use crate::domain::workflow::{stuck_action, OrderRecoveryState, StuckAction, WorkflowState, WorkflowType};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::queue::{JobFabric, JobPayload};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryDashboard {
    pub pending_webhooks: u64,
    pub failed_webhooks: u64,
    pub stale_workflows: usize,
    pub due_vendor_retries: usize,
    pub pending_recoveries: usize,
    pub stuck_orders: usize,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub webhooks_processed: u32,
    pub webhooks_repicked: u32,
    pub workflows_resumed: u32,
    pub assignments_timed_out: u32,
    pub orders_recovered: u32,
    pub stuck_actions: u32,
    pub keys_purged: u64,
}

pub struct RecoveryWorker {
    webhook_service: Arc<WebhookService>,
    workflows: Arc<dyn WorkflowRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    recovery: Arc<dyn RecoveryRepository>,
    orders: Arc<dyn OrderRepository>,
    order_service: Arc<OrderService>,
    routing: Arc<RoutingService>,
    notifications: Arc<dyn NotificationRepository>,
    idempotency: Arc<dyn IdempotencyRepository>,
    fabric: Arc<JobFabric>,
    metrics: Metrics,
    config: RecoveryEnvConfig,
}

impl RecoveryWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        webhook_service: Arc<WebhookService>,
        workflows: Arc<dyn WorkflowRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        recovery: Arc<dyn RecoveryRepository>,
        orders: Arc<dyn OrderRepository>,
        order_service: Arc<OrderService>,
        routing: Arc<RoutingService>,
        notifications: Arc<dyn NotificationRepository>,
        idempotency: Arc<dyn IdempotencyRepository>,
        fabric: Arc<JobFabric>,
        metrics: Metrics,
        config: RecoveryEnvConfig,
    ) -> Self {
        Self {
            webhook_service,
            workflows,
            assignments,
            recovery,
            orders,
            order_service,
            routing,
            notifications,
            idempotency,
            fabric,
            metrics,
            config,
        }
    }

    /// One full sweep. Each responsibility is isolated: a failing sweep
    /// step logs and moves on rather than aborting the cycle.
    pub async fn run_cycle(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.webhook_service.process_due(50).await {
            Ok(count) => report.webhooks_processed = count,
            Err(e) => error!("Webhook sweep failed: {:#}", e),
        }
        match self.webhook_service.repickup_stuck().await {
            Ok(count) => report.webhooks_repicked = count,
            Err(e) => error!("Stuck-webhook sweep failed: {:#}", e),
        }
        match self.resume_stale_workflows().await {
            Ok(count) => report.workflows_resumed = count,
            Err(e) => error!("Stale-workflow sweep failed: {:#}", e),
        }
        match self.expire_vendor_assignments().await {
            Ok(count) => report.assignments_timed_out = count,
            Err(e) => error!("Vendor-deadline sweep failed: {:#}", e),
        }
        match self.drive_pending_recoveries().await {
            Ok(count) => report.orders_recovered = count,
            Err(e) => error!("Order-recovery sweep failed: {:#}", e),
        }
        match self.heal_stuck_orders().await {
            Ok(count) => report.stuck_actions = count,
            Err(e) => error!("Self-healing sweep failed: {:#}", e),
        }
        match self.idempotency.purge_expired(Utc::now()).await {
            Ok(count) => report.keys_purged = count,
            Err(e) => error!("Idempotency purge failed: {:#}", e),
        }

        info!(
            webhooks = report.webhooks_processed,
            repicked = report.webhooks_repicked,
            workflows = report.workflows_resumed,
            timeouts = report.assignments_timed_out,
            recoveries = report.orders_recovered,
            stuck = report.stuck_actions,
            "Recovery sweep complete"
        );
        report
    }

    async fn resume_stale_workflows(&self) -> Result<u32> {
        let stale = self
            .workflows
            .stale(Utc::now(), self.config.heartbeat_timeout())
            .await?;
        let mut resumed = 0;

        for mut workflow in stale {
            warn!(
                workflow_id = %workflow.id,
                step = %workflow.current_step,
                "Resuming stale workflow"
            );
            workflow.attempts += 1;
            workflow.last_heartbeat = Utc::now();
            self.workflows.save(&workflow).await?;

            match self.resume_workflow(&workflow).await {
                Ok(()) => {
                    workflow.complete(Utc::now());
                    self.workflows.save(&workflow).await?;
                    resumed += 1;
                    self.metrics
                        .recovery_actions_total
                        .with_label_values(&["workflow_resumed"])
                        .inc();
                }
                Err(e) => {
                    error!(workflow_id = %workflow.id, "Workflow resume failed: {:#}", e);
                    if workflow.attempts >= 5 {
                        workflow.status = WorkflowStatus::Failed;
                        self.workflows.save(&workflow).await?;
                    }
                }
            }
        }
        Ok(resumed)
    }

    /// Re-drives a workflow from its last recorded step.
    async fn resume_workflow(&self, workflow: &WorkflowState) -> Result<()> {
        match workflow.workflow_type {
            WorkflowType::OrderCreation => {
                let order_id: Uuid = workflow
                    .entity_ref
                    .parse()
                    .context("Bad order ref on workflow")?;
                let order = self
                    .orders
                    .find(order_id)
                    .await?
                    .with_context(|| format!("Order {} not found", order_id))?;

                match workflow.current_step.as_str() {
                    // The write committed; only the notification is owed.
                    // The confirmation job's idempotency key makes this
                    // safe to repeat.
                    "send_confirmation" => self.order_service.submit_confirmation(&order).await,
                    "select_vendor" => {
                        self.routing.reassign(order_id).await?;
                        Ok(())
                    }
                    other => {
                        // Steps before the commit left nothing behind;
                        // the order either exists (handled above) or the
                        // buyer will retry.
                        warn!(step = other, "No resume action for step");
                        Ok(())
                    }
                }
            }
            WorkflowType::VendorRouting => {
                let order_id: Uuid = workflow
                    .entity_ref
                    .parse()
                    .context("Bad order ref on workflow")?;
                self.routing.reassign(order_id).await?;
                Ok(())
            }
            WorkflowType::PaymentSettlement => {
                // Ledger appends are transactional; a stale settlement
                // workflow means the receipt was not sent. Nothing to
                // re-drive without the payment reference.
                Ok(())
            }
        }
    }

    async fn expire_vendor_assignments(&self) -> Result<u32> {
        let expired = self.assignments.expired(Utc::now()).await?;
        let mut handled = 0;

        for retry in expired {
            info!(
                order_id = %retry.order_id,
                vendor_id = %retry.vendor_id,
                attempt = retry.attempt_number,
                "Vendor response deadline elapsed"
            );
            self.routing.handle_timeout(&retry).await?;
            self.metrics
                .recovery_actions_total
                .with_label_values(&["vendor_timeout"])
                .inc();
            handled += 1;
        }
        Ok(handled)
    }

    async fn drive_pending_recoveries(&self) -> Result<u32> {
        let pending = self.recovery.pending(20).await?;
        let mut recovered = 0;

        for mut state in pending {
            state.recovery_status = RecoveryStatus::InProgress;
            state.attempts += 1;
            self.recovery.save(&state).await?;

            if state.attempts > OrderRecoveryState::MAX_ATTEMPTS {
                self.fail_recovery(&mut state).await?;
                continue;
            }

            match self.recover_order(&state).await {
                Ok(()) => {
                    state.recovery_status = RecoveryStatus::Recovered;
                    self.recovery.save(&state).await?;
                    recovered += 1;
                    self.metrics
                        .recovery_actions_total
                        .with_label_values(&["order_recovered"])
                        .inc();
                }
                Err(e) => {
                    warn!(order_id = %state.order_id, "Recovery attempt failed: {:#}", e);
                    state.last_error = Some(format!("{:#}", e));
                    if state.attempts >= OrderRecoveryState::MAX_ATTEMPTS {
                        self.fail_recovery(&mut state).await?;
                    } else {
                        state.recovery_status = RecoveryStatus::Pending;
                        self.recovery.save(&state).await?;
                    }
                }
            }
        }
        Ok(recovered)
    }

    async fn recover_order(&self, state: &OrderRecoveryState) -> Result<()> {
        let order = self
            .orders
            .find(state.order_id)
            .await?
            .with_context(|| format!("Order {} not found", state.order_id))?;

        match state.failure_point.as_str() {
            "send_confirmation" => self.order_service.submit_confirmation(&order).await,
            "select_vendor" | "vendor_routing" => {
                self.routing.reassign(state.order_id).await?;
                Ok(())
            }
            other => {
                // Generic re-drive: restart from vendor routing, which is
                // idempotent with respect to already-confirmed orders.
                warn!(failure_point = other, "Unknown failure point, rerouting");
                self.routing.reassign(state.order_id).await?;
                Ok(())
            }
        }
    }

    /// Recovery exhausted: the only moment admins are notified.
    async fn fail_recovery(&self, state: &mut OrderRecoveryState) -> Result<()> {
        error!(
            order_id = %state.order_id,
            attempts = state.attempts,
            "Recovery exhausted, raising manual intervention"
        );
        state.recovery_status = RecoveryStatus::Failed;
        self.recovery.save(state).await?;

        self.notifications
            .insert(&AdminNotification::raise(
                NotificationKind::ManualIntervention,
                format!("Order {} could not be recovered", state.order_id),
                format!(
                    "Recovery from '{}' failed after {} attempts. Last error: {}",
                    state.failure_point,
                    state.attempts,
                    state.last_error.as_deref().unwrap_or("unknown")
                ),
            ))
            .await?;
        Ok(())
    }

    /// Self-healing: per-status stuck thresholds drive either a vendor
    /// reassignment or a workflow retry. Orders are never failed here.
    async fn heal_stuck_orders(&self) -> Result<u32> {
        let now = Utc::now();
        let rows = self.orders.non_terminal_orders().await?;
        let mut actions = 0;

        for row in rows {
            let stuck_for = now - row.in_status_since;
            let Some(action) = stuck_action(row.order.status, stuck_for) else {
                continue;
            };

            warn!(
                order_id = %row.order.id,
                status = %row.order.status,
                minutes = stuck_for.num_minutes(),
                ?action,
                "Stuck order detected"
            );
            match action {
                StuckAction::ReassignVendor => {
                    self.fabric
                        .submit(JobPayload::RouteOrder {
                            order_id: row.order.id,
                            exclude_vendors: vec![row.order.vendor_id],
                            attempt: 0,
                        })
                        .await?;
                    self.metrics
                        .recovery_actions_total
                        .with_label_values(&["reassign_vendor"])
                        .inc();
                }
                StuckAction::RetryWorkflow => {
                    // Track through the recovery state machine so the
                    // attempt cap and escalation apply.
                    self.recovery
                        .capture(&OrderRecoveryState::capture(
                            row.order.id,
                            row.order.status,
                            "vendor_routing",
                            format!("stuck in {} for {} min", row.order.status, stuck_for.num_minutes()),
                        ))
                        .await?;
                    self.metrics
                        .recovery_actions_total
                        .with_label_values(&["retry_workflow"])
                        .inc();
                }
            }
            actions += 1;
        }
        Ok(actions)
    }

    /// Operator dashboard data.
    pub async fn dashboard(&self) -> Result<RecoveryDashboard> {
        let webhook_counts = self.webhook_service.counts().await?;
        let stale = self
            .workflows
            .stale(Utc::now(), self.config.heartbeat_timeout())
            .await?;
        let due = self.assignments.expired(Utc::now()).await?;
        let pending = self.recovery.pending(100).await?;

        let now = Utc::now();
        let stuck = self
            .orders
            .non_terminal_orders()
            .await?
            .into_iter()
            .filter(|row| stuck_action(row.order.status, now - row.in_status_since).is_some())
            .count();

        Ok(RecoveryDashboard {
            pending_webhooks: webhook_counts.get("pending").copied().unwrap_or(0),
            failed_webhooks: webhook_counts.get("failed").copied().unwrap_or(0),
            stale_workflows: stale.len(),
            due_vendor_retries: due.len(),
            pending_recoveries: pending.len(),
            stuck_orders: stuck,
        })
    }
}
