//! Application wiring: repositories, services, workers and tickers are
//! built once here and torn down in order on shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::analytics_service::AnalyticsService;
use crate::application::intake::OrderIntakeService;
use crate::application::ledger_service::LedgerService;
use crate::application::order_service::OrderService;
use crate::application::recovery::{RecoveryDashboard, RecoveryWorker, SweepReport};
use crate::application::routing_service::RoutingService;
use crate::application::webhook_service::WebhookService;
use crate::application::workers::{
    CreditScoreProcessor, ImageProcessor, OrderProcessor, ReminderProcessor, ReportProcessor,
    RoutingProcessor, WhatsAppProcessor,
};
use crate::config::Config;
use crate::domain::credit::CreditPolicy;
use crate::domain::events::LoggingListener;
use crate::domain::parser::{ParseEngine, ParserConfig};
use crate::domain::ports::{LlmExtractor, ObjectStore, OcrProvider, WhatsAppSender};
use crate::domain::repositories::*;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::external::{
    HttpLlmExtractor, HttpObjectStore, HttpOcrProvider, HttpWhatsAppSender,
};
use crate::infrastructure::mock::{MockObjectStore, MockOcrProvider, MockWhatsAppSender};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::repositories::*;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::queue::{JobFabric, JobPayload, QueueStats};

pub struct Application {
    pub config: Config,
    pub database: Database,
    pub metrics: Metrics,
    pub events: EventBus,
    pub fabric: Arc<JobFabric>,
    pub intake: Arc<OrderIntakeService>,
    pub orders: Arc<OrderService>,
    pub routing: Arc<RoutingService>,
    pub ledger: Arc<LedgerService>,
    pub analytics: Arc<AnalyticsService>,
    pub webhooks: Arc<WebhookService>,
    pub recovery: Arc<RecoveryWorker>,
    order_repo: Arc<dyn OrderRepository>,
}

pub struct SystemHandle {
    shutdown: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!("Building application...");

        let database = Database::new(&config.core.database_url).await?;
        let metrics = Metrics::new()?;
        let events = EventBus::new().with(Arc::new(LoggingListener));

        let fabric = JobFabric::connect(config.core.broker_url.as_deref(), metrics.clone()).await;
        info!("Job fabric mode: {}", fabric.mode());

        // Repositories
        let retailers: Arc<dyn RetailerRepository> =
            Arc::new(SqliteRetailerRepository::new(database.clone()));
        let vendors: Arc<dyn VendorRepository> =
            Arc::new(SqliteVendorRepository::new(database.clone()));
        let products: Arc<dyn ProductRepository> =
            Arc::new(SqliteProductRepository::new(database.clone()));
        let order_repo: Arc<dyn OrderRepository> =
            Arc::new(SqliteOrderRepository::new(database.clone()));
        let ledger_repo: Arc<dyn LedgerRepository> =
            Arc::new(SqliteLedgerRepository::new(database.clone()));
        let webhooks_repo: Arc<dyn WebhookRepository> =
            Arc::new(SqliteWebhookRepository::new(database.clone()));
        let workflows: Arc<dyn WorkflowRepository> =
            Arc::new(SqliteWorkflowRepository::new(database.clone()));
        let idempotency: Arc<dyn IdempotencyRepository> =
            Arc::new(SqliteIdempotencyRepository::new(database.clone()));
        let assignments: Arc<dyn AssignmentRepository> =
            Arc::new(SqliteAssignmentRepository::new(database.clone()));
        let recovery_repo: Arc<dyn RecoveryRepository> =
            Arc::new(SqliteRecoveryRepository::new(database.clone()));
        let decisions: Arc<dyn DecisionLogRepository> =
            Arc::new(SqliteDecisionLogRepository::new(database.clone()));
        let rejected: Arc<dyn RejectedOrderRepository> =
            Arc::new(SqliteRejectedOrderRepository::new(database.clone()));
        let sessions: Arc<dyn ParseSessionRepository> =
            Arc::new(SqliteParseSessionRepository::new(database.clone()));
        let prices: Arc<dyn PriceAnalyticsRepository> =
            Arc::new(SqlitePriceRepository::new(database.clone()));
        let uploads: Arc<dyn UploadedOrderRepository> =
            Arc::new(SqliteUploadedOrderRepository::new(database.clone()));
        let audit: Arc<dyn AuditLogRepository> =
            Arc::new(SqliteAuditLogRepository::new(database.clone()));
        let notifications: Arc<dyn NotificationRepository> =
            Arc::new(SqliteNotificationRepository::new(database.clone()));
        let writer: Arc<dyn AtomicOrderWriter> = Arc::new(SqliteOrderWriter::new(
            database.clone(),
            CreditPolicy::default(),
        ));

        // External providers: HTTP adapters when configured, mocks
        // otherwise (development and tests stay off the network).
        let providers = &config.providers;
        let ocr: Arc<dyn OcrProvider> = match &providers.ocr_base_url {
            Some(url) => Arc::new(HttpOcrProvider::new(url.clone(), providers.ocr_api_key.clone())),
            None => Arc::new(MockOcrProvider::returning("")),
        };
        let (primary_llm, fallback_llm): (
            Option<Arc<dyn LlmExtractor>>,
            Option<Arc<dyn LlmExtractor>>,
        ) = match &providers.llm_base_url {
            Some(url) => (
                Some(Arc::new(HttpLlmExtractor::new(
                    url.clone(),
                    providers.llm_api_key.clone(),
                    providers.llm_primary_model.clone(),
                    "primary_llm",
                ))),
                Some(Arc::new(HttpLlmExtractor::new(
                    url.clone(),
                    providers.llm_api_key.clone(),
                    providers.llm_fallback_model.clone(),
                    "fallback_llm",
                ))),
            ),
            None => (None, None),
        };
        let whatsapp: Arc<dyn WhatsAppSender> = match &providers.whatsapp_base_url {
            Some(url) => Arc::new(HttpWhatsAppSender::new(
                url.clone(),
                providers.whatsapp_access_token.clone(),
                providers.whatsapp_phone_number_id.clone(),
            )),
            None => Arc::new(MockWhatsAppSender::new()),
        };
        let object_store: Arc<dyn ObjectStore> = match &providers.object_store_base_url {
            Some(url) => Arc::new(HttpObjectStore::new(
                url.clone(),
                providers.object_store_api_key.clone(),
                providers.object_store_bucket.clone(),
            )),
            None => Arc::new(MockObjectStore),
        };

        // Services
        let routing = Arc::new(RoutingService::new(
            vendors.clone(),
            retailers.clone(),
            order_repo.clone(),
            decisions.clone(),
            assignments.clone(),
            recovery_repo.clone(),
            notifications.clone(),
            events.clone(),
            config.routing.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            writer,
            idempotency.clone(),
            rejected.clone(),
            retailers.clone(),
            workflows.clone(),
            routing.clone(),
            fabric.clone(),
            events.clone(),
            metrics.clone(),
        ));
        let engine = ParseEngine::new(ParserConfig {
            auto_accept: config.parser.auto_accept,
            needs_review: config.parser.needs_review,
            min_similarity: config.parser.product_match_threshold,
            ..ParserConfig::default()
        });
        let intake = Arc::new(OrderIntakeService::new(
            engine,
            products.clone(),
            sessions.clone(),
            retailers.clone(),
            uploads.clone(),
            primary_llm,
            fallback_llm,
            ocr,
            object_store,
            routing.clone(),
            orders.clone(),
            fabric.clone(),
            metrics.clone(),
        ));
        let ledger = Arc::new(LedgerService::new(
            ledger_repo.clone(),
            order_repo.clone(),
            audit.clone(),
            events.clone(),
        ));
        let analytics = Arc::new(AnalyticsService::new(
            vendors.clone(),
            products.clone(),
            order_repo.clone(),
            retailers.clone(),
            ledger_repo.clone(),
            prices.clone(),
            events.clone(),
        ));
        let webhook_service = Arc::new(WebhookService::new(
            webhooks_repo.clone(),
            retailers.clone(),
            intake.clone(),
            metrics.clone(),
            providers.whatsapp_app_secret.clone(),
            providers.whatsapp_verify_token.clone(),
            config.recovery.webhook_max_retries,
            config.recovery.webhook_stuck_threshold(),
        ));
        let recovery = Arc::new(RecoveryWorker::new(
            webhook_service.clone(),
            workflows.clone(),
            assignments.clone(),
            recovery_repo.clone(),
            order_repo.clone(),
            orders.clone(),
            routing.clone(),
            notifications.clone(),
            idempotency.clone(),
            fabric.clone(),
            metrics.clone(),
            config.recovery.clone(),
        ));

        // Queue processors
        fabric.register(Arc::new(OrderProcessor::new(intake.clone())));
        fabric.register(Arc::new(WhatsAppProcessor::new(
            whatsapp.clone(),
            idempotency.clone(),
        )));
        fabric.register(Arc::new(ImageProcessor::new(intake.clone())));
        fabric.register(Arc::new(RoutingProcessor::new(routing.clone())));
        fabric.register(Arc::new(CreditScoreProcessor::new(analytics.clone())));
        fabric.register(Arc::new(ReminderProcessor::new(
            order_repo.clone(),
            retailers.clone(),
            fabric.clone(),
        )));
        fabric.register(Arc::new(ReportProcessor::new(
            webhooks_repo.clone(),
            rejected.clone(),
            fabric.clone(),
        )));

        Ok(Self {
            config,
            database,
            metrics,
            events,
            fabric,
            intake,
            orders,
            routing,
            ledger,
            analytics,
            webhooks: webhook_service,
            recovery,
            order_repo,
        })
    }

    /// Spawns the worker pools and the periodic tickers. Every ticker is
    /// a single sequential loop, so an overrunning fire skips instead of
    /// overlapping.
    pub fn start(&self) -> SystemHandle {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handles = self.fabric.clone().start_workers(&shutdown_tx);

        // Recovery sweep: settle first, then every interval
        {
            let recovery = self.recovery.clone();
            let settle = Duration::from_secs(self.config.recovery.startup_settle_seconds);
            let interval = Duration::from_secs(self.config.recovery.sweep_interval_seconds);
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(settle).await;
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => return,
                        _ = ticker.tick() => {
                            recovery.run_cycle().await;
                        }
                    }
                }
            }));
        }

        // Vendor performance recompute, hourly
        {
            let analytics = self.analytics.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(3600));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => return,
                        _ = ticker.tick() => {
                            if let Err(e) = analytics.recompute_vendor_scores().await {
                                error!("Vendor score recompute failed: {:#}", e);
                            }
                        }
                    }
                }
            }));
        }

        // Market price analytics recompute, every 15 minutes
        {
            let analytics = self.analytics.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(900));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => return,
                        _ = ticker.tick() => {
                            if let Err(e) = analytics.recompute_all_markets().await {
                                error!("Market recompute failed: {:#}", e);
                            }
                        }
                    }
                }
            }));
        }

        // Daily payment-reminder scan for overdue delivered orders
        {
            let orders = self.order_repo.clone();
            let fabric = self.fabric.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(86_400));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => return,
                        _ = ticker.tick() => {
                            if let Err(e) = scan_overdue(&orders, &fabric).await {
                                error!("Payment reminder scan failed: {:#}", e);
                            }
                        }
                    }
                }
            }));
        }

        info!("System started ({} background tasks)", handles.len());
        SystemHandle {
            shutdown: shutdown_tx,
            handles,
        }
    }

    /// Graceful shutdown: signal, drain within a bound, close stores.
    pub async fn shutdown(&self, handle: SystemHandle) {
        info!("Shutting down: draining workers...");
        let _ = handle.shutdown.send(());

        let drain = async {
            for task in handle.handles {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
            warn!("Drain timed out after 30s; proceeding with close");
        }

        self.database.pool.close().await;
        info!("Shutdown complete");
    }

    // ----- operator entry points -----

    pub async fn queue_stats(&self) -> Result<Vec<QueueStats>> {
        self.fabric.stats().await
    }

    pub async fn recovery_dashboard(&self) -> Result<RecoveryDashboard> {
        self.recovery.dashboard().await
    }

    /// POST /recovery/trigger and POST /self-healing/run-cycle both drive
    /// the same worker; the sweep covers both responsibilities.
    pub async fn trigger_recovery_cycle(&self) -> SweepReport {
        self.recovery.run_cycle().await
    }

    pub async fn retry_dead_letter(&self, job_id: &str) -> Result<()> {
        self.fabric.retry_dead_letter(job_id).await
    }
}

async fn scan_overdue(orders: &Arc<dyn OrderRepository>, fabric: &Arc<JobFabric>) -> Result<u32> {
    let overdue_after = chrono::Duration::days(7);
    let now = chrono::Utc::now();
    let unpaid = orders.list_unpaid_delivered().await?;
    let mut scheduled = 0;

    for order in unpaid {
        let Some(delivered_at) = order.delivered_at else {
            continue;
        };
        if now - delivered_at > overdue_after {
            fabric
                .submit(JobPayload::PaymentReminder { order_id: order.id })
                .await?;
            scheduled += 1;
        }
    }
    Ok(scheduled)
}
