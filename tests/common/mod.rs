//! Shared test harness: the full service graph against in-memory SQLite,
//! mock external providers and the sync job executor.

#![allow(dead_code)]

use chrono::{NaiveTime, Utc};
use mandi::application::analytics_service::AnalyticsService;
use mandi::application::intake::OrderIntakeService;
use mandi::application::ledger_service::LedgerService;
use mandi::application::order_service::OrderService;
use mandi::application::recovery::RecoveryWorker;
use mandi::application::routing_service::RoutingService;
use mandi::application::webhook_service::WebhookService;
use mandi::application::workers::{
    ImageProcessor, OrderProcessor, RoutingProcessor, WhatsAppProcessor,
};
use mandi::config::{RecoveryEnvConfig, RoutingEnvConfig};
use mandi::domain::catalog::{Product, VendorProduct};
use mandi::domain::credit::CreditPolicy;
use mandi::domain::parser::{ParseEngine, ParserConfig};
use mandi::domain::party::{Retailer, Vendor, WorkingHours};
use mandi::domain::ports::{LlmExtractor, ObjectStore, OcrProvider, WhatsAppSender};
use mandi::domain::repositories::*;
use mandi::domain::routing::LoadBalancingStrategy;
use mandi::infrastructure::event_bus::EventBus;
use mandi::infrastructure::mock::{MockObjectStore, MockOcrProvider, MockWhatsAppSender};
use mandi::infrastructure::observability::Metrics;
use mandi::infrastructure::persistence::repositories::*;
use mandi::infrastructure::persistence::Database;
use mandi::infrastructure::queue::JobFabric;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct Harness {
    pub database: Database,
    pub metrics: Metrics,
    pub events: EventBus,
    pub fabric: Arc<JobFabric>,
    pub retailers: Arc<dyn RetailerRepository>,
    pub vendors: Arc<dyn VendorRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub orders_repo: Arc<dyn OrderRepository>,
    pub ledger_repo: Arc<dyn LedgerRepository>,
    pub webhooks_repo: Arc<dyn WebhookRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub recovery_repo: Arc<dyn RecoveryRepository>,
    pub rejected: Arc<dyn RejectedOrderRepository>,
    pub sessions: Arc<dyn ParseSessionRepository>,
    pub prices: Arc<dyn PriceAnalyticsRepository>,
    pub uploads: Arc<dyn UploadedOrderRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub routing: Arc<RoutingService>,
    pub orders: Arc<OrderService>,
    pub intake: Arc<OrderIntakeService>,
    pub ledger: Arc<LedgerService>,
    pub analytics: Arc<AnalyticsService>,
    pub webhooks: Arc<WebhookService>,
    pub recovery: Arc<RecoveryWorker>,
    pub whatsapp: Arc<MockWhatsAppSender>,
}

pub async fn harness() -> Harness {
    harness_with_ocr(MockOcrProvider::returning("")).await
}

pub async fn harness_with_ocr(ocr: MockOcrProvider) -> Harness {
    let database = Database::in_memory().await.expect("in-memory db");
    let metrics = Metrics::new().expect("metrics");
    let events = EventBus::new();
    let fabric = JobFabric::connect(None, metrics.clone()).await;

    let retailers: Arc<dyn RetailerRepository> =
        Arc::new(SqliteRetailerRepository::new(database.clone()));
    let vendors: Arc<dyn VendorRepository> =
        Arc::new(SqliteVendorRepository::new(database.clone()));
    let products: Arc<dyn ProductRepository> =
        Arc::new(SqliteProductRepository::new(database.clone()));
    let orders_repo: Arc<dyn OrderRepository> =
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

    let whatsapp = Arc::new(MockWhatsAppSender::new());
    let whatsapp_dyn: Arc<dyn WhatsAppSender> = whatsapp.clone();
    let ocr_dyn: Arc<dyn OcrProvider> = Arc::new(ocr);
    let store_dyn: Arc<dyn ObjectStore> = Arc::new(MockObjectStore);
    let no_llm: Option<Arc<dyn LlmExtractor>> = None;

    let routing_config = RoutingEnvConfig {
        max_active_orders_per_vendor: 10,
        max_pending_orders_per_vendor: 5,
        monopoly_threshold: 0.40,
        working_hours_enabled: true,
        strategy: LoadBalancingStrategy::LeastLoaded,
        vendor_response_deadline_hours: 2,
        max_vendor_attempts: 5,
    };

    let routing = Arc::new(RoutingService::new(
        vendors.clone(),
        retailers.clone(),
        orders_repo.clone(),
        decisions.clone(),
        assignments.clone(),
        recovery_repo.clone(),
        notifications.clone(),
        events.clone(),
        routing_config,
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
    let intake = Arc::new(OrderIntakeService::new(
        ParseEngine::new(ParserConfig::default()),
        products.clone(),
        sessions.clone(),
        retailers.clone(),
        uploads.clone(),
        no_llm.clone(),
        no_llm,
        ocr_dyn,
        store_dyn,
        routing.clone(),
        orders.clone(),
        fabric.clone(),
        metrics.clone(),
    ));
    let ledger = Arc::new(LedgerService::new(
        ledger_repo.clone(),
        orders_repo.clone(),
        audit.clone(),
        events.clone(),
    ));
    let analytics = Arc::new(AnalyticsService::new(
        vendors.clone(),
        products.clone(),
        orders_repo.clone(),
        retailers.clone(),
        ledger_repo.clone(),
        prices.clone(),
        events.clone(),
    ));
    let webhooks = Arc::new(WebhookService::new(
        webhooks_repo.clone(),
        retailers.clone(),
        intake.clone(),
        metrics.clone(),
        "test-app-secret".to_string(),
        "test-verify-token".to_string(),
        3,
        chrono::Duration::minutes(10),
    ));
    let recovery = Arc::new(RecoveryWorker::new(
        webhooks.clone(),
        workflows.clone(),
        assignments.clone(),
        recovery_repo.clone(),
        orders_repo.clone(),
        orders.clone(),
        routing.clone(),
        notifications.clone(),
        idempotency.clone(),
        fabric.clone(),
        metrics.clone(),
        RecoveryEnvConfig::from_env().expect("recovery config defaults"),
    ));

    fabric.register(Arc::new(OrderProcessor::new(intake.clone())));
    fabric.register(Arc::new(WhatsAppProcessor::new(
        whatsapp_dyn,
        idempotency.clone(),
    )));
    fabric.register(Arc::new(ImageProcessor::new(intake.clone())));
    fabric.register(Arc::new(RoutingProcessor::new(routing.clone())));

    Harness {
        database,
        metrics,
        events,
        fabric,
        retailers,
        vendors,
        products,
        orders_repo,
        ledger_repo,
        webhooks_repo,
        workflows,
        idempotency,
        assignments,
        recovery_repo,
        rejected,
        sessions,
        prices,
        uploads,
        notifications,
        routing,
        orders,
        intake,
        ledger,
        analytics,
        webhooks,
        recovery,
        whatsapp,
    }
}

impl Harness {
    pub async fn seed_retailer(&self, credit_limit: Decimal) -> Retailer {
        let retailer = Retailer {
            id: Uuid::new_v4(),
            name: "Karim Traders".to_string(),
            phone: format!("+8801{}", &Uuid::new_v4().simple().to_string()[..9]),
            credit_limit,
            outstanding_debt: Decimal::ZERO,
            available_credit: credit_limit,
            risk_score: 10,
            is_approved: true,
            is_active: true,
            high_risk_override: false,
            delivery_zone: None,
            district: Some("dhaka".to_string()),
            working_hours: None,
            created_at: Utc::now(),
        };
        self.retailers.insert(&retailer).await.expect("seed retailer");
        retailer
    }

    pub async fn seed_product(&self, sku: &str, name: &str, unit: &str, aliases: &[&str]) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            name: name.to_string(),
            category: "staples".to_string(),
            unit: unit.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        };
        self.products.insert(&product).await.expect("seed product");
        product
    }

    pub async fn seed_vendor(
        &self,
        product: &Product,
        price: Decimal,
        stock: Decimal,
        reliability: i64,
    ) -> Vendor {
        let vendor = Vendor {
            id: Uuid::new_v4(),
            name: format!("Vendor-{}", &Uuid::new_v4().simple().to_string()[..6]),
            phone: "+8801800000000".to_string(),
            is_approved: true,
            is_active: true,
            reliability_score: Decimal::from(reliability),
            working_hours: WorkingHours::new(
                NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
                0,
            ),
            max_active_orders: 10,
            max_pending_orders: 5,
            delivery_zones: vec![],
            district: "dhaka".to_string(),
            created_at: Utc::now(),
        };
        let listing = VendorProduct {
            vendor_id: vendor.id,
            product_id: product.id,
            price,
            stock,
            is_available: true,
            min_order_qty: dec!(1),
            max_order_qty: dec!(1000),
            updated_at: Utc::now(),
        };
        self.vendors
            .insert(&vendor, std::slice::from_ref(&listing))
            .await
            .expect("seed vendor");
        vendor
    }
}

/// Polls until `check` passes or the timeout elapses; sync-mode jobs run
/// on spawned tasks, so effects land a beat after submit.
pub async fn wait_until<F, Fut>(mut check: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
