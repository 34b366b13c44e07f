mod audit_repository;
mod decision_log_repository;
mod idempotency_repository;
mod ledger_repository;
mod order_repository;
mod order_writer;
mod parse_session_repository;
mod price_repository;
mod product_repository;
mod recovery_repository;
mod rejected_order_repository;
mod retailer_repository;
mod uploaded_order_repository;
mod vendor_repository;
mod webhook_repository;
mod workflow_repository;

pub use audit_repository::{SqliteAuditLogRepository, SqliteNotificationRepository};
pub use decision_log_repository::SqliteDecisionLogRepository;
pub use idempotency_repository::SqliteIdempotencyRepository;
pub use ledger_repository::SqliteLedgerRepository;
pub use order_repository::SqliteOrderRepository;
pub use order_writer::SqliteOrderWriter;
pub use parse_session_repository::SqliteParseSessionRepository;
pub use price_repository::SqlitePriceRepository;
pub use product_repository::SqliteProductRepository;
pub use recovery_repository::{SqliteAssignmentRepository, SqliteRecoveryRepository};
pub use rejected_order_repository::SqliteRejectedOrderRepository;
pub use retailer_repository::SqliteRetailerRepository;
pub use uploaded_order_repository::SqliteUploadedOrderRepository;
pub use vendor_repository::SqliteVendorRepository;
pub use webhook_repository::SqliteWebhookRepository;
pub use workflow_repository::SqliteWorkflowRepository;
