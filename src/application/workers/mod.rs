//! One processor per queue, registered with the job fabric at startup.

mod credit_score_processor;
mod image_processor;
mod order_processor;
mod reminder_processor;
mod report_processor;
mod routing_processor;
mod whatsapp_processor;

pub use credit_score_processor::CreditScoreProcessor;
pub use image_processor::ImageProcessor;
pub use order_processor::OrderProcessor;
pub use reminder_processor::ReminderProcessor;
pub use report_processor::ReportProcessor;
pub use routing_processor::RoutingProcessor;
pub use whatsapp_processor::WhatsAppProcessor;
