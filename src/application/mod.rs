pub mod analytics_service;
pub mod intake;
pub mod ledger_service;
pub mod messaging;
pub mod order_service;
pub mod recovery;
pub mod routing_service;
pub mod system;
pub mod webhook_service;
pub mod workers;

pub use system::{Application, SystemHandle};
