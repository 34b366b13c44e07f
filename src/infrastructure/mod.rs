pub mod core;
pub mod event_bus;
pub mod external;
pub mod mock;
pub mod observability;
pub mod persistence;
pub mod queue;

pub use event_bus::EventBus;
