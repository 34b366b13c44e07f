//! In-process fan-out of marketplace events.
//!
//! The listener set is frozen at wiring time: `with` builds the bus up
//! during `Application::build`, and every clone handed to a service
//! shares the same immutable set. Publishing is synchronous and happens
//! on hot paths (order creation, ledger appends), so listeners must stay
//! cheap: log a line, bump a counter, enqueue at most.

use crate::domain::events::{EventListener, MarketplaceEvent};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new bus with the listener appended. Existing clones
    /// keep the set they were built with.
    pub fn with(self, listener: Arc<dyn EventListener>) -> Self {
        let mut listeners: Vec<Arc<dyn EventListener>> = self.listeners.iter().cloned().collect();
        listeners.push(listener);
        Self {
            listeners: Arc::new(listeners),
        }
    }

    /// Delivers the event to every listener, in registration order.
    pub fn publish(&self, event: &MarketplaceEvent) {
        for listener in self.listeners.iter() {
            listener.on_event(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
