//! In-process marketplace events and the listener seam.

use crate::domain::types::{OrderId, OrderStatus, ProductId, RetailerId, VendorId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketplaceEvent {
    OrderCreated {
        order_id: OrderId,
        retailer_id: RetailerId,
        vendor_id: VendorId,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderRejected {
        retailer_id: RetailerId,
        requested_amount: Decimal,
        reason: String,
    },
    PaymentRecorded {
        order_id: OrderId,
        retailer_id: RetailerId,
        amount: Decimal,
    },
    VendorAssigned {
        order_id: OrderId,
        vendor_id: VendorId,
        attempt: u32,
    },
    VendorTimedOut {
        order_id: OrderId,
        vendor_id: VendorId,
        attempt: u32,
    },
    PriceChanged {
        product_id: ProductId,
        vendor_id: VendorId,
        old_price: Decimal,
        new_price: Decimal,
    },
}

/// Synchronous fan-out target; listeners must be cheap and non-blocking.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &MarketplaceEvent);
}

/// Logs every event at info level.
pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_event(&self, event: &MarketplaceEvent) {
        tracing::info!(?event, "marketplace event");
    }
}
