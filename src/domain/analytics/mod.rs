pub mod price_intelligence;
pub mod retailer_metrics;
pub mod vendor_metrics;

pub use price_intelligence::{
    compute_market_analytics, grade_price_change, AlertSeverity, MarketAnalytics,
    PriceHistoryEvent, PriceTrend,
};
pub use retailer_metrics::{compute_retailer_metrics, OrderFact, PaymentFact, RetailerMetrics};
pub use vendor_metrics::{compute_performance, VendorEventCounts, VendorPerformance};
