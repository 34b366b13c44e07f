//! Derived analytics: vendor reliability recompute, market price
//! analytics and abnormal price-change alerts.

use crate::domain::analytics::{
    compute_market_analytics, compute_performance, compute_retailer_metrics, grade_price_change,
    AlertSeverity, OrderFact, PaymentFact, PriceHistoryEvent, RetailerMetrics,
};
use crate::domain::events::MarketplaceEvent;
use crate::domain::records::PriceAlert;
use crate::domain::repositories::{
    LedgerRepository, OrderRepository, PriceAnalyticsRepository, ProductRepository,
    RetailerRepository, VendorRepository,
};
use crate::domain::types::{ProductId, RetailerId, VendorId};
use crate::infrastructure::event_bus::EventBus;
use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Changes above this percentage raise a graded alert.
const ABNORMAL_CHANGE_THRESHOLD_PCT: Decimal = dec!(20);
/// Reliability scoring window.
const PERFORMANCE_WINDOW_DAYS: i64 = 30;

pub struct AnalyticsService {
    vendors: Arc<dyn VendorRepository>,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    retailers: Arc<dyn RetailerRepository>,
    ledger: Arc<dyn LedgerRepository>,
    prices: Arc<dyn PriceAnalyticsRepository>,
    events: EventBus,
}

impl AnalyticsService {
    pub fn new(
        vendors: Arc<dyn VendorRepository>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        retailers: Arc<dyn RetailerRepository>,
        ledger: Arc<dyn LedgerRepository>,
        prices: Arc<dyn PriceAnalyticsRepository>,
        events: EventBus,
    ) -> Self {
        Self {
            vendors,
            products,
            orders,
            retailers,
            ledger,
            prices,
            events,
        }
    }

    /// The single entry point for vendor price changes: update the
    /// listing, append history, grade the change, recompute the market.
    pub async fn record_price_change(
        &self,
        vendor_id: VendorId,
        product_id: ProductId,
        new_price: Decimal,
    ) -> Result<Option<PriceAlert>> {
        let old_price = self
            .vendors
            .set_price(vendor_id, product_id, new_price)
            .await?;

        let history = PriceHistoryEvent::record(vendor_id, product_id, old_price, new_price);
        self.prices.insert_history(&history).await?;

        self.events.publish(&MarketplaceEvent::PriceChanged {
            product_id,
            vendor_id,
            old_price,
            new_price,
        });

        self.recompute_market_for(product_id).await?;

        let change_pct = history.change_pct();
        let alert = match grade_price_change(change_pct, ABNORMAL_CHANGE_THRESHOLD_PCT) {
            Some(severity) => {
                if severity == AlertSeverity::Critical {
                    warn!(
                        %vendor_id, %product_id, %change_pct,
                        "Critical price change detected"
                    );
                }
                let alert = PriceAlert {
                    id: Uuid::new_v4(),
                    product_id,
                    vendor_id,
                    old_price,
                    new_price,
                    change_pct,
                    severity,
                    created_at: Utc::now(),
                };
                self.prices.insert_alert(&alert).await?;
                Some(alert)
            }
            None => None,
        };
        Ok(alert)
    }

    /// Recomputes market analytics for one product from its current
    /// listings and price history.
    pub async fn recompute_market_for(&self, product_id: ProductId) -> Result<()> {
        let listings: Vec<(VendorId, Decimal)> = self
            .vendors
            .list_for_product(product_id)
            .await?
            .into_iter()
            .filter(|(_, l)| l.is_available)
            .map(|(v, l)| (v.id, l.price))
            .collect();
        let history = self.prices.history_for_product(product_id, 100).await?;

        if let Some(analytics) = compute_market_analytics(product_id, &listings, &history) {
            self.prices.store_market(&analytics).await?;
        }
        Ok(())
    }

    /// Timer entry point: recompute all markets.
    pub async fn recompute_all_markets(&self) -> Result<u32> {
        let ids = self.products.list_ids().await?;
        let count = ids.len() as u32;
        for product_id in ids {
            self.recompute_market_for(product_id).await?;
        }
        Ok(count)
    }

    /// Timer entry point: recompute every vendor's reliability score from
    /// its event history and price competitiveness.
    pub async fn recompute_vendor_scores(&self) -> Result<u32> {
        let vendor_ids = self.vendors.list_ids().await?;
        let count = vendor_ids.len() as u32;

        for vendor_id in vendor_ids {
            let counts = self
                .orders
                .vendor_event_counts(vendor_id, PERFORMANCE_WINDOW_DAYS)
                .await?;
            let price_index = self.price_competitiveness(vendor_id).await?;
            let performance = compute_performance(&counts, price_index);

            self.vendors
                .set_reliability(vendor_id, performance.reliability_score)
                .await?;
            info!(
                %vendor_id,
                reliability = %performance.reliability_score,
                acceptance = %performance.acceptance_rate,
                completion = %performance.completion_rate,
                "Vendor reliability recomputed"
            );
        }
        Ok(count)
    }

    /// Mean of per-listing price scores against the stored market
    /// averages: at-or-below market scores 100, above loses
    /// proportionally.
    async fn price_competitiveness(&self, vendor_id: VendorId) -> Result<Decimal> {
        let listings = self.vendors.listings_for_vendor(vendor_id).await?;
        let mut scores: Vec<Decimal> = Vec::new();

        for listing in listings.iter().filter(|l| l.is_available) {
            let Some(market) = self.prices.latest_market(listing.product_id).await? else {
                continue;
            };
            if market.avg_price <= Decimal::ZERO {
                continue;
            }
            let over = (listing.price - market.avg_price).max(Decimal::ZERO) / market.avg_price;
            let score = (Decimal::ONE_HUNDRED * (Decimal::ONE - over))
                .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
            scores.push(score);
        }

        if scores.is_empty() {
            // No market data yet: neutral score
            return Ok(Decimal::ONE_HUNDRED);
        }
        Ok((scores.iter().copied().sum::<Decimal>() / Decimal::from(scores.len())).round_dp(2))
    }

    /// On-demand retailer metrics for dashboards and the credit-score
    /// queue. Derived, never stored as truth.
    pub async fn retailer_metrics(&self, retailer_id: RetailerId) -> Result<RetailerMetrics> {
        let retailer = self
            .retailers
            .find(retailer_id)
            .await?
            .with_context(|| format!("Retailer {} not found", retailer_id))?;

        let orders = self.orders.list_for_retailer(retailer_id).await?;
        let order_facts: Vec<OrderFact> = orders
            .iter()
            .map(|o| OrderFact {
                total: o.total,
                created_at: o.created_at,
            })
            .collect();

        // Due on delivery; paid when the ledger saw the debit.
        let payments = self.ledger.payments_for_retailer(retailer_id).await?;
        let payment_facts: Vec<PaymentFact> = payments
            .iter()
            .filter_map(|entry| {
                let order = entry
                    .linked_order_id
                    .and_then(|id| orders.iter().find(|o| o.id == id))?;
                Some(PaymentFact {
                    due_at: order.delivered_at?,
                    paid_at: entry.created_at,
                })
            })
            .collect();

        Ok(compute_retailer_metrics(
            &order_facts,
            &payment_facts,
            retailer.outstanding_debt,
            retailer.credit_limit,
            Utc::now(),
        ))
    }

}
