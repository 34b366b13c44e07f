//! Price history, market analytics and abnormal-change alerts.

use crate::domain::types::{ProductId, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted on every vendor price change; history is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryEvent {
    pub id: Uuid,
    pub vendor_id: VendorId,
    pub product_id: ProductId,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub changed_at: DateTime<Utc>,
}

impl PriceHistoryEvent {
    pub fn record(
        vendor_id: VendorId,
        product_id: ProductId,
        old_price: Decimal,
        new_price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor_id,
            product_id,
            old_price,
            new_price,
            changed_at: Utc::now(),
        }
    }

    /// Absolute change as a percentage of the old price.
    pub fn change_pct(&self) -> Decimal {
        if self.old_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.new_price - self.old_price).abs() * Decimal::ONE_HUNDRED / self.old_price)
            .round_dp(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    High,
    Critical,
}

/// Alert grading for a price change. Changes at or under the abnormal
/// threshold produce no alert; past 50% they are critical.
pub fn grade_price_change(change_pct: Decimal, abnormal_threshold_pct: Decimal) -> Option<AlertSeverity> {
    if change_pct > dec!(50) {
        Some(AlertSeverity::Critical)
    } else if change_pct > abnormal_threshold_pct + dec!(15) {
        Some(AlertSeverity::High)
    } else if change_pct > abnormal_threshold_pct {
        Some(AlertSeverity::Warning)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAnalytics {
    pub product_id: ProductId,
    pub avg_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub median_price: Decimal,
    /// Coefficient of variation of current listings, as a percentage.
    pub volatility_score: Decimal,
    pub trend: PriceTrend,
    pub lowest_price_vendor: Option<VendorId>,
    pub computed_at: DateTime<Utc>,
}

/// Recomputes the market view for one product from current listings and
/// its recent price history (oldest first).
pub fn compute_market_analytics(
    product_id: ProductId,
    listings: &[(VendorId, Decimal)],
    history: &[PriceHistoryEvent],
) -> Option<MarketAnalytics> {
    if listings.is_empty() {
        return None;
    }
    let mut prices: Vec<Decimal> = listings.iter().map(|(_, p)| *p).collect();
    prices.sort();

    let count = Decimal::from(prices.len());
    let sum: Decimal = prices.iter().copied().sum();
    let avg = (sum / count).round_dp(2);
    let min = prices[0];
    let max = *prices.last().unwrap_or(&min);
    let median = if prices.len() % 2 == 1 {
        prices[prices.len() / 2]
    } else {
        ((prices[prices.len() / 2 - 1] + prices[prices.len() / 2]) / dec!(2)).round_dp(2)
    };

    let volatility_score = volatility(&prices, avg);
    let lowest_price_vendor = listings
        .iter()
        .min_by_key(|(_, p)| *p)
        .map(|(vendor, _)| *vendor);

    Some(MarketAnalytics {
        product_id,
        avg_price: avg,
        min_price: min,
        max_price: max,
        median_price: median,
        volatility_score,
        trend: trend_from_history(history),
        lowest_price_vendor,
        computed_at: Utc::now(),
    })
}

fn volatility(prices: &[Decimal], mean: Decimal) -> Decimal {
    if prices.len() < 2 || mean <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mean_f = mean.to_f64().unwrap_or(0.0);
    let variance = prices
        .iter()
        .map(|p| {
            let d = p.to_f64().unwrap_or(0.0) - mean_f;
            d * d
        })
        .sum::<f64>()
        / (prices.len() - 1) as f64;
    let cv = variance.sqrt() / mean_f * 100.0;
    Decimal::from_f64(cv).unwrap_or(Decimal::ZERO).round_dp(2)
}

/// Compares the newer half of history against the older half; a move
/// beyond ±5% is a trend.
fn trend_from_history(history: &[PriceHistoryEvent]) -> PriceTrend {
    if history.len() < 2 {
        return PriceTrend::Stable;
    }
    let mid = history.len() / 2;
    let older: Decimal = history[..mid].iter().map(|e| e.new_price).sum::<Decimal>()
        / Decimal::from(mid.max(1));
    let newer: Decimal = history[mid..].iter().map(|e| e.new_price).sum::<Decimal>()
        / Decimal::from(history.len() - mid);
    if older <= Decimal::ZERO {
        return PriceTrend::Stable;
    }
    let change = (newer - older) / older;
    if change > dec!(0.05) {
        PriceTrend::Increasing
    } else if change < dec!(-0.05) {
        PriceTrend::Decreasing
    } else {
        PriceTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(old: Decimal, new: Decimal) -> PriceHistoryEvent {
        PriceHistoryEvent::record(Uuid::new_v4(), Uuid::new_v4(), old, new)
    }

    #[test]
    fn test_change_pct() {
        assert_eq!(event(dec!(100), dec!(160)).change_pct(), dec!(60.00));
        assert_eq!(event(dec!(100), dec!(90)).change_pct(), dec!(10.00));
    }

    #[test]
    fn test_alert_grading() {
        let threshold = dec!(20);
        assert_eq!(grade_price_change(dec!(10), threshold), None);
        assert_eq!(grade_price_change(dec!(20), threshold), None);
        assert_eq!(
            grade_price_change(dec!(25), threshold),
            Some(AlertSeverity::Warning)
        );
        assert_eq!(
            grade_price_change(dec!(40), threshold),
            Some(AlertSeverity::High)
        );
        assert_eq!(
            grade_price_change(dec!(60), threshold),
            Some(AlertSeverity::Critical)
        );
    }

    #[test]
    fn test_market_stats() {
        let product = Uuid::new_v4();
        let v1 = Uuid::new_v4();
        let v2 = Uuid::new_v4();
        let v3 = Uuid::new_v4();
        let analytics = compute_market_analytics(
            product,
            &[(v1, dec!(100)), (v2, dec!(120)), (v3, dec!(95))],
            &[],
        )
        .unwrap();
        assert_eq!(analytics.avg_price, dec!(105.00));
        assert_eq!(analytics.min_price, dec!(95));
        assert_eq!(analytics.max_price, dec!(120));
        assert_eq!(analytics.median_price, dec!(100));
        assert_eq!(analytics.lowest_price_vendor, Some(v3));
        assert!(analytics.volatility_score > Decimal::ZERO);
    }

    #[test]
    fn test_trend_detection() {
        let rising = vec![
            event(dec!(100), dec!(100)),
            event(dec!(100), dec!(102)),
            event(dec!(102), dec!(115)),
            event(dec!(115), dec!(120)),
        ];
        assert_eq!(trend_from_history(&rising), PriceTrend::Increasing);

        let flat = vec![event(dec!(100), dec!(100)), event(dec!(100), dec!(101))];
        assert_eq!(trend_from_history(&flat), PriceTrend::Stable);

        let falling = vec![
            event(dec!(120), dec!(120)),
            event(dec!(120), dec!(118)),
            event(dec!(118), dec!(100)),
            event(dec!(100), dec!(95)),
        ];
        assert_eq!(trend_from_history(&falling), PriceTrend::Decreasing);
    }

    #[test]
    fn test_empty_listings() {
        assert!(compute_market_analytics(Uuid::new_v4(), &[], &[]).is_none());
    }
}
