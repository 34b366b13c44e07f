//! Weighted multi-criteria ranking of eligible candidates.

use crate::domain::routing::types::{
    RetailerLocation, RoutingConfig, ScoredCandidate, Subscores, VendorCandidate,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Fraction of stock left after serving the order, as [0,100].
fn availability_score(candidate: &VendorCandidate, quantity: Decimal) -> f64 {
    if candidate.listing.stock <= Decimal::ZERO {
        return 0.0;
    }
    let headroom = (candidate.listing.stock - quantity) / candidate.listing.stock;
    (headroom.to_f64().unwrap_or(0.0) * 100.0).clamp(0.0, 100.0)
}

/// Delivery zone match beats same district beats everything else.
fn proximity_score(candidate: &VendorCandidate, retailer: &RetailerLocation) -> f64 {
    if let Some(zone) = &retailer.delivery_zone {
        if candidate
            .vendor
            .delivery_zones
            .iter()
            .any(|z| z.eq_ignore_ascii_case(zone))
        {
            return 100.0;
        }
    }
    if let Some(district) = &retailer.district {
        if candidate.vendor.district.eq_ignore_ascii_case(district) {
            return 70.0;
        }
    }
    30.0
}

fn workload_score(candidate: &VendorCandidate) -> f64 {
    if candidate.vendor.max_active_orders == 0 {
        return 0.0;
    }
    let used = candidate.active_orders as f64 / candidate.vendor.max_active_orders as f64;
    (100.0 * (1.0 - used)).clamp(0.0, 100.0)
}

/// Prices at or below market average score 100; above-average prices lose
/// proportionally to how far above they sit.
fn price_score(candidate: &VendorCandidate) -> f64 {
    let avg = candidate.market_avg_price;
    if avg <= Decimal::ZERO {
        return 100.0;
    }
    let over = (candidate.listing.price - avg).max(Decimal::ZERO) / avg;
    (100.0 * (1.0 - over.to_f64().unwrap_or(1.0))).clamp(0.0, 100.0)
}

fn reliability_score(candidate: &VendorCandidate) -> f64 {
    candidate
        .vendor
        .reliability_score
        .to_f64()
        .unwrap_or(0.0)
        .clamp(0.0, 100.0)
}

pub fn score_candidate(
    candidate: &VendorCandidate,
    quantity: Decimal,
    retailer: &RetailerLocation,
    config: &RoutingConfig,
) -> ScoredCandidate {
    let subscores = Subscores {
        availability: availability_score(candidate, quantity),
        proximity: proximity_score(candidate, retailer),
        workload: workload_score(candidate),
        price: price_score(candidate),
        reliability: reliability_score(candidate),
    };
    let w = &config.weights;
    let total = w.availability * subscores.availability
        + w.proximity * subscores.proximity
        + w.workload * subscores.workload
        + w.price * subscores.price
        + w.reliability * subscores.reliability;

    ScoredCandidate {
        vendor_id: candidate.vendor.id,
        vendor_name: candidate.vendor.name.clone(),
        total,
        subscores,
        active_orders: candidate.active_orders,
        price: candidate.listing.price,
        reliability: candidate.vendor.reliability_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::routing::test_support::candidate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_availability_rewards_headroom() {
        let product = Uuid::new_v4();
        let mut deep = candidate(product, dec!(100), 85);
        deep.listing.stock = dec!(1000);
        let mut shallow = candidate(product, dec!(100), 85);
        shallow.listing.stock = dec!(12);

        assert!(
            availability_score(&deep, dec!(10)) > availability_score(&shallow, dec!(10))
        );
    }

    #[test]
    fn test_price_at_or_below_market_scores_full() {
        let product = Uuid::new_v4();
        let mut cheap = candidate(product, dec!(90), 85);
        cheap.market_avg_price = dec!(100);
        assert_eq!(price_score(&cheap), 100.0);
    }

    #[test]
    fn test_price_above_market_penalized_proportionally() {
        let product = Uuid::new_v4();
        // 60% above market: score drops to 40
        let mut pricey = candidate(product, dec!(160), 85);
        pricey.market_avg_price = dec!(100);
        assert!((price_score(&pricey) - 40.0).abs() < 1e-9);

        // More than double the market price clamps at zero
        let mut outrageous = candidate(product, dec!(250), 85);
        outrageous.market_avg_price = dec!(100);
        assert_eq!(price_score(&outrageous), 0.0);
    }

    #[test]
    fn test_workload_score_empty_vs_full() {
        let product = Uuid::new_v4();
        let mut idle = candidate(product, dec!(100), 85);
        idle.active_orders = 0;
        let mut busy = candidate(product, dec!(100), 85);
        busy.active_orders = busy.vendor.max_active_orders;

        assert_eq!(workload_score(&idle), 100.0);
        assert_eq!(workload_score(&busy), 0.0);
    }

    #[test]
    fn test_proximity_tiers() {
        let product = Uuid::new_v4();
        let mut c = candidate(product, dec!(100), 85);
        c.vendor.delivery_zones = vec!["zone-7".to_string()];
        c.vendor.district = "dhaka".to_string();

        let zone_match = RetailerLocation {
            delivery_zone: Some("ZONE-7".to_string()),
            district: Some("dhaka".to_string()),
        };
        let district_match = RetailerLocation {
            delivery_zone: Some("zone-9".to_string()),
            district: Some("Dhaka".to_string()),
        };
        let neither = RetailerLocation::default();

        assert_eq!(proximity_score(&c, &zone_match), 100.0);
        assert_eq!(proximity_score(&c, &district_match), 70.0);
        assert_eq!(proximity_score(&c, &neither), 30.0);
    }

    #[test]
    fn test_total_is_weighted_sum() {
        let product = Uuid::new_v4();
        let c = candidate(product, dec!(100), 80);
        let scored = score_candidate(
            &c,
            dec!(10),
            &RetailerLocation::default(),
            &RoutingConfig::default(),
        );
        let s = &scored.subscores;
        let expected = 0.30 * s.availability
            + 0.20 * s.proximity
            + 0.15 * s.workload
            + 0.20 * s.price
            + 0.15 * s.reliability;
        assert!((scored.total - expected).abs() < 1e-9);
    }
}
