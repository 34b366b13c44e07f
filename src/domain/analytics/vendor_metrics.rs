//! Vendor performance metrics, derived from order event history.
//!
//! The reliability score is recomputed from these metrics on a timer and
//! written back to the vendor row; it is never hand-edited.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Raw event counts for a vendor over the scoring window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VendorEventCounts {
    pub assigned: u64,
    pub accepted: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Mean hours from acceptance to delivery across completed orders.
    pub avg_fulfillment_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorPerformance {
    pub acceptance_rate: Decimal,
    pub completion_rate: Decimal,
    pub cancellation_rate: Decimal,
    pub avg_fulfillment_hours: Decimal,
    pub speed_score: Decimal,
    pub price_competitiveness_index: Decimal,
    pub reliability_score: Decimal,
}

/// Hours at or under which fulfilment scores full marks.
const SPEED_FLOOR_HOURS: f64 = 6.0;
/// Hours at or past which fulfilment scores zero.
const SPEED_CEILING_HOURS: f64 = 48.0;

fn pct(numerator: u64, denominator: u64) -> Decimal {
    if denominator == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(numerator * 100) / Decimal::from(denominator)
}

/// Linear speed score between the floor and ceiling.
pub fn speed_score(avg_fulfillment_hours: f64) -> Decimal {
    let score = if avg_fulfillment_hours <= SPEED_FLOOR_HOURS {
        100.0
    } else if avg_fulfillment_hours >= SPEED_CEILING_HOURS {
        0.0
    } else {
        100.0 * (SPEED_CEILING_HOURS - avg_fulfillment_hours)
            / (SPEED_CEILING_HOURS - SPEED_FLOOR_HOURS)
    };
    Decimal::from_f64(score).unwrap_or(Decimal::ZERO).round_dp(2)
}

/// The fixed reliability formula:
/// 0.25·accept + 0.30·complete + 0.20·speed + 0.15·(100−cancel) + 0.10·price.
pub fn compute_performance(
    counts: &VendorEventCounts,
    price_competitiveness_index: Decimal,
) -> VendorPerformance {
    let acceptance_rate = pct(counts.accepted, counts.assigned);
    let completion_rate = pct(counts.completed, counts.accepted);
    let cancellation_rate = pct(counts.cancelled, counts.assigned);
    let speed = speed_score(counts.avg_fulfillment_hours);

    let reliability = dec!(0.25) * acceptance_rate
        + dec!(0.30) * completion_rate
        + dec!(0.20) * speed
        + dec!(0.15) * (dec!(100) - cancellation_rate)
        + dec!(0.10) * price_competitiveness_index;

    VendorPerformance {
        acceptance_rate: acceptance_rate.round_dp(2),
        completion_rate: completion_rate.round_dp(2),
        cancellation_rate: cancellation_rate.round_dp(2),
        avg_fulfillment_hours: Decimal::from_f64(counts.avg_fulfillment_hours)
            .unwrap_or(Decimal::ZERO)
            .round_dp(2),
        speed_score: speed,
        price_competitiveness_index,
        reliability_score: reliability.round_dp(2).clamp(Decimal::ZERO, dec!(100)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_from_counts() {
        let counts = VendorEventCounts {
            assigned: 100,
            accepted: 90,
            completed: 81,
            cancelled: 5,
            avg_fulfillment_hours: 6.0,
        };
        let perf = compute_performance(&counts, dec!(100));
        assert_eq!(perf.acceptance_rate, dec!(90.00));
        assert_eq!(perf.completion_rate, dec!(90.00));
        assert_eq!(perf.cancellation_rate, dec!(5.00));
    }

    #[test]
    fn test_reliability_formula_weights() {
        let counts = VendorEventCounts {
            assigned: 100,
            accepted: 90,
            completed: 81,
            cancelled: 5,
            avg_fulfillment_hours: 6.0, // full speed marks
        };
        let perf = compute_performance(&counts, dec!(80));
        // 0.25*90 + 0.30*90 + 0.20*100 + 0.15*95 + 0.10*80 = 91.75
        assert_eq!(perf.reliability_score, dec!(91.75));
    }

    #[test]
    fn test_speed_score_bounds() {
        assert_eq!(speed_score(2.0), dec!(100));
        assert_eq!(speed_score(48.0), dec!(0));
        assert_eq!(speed_score(72.0), dec!(0));
        let mid = speed_score(27.0); // halfway between 6 and 48
        assert_eq!(mid, dec!(50.00));
    }

    #[test]
    fn test_zero_history_scores_safely() {
        let perf = compute_performance(&VendorEventCounts::default(), Decimal::ZERO);
        // No events: only the (100 - cancel) term contributes
        assert_eq!(perf.reliability_score, dec!(35.00));
    }
}
