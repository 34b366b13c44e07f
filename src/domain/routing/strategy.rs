//! Tie-breaking among top-ranked candidates.

use crate::domain::routing::types::{LoadBalancingStrategy, ScoredCandidate};
use crate::domain::types::VendorId;
use std::cmp::Ordering;

/// Candidates within this many points of the best score tie for first.
const TIE_WINDOW: f64 = 1.0;

/// Picks one winner from a ranked (descending by total) shortlist.
///
/// `last_vendor` is the vendor chosen by the previous decision for this
/// product, consulted by the round-robin strategy.
pub fn pick<'a>(
    ranked: &'a [ScoredCandidate],
    strategy: LoadBalancingStrategy,
    last_vendor: Option<VendorId>,
) -> Option<&'a ScoredCandidate> {
    let best = ranked.first()?;
    let tied: Vec<&ScoredCandidate> = ranked
        .iter()
        .filter(|c| best.total - c.total <= TIE_WINDOW)
        .collect();
    if tied.len() == 1 {
        return Some(tied[0]);
    }

    match strategy {
        LoadBalancingStrategy::RoundRobin => Some(round_robin(&tied, last_vendor)),
        LoadBalancingStrategy::LeastLoaded => Some(least_loaded(&tied)),
    }
}

/// Next vendor after the previously chosen one, cycling in vendor-id order
/// so the rotation is stable across runs.
fn round_robin<'a>(
    tied: &[&'a ScoredCandidate],
    last_vendor: Option<VendorId>,
) -> &'a ScoredCandidate {
    let mut ordered: Vec<&ScoredCandidate> = tied.to_vec();
    ordered.sort_by_key(|c| c.vendor_id);

    match last_vendor {
        Some(last) => ordered
            .iter()
            .find(|c| c.vendor_id > last)
            .copied()
            .unwrap_or(ordered[0]),
        None => ordered[0],
    }
}

/// Ascending active orders, then descending reliability, then lower price.
fn least_loaded<'a>(tied: &[&'a ScoredCandidate]) -> &'a ScoredCandidate {
    let mut ordered: Vec<&ScoredCandidate> = tied.to_vec();
    ordered.sort_by(|a, b| {
        a.active_orders
            .cmp(&b.active_orders)
            .then_with(|| b.reliability.cmp(&a.reliability))
            .then_with(|| a.price.cmp(&b.price))
            .then_with(|| a.vendor_id.cmp(&b.vendor_id))
    });
    ordered[0]
}

/// Descending-total comparator with a stable id tiebreak for sorting.
pub fn by_total_desc(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.total
        .partial_cmp(&a.total)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.vendor_id.cmp(&b.vendor_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::routing::types::Subscores;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn scored(total: f64, active: u32, reliability: i64, price: i64) -> ScoredCandidate {
        ScoredCandidate {
            vendor_id: Uuid::new_v4(),
            vendor_name: "V".to_string(),
            total,
            subscores: Subscores {
                availability: 0.0,
                proximity: 0.0,
                workload: 0.0,
                price: 0.0,
                reliability: 0.0,
            },
            active_orders: active,
            price: dec!(1) * rust_decimal::Decimal::from(price),
            reliability: rust_decimal::Decimal::from(reliability),
        }
    }

    #[test]
    fn test_clear_winner_ignores_strategy() {
        let ranked = vec![scored(90.0, 5, 50, 100), scored(70.0, 0, 99, 50)];
        let winner = pick(&ranked, LoadBalancingStrategy::LeastLoaded, None).unwrap();
        assert_eq!(winner.vendor_id, ranked[0].vendor_id);
    }

    #[test]
    fn test_least_loaded_breaks_tie_by_active_orders() {
        let a = scored(80.0, 4, 50, 100);
        let b = scored(79.5, 1, 50, 100);
        let ranked = vec![a, b.clone()];
        let winner = pick(&ranked, LoadBalancingStrategy::LeastLoaded, None).unwrap();
        assert_eq!(winner.vendor_id, b.vendor_id);
    }

    #[test]
    fn test_least_loaded_falls_to_reliability_then_price() {
        let a = scored(80.0, 2, 60, 100);
        let b = scored(80.0, 2, 90, 100);
        let ranked = vec![a, b.clone()];
        let winner = pick(&ranked, LoadBalancingStrategy::LeastLoaded, None).unwrap();
        assert_eq!(winner.vendor_id, b.vendor_id);

        let c = scored(80.0, 2, 90, 80);
        let d = scored(80.0, 2, 90, 95);
        let ranked = vec![d, c.clone()];
        let winner = pick(&ranked, LoadBalancingStrategy::LeastLoaded, None).unwrap();
        assert_eq!(winner.vendor_id, c.vendor_id);
    }

    #[test]
    fn test_round_robin_advances_past_last_winner() {
        let mut tied = vec![scored(80.0, 0, 50, 100), scored(80.0, 0, 50, 100)];
        tied.sort_by_key(|c| c.vendor_id);
        let first = pick(&tied, LoadBalancingStrategy::RoundRobin, None).unwrap();
        assert_eq!(first.vendor_id, tied[0].vendor_id);

        let second = pick(
            &tied,
            LoadBalancingStrategy::RoundRobin,
            Some(tied[0].vendor_id),
        )
        .unwrap();
        assert_eq!(second.vendor_id, tied[1].vendor_id);

        // Wraps around
        let third = pick(
            &tied,
            LoadBalancingStrategy::RoundRobin,
            Some(tied[1].vendor_id),
        )
        .unwrap();
        assert_eq!(third.vendor_id, tied[0].vendor_id);
    }

    #[test]
    fn test_empty_shortlist() {
        assert!(pick(&[], LoadBalancingStrategy::LeastLoaded, None).is_none());
    }
}
