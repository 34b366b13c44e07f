pub mod eligibility;
pub mod scoring;
pub mod strategy;
pub mod types;

pub use types::{
    LoadBalancingStrategy, RankingWeights, RetailerLocation, RoutingConfig, ScoredCandidate,
    SelectionDecision, Subscores, VendorCandidate,
};

use crate::domain::errors::RoutingError;
use crate::domain::types::{ProductId, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// One full selection run: filter, rank, tie-break, record.
///
/// Pure with respect to its inputs; the routing service assembles the
/// candidate set and persists the returned decision.
#[allow(clippy::too_many_arguments)]
pub fn select_vendor(
    candidates: &[VendorCandidate],
    product_id: ProductId,
    quantity: Decimal,
    retailer: &RetailerLocation,
    exclude: &[VendorId],
    last_vendor: Option<VendorId>,
    config: &RoutingConfig,
    now: DateTime<Utc>,
) -> Result<SelectionDecision, RoutingError> {
    let eligible = eligibility::filter_eligible(candidates, product_id, quantity, exclude, config, now)?;

    let mut ranked: Vec<ScoredCandidate> = eligible
        .iter()
        .map(|c| scoring::score_candidate(c, quantity, retailer, config))
        .collect();
    ranked.sort_by(strategy::by_total_desc);

    let winner = strategy::pick(&ranked, config.strategy, last_vendor).ok_or(
        RoutingError::NoEligibleVendor {
            product_id,
            quantity,
        },
    )?;

    let reason = format!(
        "{} won with score {:.1} ({} candidate(s), strategy {})",
        winner.vendor_name,
        winner.total,
        ranked.len(),
        config.strategy
    );

    Ok(SelectionDecision {
        id: Uuid::new_v4(),
        product_id,
        order_id: None,
        quantity,
        chosen_vendor_id: winner.vendor_id,
        shortlist: ranked.clone(),
        config_snapshot: config.clone(),
        reason,
        excluded: exclude.to_vec(),
        decided_at: now,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::candidate;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_selection_returns_decision_with_snapshot() {
        let product = Uuid::new_v4();
        let cheap = candidate(product, dec!(95), 85);
        let pricey = candidate(product, dec!(140), 60);
        let pool = vec![cheap.clone(), pricey];

        let decision = select_vendor(
            &pool,
            product,
            dec!(10),
            &RetailerLocation::default(),
            &[],
            None,
            &RoutingConfig::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(decision.chosen_vendor_id, cheap.vendor.id);
        assert_eq!(decision.shortlist.len(), 2);
        assert!(decision.shortlist[0].total >= decision.shortlist[1].total);
        assert!((decision.config_snapshot.weights.sum() - 1.0).abs() < 1e-9);
        assert!(decision.reason.contains("score"));
    }

    #[test]
    fn test_exclude_list_forces_alternative() {
        let product = Uuid::new_v4();
        let best = candidate(product, dec!(90), 95);
        let backup = candidate(product, dec!(100), 70);
        let pool = vec![best.clone(), backup.clone()];

        let decision = select_vendor(
            &pool,
            product,
            dec!(10),
            &RetailerLocation::default(),
            &[best.vendor.id],
            None,
            &RoutingConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(decision.chosen_vendor_id, backup.vendor.id);
        assert_eq!(decision.excluded, vec![best.vendor.id]);
    }

    #[test]
    fn test_no_candidates_is_hard_error() {
        let product = Uuid::new_v4();
        let result = select_vendor(
            &[],
            product,
            dec!(10),
            &RetailerLocation::default(),
            &[],
            None,
            &RoutingConfig::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(RoutingError::NoEligibleVendor { .. })));
    }
}
