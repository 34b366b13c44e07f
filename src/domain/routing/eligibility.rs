//! Candidate filtering ahead of ranking.
//!
//! Step 1 (sells the product, approved, active, stock and order-size
//! bounds) is a hard filter: an empty result is a routing failure. The
//! soft filters (working hours, load capacity, monopoly cap) fall back to
//! the previous set with a logged warning when they would empty it.

use crate::domain::errors::RoutingError;
use crate::domain::routing::types::{RoutingConfig, VendorCandidate};
use crate::domain::types::{ProductId, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

pub fn filter_eligible<'a>(
    candidates: &'a [VendorCandidate],
    product_id: ProductId,
    quantity: Decimal,
    exclude: &[VendorId],
    config: &RoutingConfig,
    now: DateTime<Utc>,
) -> Result<Vec<&'a VendorCandidate>, RoutingError> {
    // 1. Hard eligibility
    let eligible: Vec<&VendorCandidate> = candidates
        .iter()
        .filter(|c| {
            c.vendor.is_approved
                && c.vendor.is_active
                && !exclude.contains(&c.vendor.id)
                && c.listing.product_id == product_id
                && c.listing.can_fulfil(quantity)
        })
        .collect();
    if eligible.is_empty() {
        return Err(RoutingError::NoEligibleVendor {
            product_id,
            quantity,
        });
    }

    // 2. Working hours (soft)
    let mut current = eligible;
    if config.working_hours_enabled {
        let in_hours: Vec<&VendorCandidate> = current
            .iter()
            .copied()
            .filter(|c| c.vendor.working_hours.contains(now))
            .collect();
        if in_hours.is_empty() {
            warn!(
                product_id = %product_id,
                "Working-hours filter emptied the candidate set; skipping it"
            );
        } else {
            current = in_hours;
        }
    }

    // 3. Load capacity (soft)
    let within_capacity: Vec<&VendorCandidate> = current
        .iter()
        .copied()
        .filter(|c| {
            c.active_orders < c.vendor.max_active_orders
                && c.pending_orders < c.vendor.max_pending_orders
        })
        .collect();
    if within_capacity.is_empty() {
        warn!(
            product_id = %product_id,
            "Load-capacity filter emptied the candidate set; skipping it"
        );
    } else {
        current = within_capacity;
    }

    // 4. Monopoly prevention (soft)
    let below_cap: Vec<&VendorCandidate> = current
        .iter()
        .copied()
        .filter(|c| c.market_share_30d < config.monopoly_threshold)
        .collect();
    if below_cap.is_empty() {
        warn!(
            product_id = %product_id,
            threshold = config.monopoly_threshold,
            "Monopoly filter emptied the candidate set; skipping it"
        );
    } else {
        current = below_cap;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::routing::test_support::candidate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hard_filter_is_hard() {
        let product = uuid::Uuid::new_v4();
        let mut c = candidate(product, dec!(100), 85);
        c.listing.stock = dec!(5);
        let result = filter_eligible(
            std::slice::from_ref(&c),
            product,
            dec!(10),
            &[],
            &RoutingConfig::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(RoutingError::NoEligibleVendor { .. })));
    }

    #[test]
    fn test_excluded_vendor_filtered() {
        let product = uuid::Uuid::new_v4();
        let c = candidate(product, dec!(100), 85);
        let excluded = vec![c.vendor.id];
        let result = filter_eligible(
            std::slice::from_ref(&c),
            product,
            dec!(10),
            &excluded,
            &RoutingConfig::default(),
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_capacity_excludes_full_vendor() {
        let product = uuid::Uuid::new_v4();
        let mut full = candidate(product, dec!(100), 85);
        full.active_orders = full.vendor.max_active_orders;
        let free = candidate(product, dec!(110), 80);

        let pool = vec![full.clone(), free.clone()];
        let kept = filter_eligible(
            &pool,
            product,
            dec!(10),
            &[],
            &RoutingConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].vendor.id, free.vendor.id);

        // One completed order re-qualifies the vendor immediately
        full.active_orders -= 1;
        let pool = vec![full.clone(), free];
        let kept = filter_eligible(
            &pool,
            product,
            dec!(10),
            &[],
            &RoutingConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_soft_filter_falls_back_when_all_full() {
        let product = uuid::Uuid::new_v4();
        let mut c = candidate(product, dec!(100), 85);
        c.active_orders = c.vendor.max_active_orders;
        let kept = filter_eligible(
            std::slice::from_ref(&c),
            product,
            dec!(10),
            &[],
            &RoutingConfig::default(),
            Utc::now(),
        )
        .unwrap();
        // Capacity filter would empty the set, so it is skipped
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_monopoly_cap_excludes_dominant_vendor() {
        let product = uuid::Uuid::new_v4();
        let mut dominant = candidate(product, dec!(90), 90);
        dominant.market_share_30d = 0.55;
        let challenger = candidate(product, dec!(100), 80);

        let pool = vec![dominant, challenger.clone()];
        let kept = filter_eligible(
            &pool,
            product,
            dec!(10),
            &[],
            &RoutingConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].vendor.id, challenger.vendor.id);
    }
}
