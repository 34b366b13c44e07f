//! Price intelligence: history, market recompute, spike alerts and the
//! knock-on effect on routing.

mod common;

use common::harness;
use mandi::domain::analytics::{AlertSeverity, PriceTrend};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_price_spike_raises_critical_alert_and_demotes_vendor() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(50000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let v1 = h.seed_vendor(&rice, dec!(100), dec!(500), 80).await;
    let v3 = h.seed_vendor(&rice, dec!(100), dec!(500), 80).await;

    // V3 raises rice from 100 to 160 (+60%)
    let alert = h
        .analytics
        .record_price_change(v3.id, rice.id, dec!(160))
        .await?
        .expect("a +60% move must alert");
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert_eq!(alert.change_pct, dec!(60.00));
    assert_eq!(alert.old_price, dec!(100));
    assert_eq!(alert.new_price, dec!(160));

    // History row exists and market analytics were recomputed
    let history = h.prices.history_for_product(rice.id, 10).await?;
    assert_eq!(history.len(), 1);
    let market = h.prices.latest_market(rice.id).await?.unwrap();
    assert_eq!(market.avg_price, dec!(130.00));
    assert_eq!(market.min_price, dec!(100));
    assert_eq!(market.max_price, dec!(160));
    assert_eq!(market.lowest_price_vendor, Some(v1.id));

    // Routing now favours the cheaper vendor, with V3's price subscore
    // dropping proportionally
    let decision = h
        .routing
        .select_for_product(rice.id, dec!(10), &retailer, &[], None)
        .await?;
    assert_eq!(decision.chosen_vendor_id, v1.id);
    let v3_scored = decision
        .shortlist
        .iter()
        .find(|c| c.vendor_id == v3.id)
        .unwrap();
    let v1_scored = decision
        .shortlist
        .iter()
        .find(|c| c.vendor_id == v1.id)
        .unwrap();
    assert!(v3_scored.subscores.price < v1_scored.subscores.price);
    assert_eq!(v1_scored.subscores.price, 100.0);

    Ok(())
}

#[tokio::test]
async fn test_small_changes_do_not_alert() -> anyhow::Result<()> {
    let h = harness().await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let vendor = h.seed_vendor(&rice, dec!(100), dec!(500), 80).await;

    let alert = h
        .analytics
        .record_price_change(vendor.id, rice.id, dec!(110))
        .await?;
    assert!(alert.is_none());

    // History is still appended for every change
    assert_eq!(h.prices.history_for_product(rice.id, 10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_trend_emerges_from_history() -> anyhow::Result<()> {
    let h = harness().await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let vendor = h.seed_vendor(&rice, dec!(100), dec!(500), 80).await;

    for price in [dec!(102), dec!(105), dec!(118), dec!(125)] {
        h.analytics
            .record_price_change(vendor.id, rice.id, price)
            .await?;
    }

    let market = h.prices.latest_market(rice.id).await?.unwrap();
    assert_eq!(market.trend, PriceTrend::Increasing);
    Ok(())
}

#[tokio::test]
async fn test_vendor_reliability_recompute_writes_back() -> anyhow::Result<()> {
    let h = harness().await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let vendor = h.seed_vendor(&rice, dec!(100), dec!(500), 80).await;

    h.analytics.recompute_all_markets().await?;
    let recomputed = h.analytics.recompute_vendor_scores().await?;
    assert_eq!(recomputed, 1);

    // With no event history the derived score replaces the seeded one
    let after = h.vendors.find(vendor.id).await?.unwrap();
    assert_ne!(after.reliability_score, dec!(80));
    // 0.20 * 100 (speed floor) + 0.15 * 100 (no cancellations)
    // + 0.10 * 100 (at-market price) = 45
    assert_eq!(after.reliability_score, dec!(45.00));
    Ok(())
}
