//! Vendor selection, deadline-driven reassignment, and escalation.

mod common;

use common::harness;
use mandi::domain::records::NotificationKind;
use mandi::domain::types::{AssignmentStatus, OrderStatus};
use mandi::domain::workflow::VendorAssignmentRetry;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_selection_persists_decision_with_snapshot() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(5000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let cheap = h.seed_vendor(&rice, dec!(95), dec!(500), 85).await;
    let pricey = h.seed_vendor(&rice, dec!(140), dec!(500), 60).await;

    let decision = h
        .routing
        .select_for_product(rice.id, dec!(10), &retailer, &[], None)
        .await?;

    assert_eq!(decision.chosen_vendor_id, cheap.id);
    assert_eq!(decision.shortlist.len(), 2);
    // Invariant: the winner satisfied the filters under this snapshot
    assert!((decision.config_snapshot.weights.sum() - 1.0).abs() < 1e-9);
    assert!(decision
        .shortlist
        .iter()
        .any(|c| c.vendor_id == pricey.id));

    // Decision log drives round-robin memory
    let last = h
        .routing
        .select_for_product(rice.id, dec!(10), &retailer, &[cheap.id], None)
        .await?;
    assert_eq!(last.chosen_vendor_id, pricey.id);
    assert_eq!(last.excluded, vec![cheap.id]);
    Ok(())
}

#[tokio::test]
async fn test_timeout_reassigns_excluding_previous_vendor() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(50000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let v1 = h.seed_vendor(&rice, dec!(95), dec!(500), 90).await;
    let v2 = h.seed_vendor(&rice, dec!(100), dec!(500), 80).await;

    // Place the order; selection should prefer v1
    let parse = h
        .intake
        .parse(
            mandi::domain::types::InputSource::Text,
            "10 kg rice",
            retailer.id,
        )
        .await?;
    h.intake.place_from_session(parse.session_id).await?;
    let order = h.orders_repo.list_for_retailer(retailer.id).await?[0].clone();
    assert_eq!(order.vendor_id, v1.id);

    // The initial assignment carries a response deadline
    let assignment = h.assignments.latest_for_order(order.id).await?.unwrap();
    assert_eq!(assignment.vendor_id, v1.id);
    assert_eq!(assignment.attempt_number, 1);
    assert!(assignment.response_deadline > Utc::now() + Duration::minutes(110));

    // Deadline elapses without an accept
    let retry = h.routing.handle_timeout(&assignment).await?.expect("reassigned");
    assert_eq!(retry.vendor_id, v2.id);
    assert_eq!(retry.attempt_number, 2);

    // The order moved vendors exactly once and is still PENDING
    let after = h.orders_repo.find(order.id).await?.unwrap();
    assert_eq!(after.vendor_id, v2.id);
    assert_eq!(after.status, OrderStatus::Pending);

    let first = h.assignments.latest_for_order(order.id).await?.unwrap();
    assert_eq!(first.attempt_number, 2);
    Ok(())
}

#[tokio::test]
async fn test_accept_and_reject_close_assignments() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(50000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let v1 = h.seed_vendor(&rice, dec!(95), dec!(500), 90).await;
    let v2 = h.seed_vendor(&rice, dec!(100), dec!(500), 80).await;

    let parse = h
        .intake
        .parse(
            mandi::domain::types::InputSource::Text,
            "10 kg rice",
            retailer.id,
        )
        .await?;
    h.intake.place_from_session(parse.session_id).await?;
    let order = h.orders_repo.list_for_retailer(retailer.id).await?[0].clone();

    // Reject: the attempt closes and selection re-runs without v1
    let retry = h
        .routing
        .reject_assignment(order.id, v1.id, "out of stock")
        .await?
        .expect("rerouted");
    assert_eq!(retry.vendor_id, v2.id);

    // Accept from v2 confirms the order
    let confirmed = h.routing.accept_assignment(order.id, v2.id).await?;
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    let last = h.assignments.latest_for_order(order.id).await?.unwrap();
    assert_eq!(last.status, AssignmentStatus::Success);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_attempts_escalate_to_manual_routing() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(50000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let v1 = h.seed_vendor(&rice, dec!(95), dec!(500), 90).await;

    let parse = h
        .intake
        .parse(
            mandi::domain::types::InputSource::Text,
            "10 kg rice",
            retailer.id,
        )
        .await?;
    h.intake.place_from_session(parse.session_id).await?;
    let order = h.orders_repo.list_for_retailer(retailer.id).await?[0].clone();

    // Simulate attempts 2..=5 already burned
    for attempt in 2..=5 {
        h.assignments
            .insert(&VendorAssignmentRetry::assign(
                order.id,
                v1.id,
                attempt,
                Utc::now() - Duration::minutes(1),
            ))
            .await?;
    }

    // The next timeout would need attempt 6: escalate instead
    let last = h.assignments.latest_for_order(order.id).await?.unwrap();
    let outcome = h.routing.handle_timeout(&last).await?;
    assert!(outcome.is_none());

    // Admin notified; the order is still PENDING, never FAILED
    let notifications = h.notifications.unacknowledged(10).await?;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::ManualIntervention);

    let after = h.orders_repo.find(order.id).await?.unwrap();
    assert_eq!(after.status, OrderStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn test_monopoly_cap_diverts_from_dominant_vendor() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(500000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let favourite = h.seed_vendor(&rice, dec!(90), dec!(5000), 95).await;
    let backup = h.seed_vendor(&rice, dec!(92), dec!(5000), 85).await;

    // First order goes to the better-scoring favourite
    let parse = h
        .intake
        .parse(
            mandi::domain::types::InputSource::Text,
            "10 kg rice",
            retailer.id,
        )
        .await?;
    h.intake.place_from_session(parse.session_id).await?;
    let orders = h.orders_repo.list_for_retailer(retailer.id).await?;
    assert_eq!(orders[0].vendor_id, favourite.id);

    // The favourite now holds 100% of the 30-day share for rice, which
    // trips the monopoly cap on the next selection
    let shares = h.orders_repo.vendor_share_30d(rice.id).await?;
    assert!(shares.get(&favourite.id).copied().unwrap_or(0.0) > 0.99);

    let decision = h
        .routing
        .select_for_product(rice.id, dec!(10), &retailer, &[], None)
        .await?;
    assert_eq!(decision.chosen_vendor_id, backup.id);
    Ok(())
}
