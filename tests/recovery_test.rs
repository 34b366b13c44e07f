//! Crash-resume and self-healing: stale workflows, stuck webhooks,
//! stuck orders, recovery exhaustion.

mod common;

use chrono::{Duration, Utc};
use common::{harness, wait_until};
use mandi::domain::types::{OrderStatus, RecoveryStatus, WebhookStatus, WorkflowStatus};
use mandi::domain::workflow::{OrderRecoveryState, WebhookEvent, WorkflowState, WorkflowType};
use rust_decimal_macros::dec;
use serde_json::json;

async fn seed_pending_order(h: &common::Harness) -> mandi::domain::order::Order {
    let retailer = h.seed_retailer(dec!(50000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    h.seed_vendor(&rice, dec!(100), dec!(500), 85).await;
    let parse = h
        .intake
        .parse(
            mandi::domain::types::InputSource::Text,
            "10 kg rice",
            retailer.id,
        )
        .await
        .expect("parse");
    h.intake
        .place_from_session(parse.session_id)
        .await
        .expect("place");
    h.orders_repo.list_for_retailer(retailer.id).await.expect("orders")[0].clone()
}

#[tokio::test]
async fn test_stale_workflow_resume_sends_confirmation_exactly_once() -> anyhow::Result<()> {
    let h = harness().await;
    let order = seed_pending_order(&h).await;

    // The original confirmation from order creation
    let whatsapp = h.whatsapp.clone();
    assert!(
        wait_until(
            || {
                let whatsapp = whatsapp.clone();
                async move { whatsapp.sent_count() >= 1 }
            },
            std::time::Duration::from_secs(3)
        )
        .await
    );
    // Let the send task close its idempotency key before resuming
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let baseline = h.whatsapp.sent_count();

    // Simulate a crash mid-workflow: an in_progress row at
    // send_confirmation with a 10-minute-old heartbeat
    let mut workflow = WorkflowState::begin(WorkflowType::OrderCreation, order.id.to_string());
    workflow
        .advance_to("send_confirmation", json!({}), Utc::now() - Duration::minutes(10))
        .unwrap();
    h.workflows.insert(&workflow).await?;

    h.recovery.run_cycle().await;

    // The workflow is resumed and completed...
    let resumed = h.workflows.find(workflow.id).await?.unwrap();
    assert_eq!(resumed.status, WorkflowStatus::Completed);

    // ...but the confirmation idempotency key stops a duplicate send
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(h.whatsapp.sent_count(), baseline);
    Ok(())
}

#[tokio::test]
async fn test_stuck_processing_webhook_is_repicked() -> anyhow::Result<()> {
    let h = harness().await;

    let mut event = WebhookEvent::receive("whatsapp", "{}", json!({}), 3);
    event.status = WebhookStatus::Processing;
    event.received_at = Utc::now() - Duration::minutes(20);
    h.webhooks_repo.insert(&event).await?;

    let repicked = h.webhooks.repickup_stuck().await?;
    assert_eq!(repicked, 1);

    let after = h.webhooks_repo.find(event.id).await?.unwrap();
    assert_eq!(after.status, WebhookStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn test_failed_webhook_backs_off_then_fails_terminally() -> anyhow::Result<()> {
    let h = harness().await;

    // Payload with an unknown phone: processing will fail each attempt
    h.webhooks
        .receive(
            "whatsapp",
            r#"{"from":"+8809999999999","text":"10 kg rice"}"#,
            json!({}),
        )
        .await?;

    // Three sweeps exhaust max_retries=3; force due times in between
    for _ in 0..3 {
        h.webhooks.process_due(10).await?;
        sqlx::query("UPDATE webhook_events SET next_attempt_at = $1")
            .bind(Utc::now() - Duration::seconds(1))
            .execute(&h.database.pool)
            .await?;
    }

    let counts = h.webhooks_repo.counts_by_status().await?;
    assert_eq!(counts.get("failed").copied().unwrap_or(0), 1);
    Ok(())
}

#[tokio::test]
async fn test_stuck_pending_order_triggers_reassignment() -> anyhow::Result<()> {
    let h = harness().await;
    let order = seed_pending_order(&h).await;

    // Age the order past the 30-minute PENDING threshold
    sqlx::query("UPDATE orders SET status_changed_at = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::minutes(31))
        .bind(order.id.to_string())
        .execute(&h.database.pool)
        .await?;

    let dashboard = h.recovery.dashboard().await?;
    assert_eq!(dashboard.stuck_orders, 1);

    let report = h.recovery.run_cycle().await;
    assert_eq!(report.stuck_actions, 1);

    // The order was handed to the routing queue, not failed
    let after = h.orders_repo.find(order.id).await?.unwrap();
    assert_ne!(after.status, OrderStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn test_recovery_exhaustion_raises_manual_intervention() -> anyhow::Result<()> {
    let h = harness().await;
    let order = seed_pending_order(&h).await;

    let mut state = OrderRecoveryState::capture(
        order.id,
        OrderStatus::Pending,
        "send_confirmation",
        "broker unreachable",
    );
    state.attempts = OrderRecoveryState::MAX_ATTEMPTS;
    h.recovery_repo.capture(&state).await?;
    h.recovery_repo.save(&state).await?;

    h.recovery.run_cycle().await;

    let after = h.recovery_repo.find_by_order(order.id).await?.unwrap();
    assert_eq!(after.recovery_status, RecoveryStatus::Failed);

    let notifications = h.notifications.unacknowledged(10).await?;
    assert!(!notifications.is_empty());
    assert!(notifications[0].subject.contains(&order.id.to_string()));

    // The order itself never becomes FAILED
    let order_after = h.orders_repo.find(order.id).await?.unwrap();
    assert_eq!(order_after.status, OrderStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn test_successful_recovery_stays_quiet() -> anyhow::Result<()> {
    let h = harness().await;
    let order = seed_pending_order(&h).await;

    h.recovery_repo
        .capture(&OrderRecoveryState::capture(
            order.id,
            OrderStatus::Pending,
            "send_confirmation",
            "transient send failure",
        ))
        .await?;

    h.recovery.run_cycle().await;

    let after = h.recovery_repo.find_by_order(order.id).await?.unwrap();
    assert_eq!(after.recovery_status, RecoveryStatus::Recovered);

    // No admin noise for a successful recovery
    assert!(h.notifications.unacknowledged(10).await?.is_empty());
    Ok(())
}
