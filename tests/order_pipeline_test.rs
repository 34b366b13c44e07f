//! End-to-end order pipeline: WhatsApp text in, orders + ledger out.

mod common;

use common::{harness, wait_until};
use mandi::application::order_service::PlaceOrderOutcome;
use mandi::application::messaging;
use mandi::domain::order::{LineItem, NewOrder};
use mandi::domain::repositories::CreateOrderResult;
use mandi::domain::types::{InputSource, OrderStatus, RejectionReason, TransactionType};
use mandi::domain::workflow::WorkflowType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

#[tokio::test]
async fn test_happy_whatsapp_order_creates_orders_per_vendor() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(5000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &["chal"]).await;
    let oil = h.seed_product("OIL-SOY-5", "Oil", "l", &["tel"]).await;
    let v1 = h.seed_vendor(&rice, dec!(100), dec!(50), 85).await;
    let v2 = h.seed_vendor(&oil, dec!(200), dec!(30), 78).await;

    let result = h
        .intake
        .parse(InputSource::WhatsApp, "10 kg rice, 5 l oil", retailer.id)
        .await?;
    assert!(result.overall_confidence >= 80);
    assert!(!result.needs_clarification);

    let outcomes = h.intake.place_from_session(result.session_id).await?;
    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(matches!(outcome, PlaceOrderOutcome::Created { .. }));
    }

    // One order per vendor, with the right vendor per product
    let orders = h.orders_repo.list_for_retailer(retailer.id).await?;
    assert_eq!(orders.len(), 2);
    let rice_order = orders
        .iter()
        .find(|o| o.line_items[0].product_id == rice.id)
        .expect("rice order");
    let oil_order = orders
        .iter()
        .find(|o| o.line_items[0].product_id == oil.id)
        .expect("oil order");
    assert_eq!(rice_order.vendor_id, v1.id);
    assert_eq!(oil_order.vendor_id, v2.id);
    assert_eq!(rice_order.total, dec!(1000.00));
    assert_eq!(oil_order.total, dec!(1000.00));
    assert_eq!(rice_order.status, OrderStatus::Pending);

    // Credit invariant after two accepted orders
    let after = h.retailers.find(retailer.id).await?.unwrap();
    assert_eq!(after.outstanding_debt, dec!(2000.00));
    assert_eq!(after.available_credit, dec!(3000.00));
    assert!(after.credit_invariant_holds());

    // One ORDER_CREDIT entry per (retailer, vendor) chain
    for order in &orders {
        let chain = h.ledger_repo.chain(retailer.id, order.vendor_id).await?;
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].transaction_type, TransactionType::OrderCredit);
        assert_eq!(chain[0].running_balance, dec!(1000.00));
        assert_eq!(chain[0].linked_order_id, Some(order.id));
    }

    // Workflow completed for both orders
    for order in &orders {
        let wf = h
            .workflows
            .find_by_entity(WorkflowType::OrderCreation, &order.id.to_string())
            .await?
            .expect("workflow row");
        assert_eq!(
            wf.status,
            mandi::domain::types::WorkflowStatus::Completed
        );
    }

    // Confirmations dispatched through the queue (sync executor)
    let whatsapp = h.whatsapp.clone();
    assert!(
        wait_until(
            || {
                let whatsapp = whatsapp.clone();
                async move { whatsapp.sent_count() >= 2 }
            },
            Duration::from_secs(3)
        )
        .await,
        "expected two confirmation messages"
    );
    let templates = h.whatsapp.sent_templates();
    assert!(templates
        .iter()
        .all(|t| t.template == messaging::TPL_ORDER_CONFIRMATION));

    Ok(())
}

#[tokio::test]
async fn test_replayed_payload_does_not_create_second_order() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(5000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    h.seed_vendor(&rice, dec!(100), dec!(50), 85).await;

    let first = h
        .intake
        .parse(InputSource::WhatsApp, "10 kg rice", retailer.id)
        .await?;
    let outcomes = h.intake.place_from_session(first.session_id).await?;
    assert!(matches!(outcomes[0], PlaceOrderOutcome::Created { .. }));
    let created_response = match &outcomes[0] {
        PlaceOrderOutcome::Created { response, .. } => response.clone(),
        other => panic!("expected created, got {:?}", other),
    };

    // The same payload parsed again maps to the same idempotency keys
    let second = h
        .intake
        .parse(InputSource::WhatsApp, "10 kg rice", retailer.id)
        .await?;
    let replayed = h.intake.place_from_session(second.session_id).await?;
    match &replayed[0] {
        PlaceOrderOutcome::Replayed { response } => {
            // Byte-identical response on replay
            assert_eq!(response, &created_response);
        }
        other => panic!("expected replay, got {:?}", other),
    }

    assert_eq!(h.orders_repo.list_for_retailer(retailer.id).await?.len(), 1);
    let after = h.retailers.find(retailer.id).await?.unwrap();
    assert_eq!(after.outstanding_debt, dec!(1000.00));

    Ok(())
}

#[tokio::test]
async fn test_credit_rejection_writes_no_order() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(300)).await;
    let oil = h.seed_product("OIL-SOY-5", "Oil", "l", &[]).await;
    let vendor = h.seed_vendor(&oil, dec!(100), dec!(50), 80).await;

    let new_order = NewOrder {
        retailer_id: retailer.id,
        vendor_id: vendor.id,
        line_items: vec![LineItem {
            product_id: oil.id,
            product_name: oil.name.clone(),
            sku: oil.sku.clone(),
            quantity: dec!(5),
            unit: "l".to_string(),
            unit_price: dec!(100),
            tax_rate: Decimal::ZERO,
            line_total: dec!(500.00),
        }],
        total: dec!(500.00),
        idempotency_key: None,
    };

    let outcome = h.orders.place_order(new_order, "5 l oil").await?;
    match outcome {
        PlaceOrderOutcome::Rejected(rejection) => {
            assert_eq!(rejection.reason, RejectionReason::CreditLimitExceeded);
            assert_eq!(rejection.shortfall, Some(dec!(200.00)));
            assert_eq!(rejection.available_credit, dec!(300));
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    // No order row, ledger untouched, rejection recorded for review
    assert!(h.orders_repo.list_for_retailer(retailer.id).await?.is_empty());
    assert_eq!(
        h.ledger_repo.latest_balance(retailer.id, vendor.id).await?,
        Decimal::ZERO
    );
    let after = h.retailers.find(retailer.id).await?.unwrap();
    assert_eq!(after.available_credit, dec!(300));

    let rejections = h.rejected.unreviewed(10).await?;
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].shortfall, Some(dec!(200.00)));

    // The buyer-facing message carries the available credit, nothing else
    let whatsapp = h.whatsapp.clone();
    assert!(
        wait_until(
            || {
                let whatsapp = whatsapp.clone();
                async move { whatsapp.sent_count() >= 1 }
            },
            Duration::from_secs(3)
        )
        .await
    );
    let sent = h.whatsapp.sent_templates();
    assert_eq!(sent[0].template, messaging::TPL_ORDER_REJECTED_CREDIT);
    assert_eq!(sent[0].variables, vec!["Rs.300".to_string()]);
    let rendered = messaging::render(&sent[0].template, &sent[0].variables);
    assert!(rendered.starts_with("Order exceeds available credit limit. Your available credit is Rs.300"));

    Ok(())
}

#[tokio::test]
async fn test_exact_credit_boundary() -> anyhow::Result<()> {
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(1000)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let vendor = h.seed_vendor(&rice, dec!(100), dec!(100), 80).await;

    let order_for = |total: Decimal, qty: Decimal| NewOrder {
        retailer_id: retailer.id,
        vendor_id: vendor.id,
        line_items: vec![LineItem {
            product_id: rice.id,
            product_name: rice.name.clone(),
            sku: rice.sku.clone(),
            quantity: qty,
            unit: "kg".to_string(),
            unit_price: total / qty,
            tax_rate: Decimal::ZERO,
            line_total: total,
        }],
        total,
        idempotency_key: None,
    };

    // One minor unit over: rejected with an exact one-paisa shortfall
    let over = h
        .orders
        .place_order(order_for(dec!(1000.01), dec!(1)), "rice")
        .await?;
    match over {
        PlaceOrderOutcome::Rejected(r) => assert_eq!(r.shortfall, Some(dec!(0.01))),
        other => panic!("expected rejection, got {:?}", other),
    }

    // Credit exactly equal to the request: accepted
    let exact = h
        .orders
        .place_order(order_for(dec!(1000.00), dec!(10)), "rice")
        .await?;
    assert!(matches!(exact, PlaceOrderOutcome::Created { .. }));
    let after = h.retailers.find(retailer.id).await?.unwrap();
    assert_eq!(after.available_credit, dec!(0.00));
    assert!(after.credit_invariant_holds());

    Ok(())
}

#[tokio::test]
async fn test_atomic_writer_via_raw_result() -> anyhow::Result<()> {
    // The writer's own result type distinguishes creation from rejection
    // without conflating infrastructure errors.
    let h = harness().await;
    let retailer = h.seed_retailer(dec!(100)).await;
    let rice = h.seed_product("RICE-MIN-25", "Rice", "kg", &[]).await;
    let vendor = h.seed_vendor(&rice, dec!(100), dec!(100), 80).await;

    let writer = mandi::infrastructure::persistence::repositories::SqliteOrderWriter::new(
        h.database.clone(),
        mandi::domain::credit::CreditPolicy::default(),
    );
    use mandi::domain::repositories::AtomicOrderWriter;

    let result = writer
        .create_order(&NewOrder {
            retailer_id: retailer.id,
            vendor_id: vendor.id,
            line_items: vec![LineItem {
                product_id: rice.id,
                product_name: rice.name.clone(),
                sku: rice.sku.clone(),
                quantity: dec!(1),
                unit: "kg".to_string(),
                unit_price: dec!(100),
                tax_rate: Decimal::ZERO,
                line_total: dec!(100.00),
            }],
            total: dec!(100.00),
            idempotency_key: None,
        })
        .await?;

    match result {
        CreateOrderResult::Created {
            order,
            ledger_entry,
        } => {
            assert!(order.order_number.starts_with("ORD-"));
            assert_eq!(ledger_entry.previous_balance, Decimal::ZERO);
            assert_eq!(ledger_entry.running_balance, dec!(100.00));
        }
        CreateOrderResult::Rejected(r) => panic!("unexpected rejection: {:?}", r.reason),
    }
    Ok(())
}
