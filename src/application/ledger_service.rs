//! Ledger operations above the repository: payment settlement,
//! reversals, admin adjustments, chain verification.

use crate::domain::errors::LedgerError;
use crate::domain::events::MarketplaceEvent;
use crate::domain::ledger::{verify_chain, CreditLedgerEntry};
use crate::domain::records::AuditLogEntry;
use crate::domain::repositories::{
    AuditLogRepository, LedgerRepository, OrderRepository,
};
use crate::domain::types::{OrderId, RetailerId, TransactionType, VendorId};
use crate::infrastructure::event_bus::EventBus;
use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct LedgerService {
    ledger: Arc<dyn LedgerRepository>,
    orders: Arc<dyn OrderRepository>,
    audit: Arc<dyn AuditLogRepository>,
    events: EventBus,
}

impl LedgerService {
    pub fn new(
        ledger: Arc<dyn LedgerRepository>,
        orders: Arc<dyn OrderRepository>,
        audit: Arc<dyn AuditLogRepository>,
        events: EventBus,
    ) -> Self {
        Self {
            ledger,
            orders,
            audit,
            events,
        }
    }

    /// Settles (part of) a delivered order. Overpayment is refused; the
    /// order's payment status follows the cumulative amount paid.
    pub async fn record_payment(
        &self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<CreditLedgerEntry> {
        anyhow::ensure!(amount > Decimal::ZERO, "Payment amount must be positive");

        let order = self
            .orders
            .find(order_id)
            .await?
            .with_context(|| format!("Order {} not found", order_id))?;

        let outstanding = order.outstanding();
        if amount > outstanding {
            return Err(anyhow::Error::new(LedgerError::Overpayment {
                amount,
                outstanding,
            }));
        }

        let entry = self
            .ledger
            .append(
                order.retailer_id,
                order.vendor_id,
                TransactionType::PaymentDebit,
                amount,
                Some(order.id),
                Some("payment received"),
            )
            .await?;

        let amount_paid = order.amount_paid + amount;
        let payment_status = order.payment_status_for(amount_paid);
        self.orders
            .record_payment_state(order.id, amount_paid, payment_status)
            .await?;

        self.events.publish(&MarketplaceEvent::PaymentRecorded {
            order_id: order.id,
            retailer_id: order.retailer_id,
            amount,
        });

        info!(
            order_id = %order.id,
            %amount,
            %payment_status,
            "Payment recorded"
        );
        Ok(entry)
    }

    /// Reversal is the only correction mechanism. Returns the
    /// compensating entry.
    pub async fn reverse(&self, entry_id: Uuid, reason: &str) -> Result<CreditLedgerEntry> {
        let reversal = self.ledger.reverse(entry_id, reason).await?;
        info!(entry_id = %entry_id, reversal_id = %reversal.id, reason, "Ledger entry reversed");
        Ok(reversal)
    }

    /// Admin credit adjustment; always audit-logged.
    pub async fn adjust(
        &self,
        retailer_id: RetailerId,
        vendor_id: VendorId,
        transaction_type: TransactionType,
        amount: Decimal,
        actor: &str,
        reason: &str,
    ) -> Result<CreditLedgerEntry> {
        anyhow::ensure!(
            matches!(
                transaction_type,
                TransactionType::AdjustmentCredit | TransactionType::AdjustmentDebit
            ),
            "Only adjustment entries may be appended through adjust()"
        );

        let entry = self
            .ledger
            .append(
                retailer_id,
                vendor_id,
                transaction_type,
                amount,
                None,
                Some(reason),
            )
            .await?;

        self.audit
            .insert(&AuditLogEntry {
                id: Uuid::new_v4(),
                actor: actor.to_string(),
                entity_type: "credit_ledger".to_string(),
                entity_id: entry.id.to_string(),
                action: format!("adjustment:{}", transaction_type),
                old_value: serde_json::json!({ "balance": entry.previous_balance.to_string() }),
                new_value: serde_json::json!({ "balance": entry.running_balance.to_string() }),
                created_at: Utc::now(),
            })
            .await?;

        Ok(entry)
    }

    /// Replays a (retailer, vendor) chain and checks the running-balance
    /// invariant; used by tests and the recovery dashboard.
    pub async fn verify_pair(
        &self,
        retailer_id: RetailerId,
        vendor_id: VendorId,
    ) -> Result<Decimal> {
        let chain = self.ledger.chain(retailer_id, vendor_id).await?;
        verify_chain(&chain).map_err(|e| anyhow::anyhow!("{}", e))
    }
}
