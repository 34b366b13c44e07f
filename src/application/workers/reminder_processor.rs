use crate::application::messaging;
use crate::domain::repositories::{OrderRepository, RetailerRepository};
use crate::infrastructure::queue::{Job, JobFabric, JobPayload, JobProcessor, QueueName};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Payment reminders for unpaid delivered orders. The actual message
/// goes back through the whatsapp-messages queue so the provider rate
/// cap applies in one place.
pub struct ReminderProcessor {
    orders: Arc<dyn OrderRepository>,
    retailers: Arc<dyn RetailerRepository>,
    fabric: Arc<JobFabric>,
}

impl ReminderProcessor {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        retailers: Arc<dyn RetailerRepository>,
        fabric: Arc<JobFabric>,
    ) -> Self {
        Self {
            orders,
            retailers,
            fabric,
        }
    }
}

#[async_trait]
impl JobProcessor for ReminderProcessor {
    fn queue(&self) -> QueueName {
        QueueName::PaymentReminders
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let JobPayload::PaymentReminder { order_id } = &job.payload else {
            anyhow::bail!("Wrong payload on payment-reminders: {:?}", job.payload);
        };

        let order = self
            .orders
            .find(*order_id)
            .await?
            .with_context(|| format!("Order {} not found", order_id))?;
        if order.outstanding() <= rust_decimal::Decimal::ZERO {
            // Settled since the reminder was scheduled
            return Ok(());
        }

        let retailer = self
            .retailers
            .find(order.retailer_id)
            .await?
            .with_context(|| format!("Retailer {} not found", order.retailer_id))?;

        self.fabric
            .submit(JobPayload::SendWhatsApp {
                to_phone: retailer.phone,
                template: messaging::TPL_PAYMENT_REMINDER.to_string(),
                variables: messaging::payment_reminder_vars(
                    &order.order_number,
                    order.outstanding(),
                ),
                idempotency_key: None,
            })
            .await?;
        Ok(())
    }
}
