use crate::domain::errors::OrderError;
use crate::domain::types::{OrderId, OrderStatus, PaymentStatus, ProductId, RetailerId, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A line item snapshots the product descriptor and pricing at the moment
/// the order was written. Later catalog or price edits never touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub line_total: Decimal,
}

impl LineItem {
    pub fn compute_total(quantity: Decimal, unit_price: Decimal, tax_rate: Decimal) -> Decimal {
        let net = quantity * unit_price;
        net + net * tax_rate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub retailer_id: RetailerId,
    pub vendor_id: VendorId,
    pub line_items: Vec<LineItem>,
    pub total: Decimal,
    pub credit_used: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub amount_paid: Decimal,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn outstanding(&self) -> Decimal {
        self.total - self.amount_paid
    }

    /// Payment status derived from how much has been settled so far.
    pub fn payment_status_for(&self, amount_paid: Decimal) -> PaymentStatus {
        if amount_paid >= self.total {
            PaymentStatus::Paid
        } else if amount_paid > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }
}

/// Input to the atomic order writer. The writer snapshots line items and
/// assigns the id, order number and timestamps inside the transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub retailer_id: RetailerId,
    pub vendor_id: VendorId,
    pub line_items: Vec<LineItem>,
    pub total: Decimal,
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.line_items.is_empty() {
            return Err(OrderError::Invalid {
                reason: "order has no line items".to_string(),
            });
        }
        if self.total <= Decimal::ZERO {
            return Err(OrderError::Invalid {
                reason: format!("order total must be positive, got {}", self.total),
            });
        }
        let computed: Decimal = self.line_items.iter().map(|li| li.line_total).sum();
        if computed != self.total {
            return Err(OrderError::Invalid {
                reason: format!("line totals {} do not sum to order total {}", computed, self.total),
            });
        }
        Ok(())
    }
}

/// Sequential, human-readable order number: `ORD-YYYYMMDD-NNNNNN`.
pub fn format_order_number(date: DateTime<Utc>, sequence: u64) -> String {
    format!("ORD-{}-{:06}", date.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(qty: Decimal, price: Decimal) -> LineItem {
        LineItem {
            product_id: Uuid::new_v4(),
            product_name: "Miniket Rice".to_string(),
            sku: "RICE-MIN-25".to_string(),
            quantity: qty,
            unit: "kg".to_string(),
            unit_price: price,
            tax_rate: Decimal::ZERO,
            line_total: LineItem::compute_total(qty, price, Decimal::ZERO),
        }
    }

    #[test]
    fn test_line_total_with_tax() {
        assert_eq!(
            LineItem::compute_total(dec!(10), dec!(100), dec!(0.05)),
            dec!(1050.00)
        );
    }

    #[test]
    fn test_new_order_rejects_empty_items() {
        let order = NewOrder {
            retailer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            line_items: vec![],
            total: dec!(100),
            idempotency_key: None,
        };
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_new_order_rejects_total_mismatch() {
        let order = NewOrder {
            retailer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            line_items: vec![item(dec!(10), dec!(100))],
            total: dec!(999),
            idempotency_key: None,
        };
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_new_order_accepts_consistent_totals() {
        let order = NewOrder {
            retailer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            line_items: vec![item(dec!(10), dec!(100))],
            total: dec!(1000.00),
            idempotency_key: None,
        };
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_order_number_format() {
        let date = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        assert_eq!(format_order_number(date, 42), "ORD-20250602-000042");
    }

    #[test]
    fn test_payment_status_derivation() {
        let order = Order {
            id: Uuid::new_v4(),
            order_number: "ORD-20250602-000001".to_string(),
            retailer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            line_items: vec![item(dec!(10), dec!(100))],
            total: dec!(1000.00),
            credit_used: dec!(1000.00),
            status: OrderStatus::Delivered,
            payment_status: PaymentStatus::Unpaid,
            amount_paid: Decimal::ZERO,
            created_at: Utc::now(),
            delivered_at: None,
            cancelled_at: None,
        };
        assert_eq!(order.payment_status_for(dec!(0)), PaymentStatus::Unpaid);
        assert_eq!(order.payment_status_for(dec!(500)), PaymentStatus::Partial);
        assert_eq!(order.payment_status_for(dec!(1000.00)), PaymentStatus::Paid);
    }
}
