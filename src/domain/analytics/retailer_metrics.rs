//! Derived retailer metrics. Recomputed on demand; never stored as truth.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Minimal order facts the calculator needs.
#[derive(Debug, Clone)]
pub struct OrderFact {
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A settled payment against a delivered order.
#[derive(Debug, Clone)]
pub struct PaymentFact {
    pub due_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailerMetrics {
    pub orders_last_30d: u64,
    pub total_purchase_value: Decimal,
    pub avg_order_value: Decimal,
    pub on_time_payment_ratio: Decimal,
    pub avg_payment_delay_days: Decimal,
    pub credit_utilization_pct: Decimal,
    pub order_frequency_per_week: Decimal,
}

pub fn compute_retailer_metrics(
    orders: &[OrderFact],
    payments: &[PaymentFact],
    outstanding_debt: Decimal,
    credit_limit: Decimal,
    now: DateTime<Utc>,
) -> RetailerMetrics {
    let window_start = now - Duration::days(30);
    let recent: Vec<&OrderFact> = orders
        .iter()
        .filter(|o| o.created_at >= window_start)
        .collect();

    let orders_last_30d = recent.len() as u64;
    let total_purchase_value: Decimal = orders.iter().map(|o| o.total).sum();
    let avg_order_value = if orders.is_empty() {
        Decimal::ZERO
    } else {
        (total_purchase_value / Decimal::from(orders.len())).round_dp(2)
    };

    let (on_time, delay_days_sum) = payments.iter().fold((0u64, 0i64), |(on_time, sum), p| {
        if p.paid_at <= p.due_at {
            (on_time + 1, sum)
        } else {
            (on_time, sum + (p.paid_at - p.due_at).num_days())
        }
    });
    let on_time_payment_ratio = if payments.is_empty() {
        Decimal::ONE_HUNDRED
    } else {
        (Decimal::from(on_time * 100) / Decimal::from(payments.len())).round_dp(2)
    };
    let late = payments.len() as u64 - on_time;
    let avg_payment_delay_days = if late == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(delay_days_sum) / Decimal::from(late)).round_dp(2)
    };

    let credit_utilization_pct = if credit_limit <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        (outstanding_debt * Decimal::ONE_HUNDRED / credit_limit).round_dp(2)
    };

    let order_frequency_per_week = Decimal::from_f64(orders_last_30d as f64 / (30.0 / 7.0))
        .unwrap_or(Decimal::ZERO)
        .round_dp(2);

    RetailerMetrics {
        orders_last_30d,
        total_purchase_value,
        avg_order_value,
        on_time_payment_ratio,
        avg_payment_delay_days,
        credit_utilization_pct,
        order_frequency_per_week,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_window_and_averages() {
        let now = Utc::now();
        let orders = vec![
            OrderFact {
                total: dec!(1000),
                created_at: now - Duration::days(5),
            },
            OrderFact {
                total: dec!(3000),
                created_at: now - Duration::days(10),
            },
            OrderFact {
                total: dec!(2000),
                created_at: now - Duration::days(60), // outside the window
            },
        ];
        let m = compute_retailer_metrics(&orders, &[], dec!(500), dec!(5000), now);
        assert_eq!(m.orders_last_30d, 2);
        assert_eq!(m.total_purchase_value, dec!(6000));
        assert_eq!(m.avg_order_value, dec!(2000.00));
        assert_eq!(m.credit_utilization_pct, dec!(10.00));
    }

    #[test]
    fn test_payment_punctuality() {
        let now = Utc::now();
        let payments = vec![
            PaymentFact {
                due_at: now,
                paid_at: now - Duration::days(1), // early
            },
            PaymentFact {
                due_at: now - Duration::days(10),
                paid_at: now - Duration::days(4), // 6 days late
            },
        ];
        let m = compute_retailer_metrics(&[], &payments, dec!(0), dec!(5000), now);
        assert_eq!(m.on_time_payment_ratio, dec!(50.00));
        assert_eq!(m.avg_payment_delay_days, dec!(6.00));
    }

    #[test]
    fn test_no_history_defaults() {
        let m = compute_retailer_metrics(&[], &[], dec!(0), dec!(0), Utc::now());
        assert_eq!(m.on_time_payment_ratio, dec!(100));
        assert_eq!(m.avg_order_value, Decimal::ZERO);
        assert_eq!(m.credit_utilization_pct, Decimal::ZERO);
    }
}
