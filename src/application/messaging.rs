//! Outbound message templates.
//!
//! Everything a buyer sees is pre-templated and short; internal error text
//! never reaches a template variable.

use rust_decimal::Decimal;

pub const TPL_ORDER_CONFIRMATION: &str = "order_confirmation";
pub const TPL_ORDER_REJECTED_CREDIT: &str = "order_rejected_credit";
pub const TPL_ORDER_REJECTED_GENERIC: &str = "order_rejected_generic";
pub const TPL_PAYMENT_REMINDER: &str = "payment_reminder";
pub const TPL_CLARIFICATION_REQUEST: &str = "clarification_request";
pub const TPL_PARSE_RETRY: &str = "parse_retry";

/// Variables for the credit rejection template, in template order.
pub fn credit_rejection_vars(available_credit: Decimal) -> Vec<String> {
    vec![format!("Rs.{}", available_credit)]
}

/// Variables for an order confirmation.
pub fn order_confirmation_vars(order_number: &str, summary: &str, total: Decimal) -> Vec<String> {
    vec![
        order_number.to_string(),
        summary.to_string(),
        format!("Rs.{}", total),
    ]
}

pub fn payment_reminder_vars(order_number: &str, outstanding: Decimal) -> Vec<String> {
    vec![order_number.to_string(), format!("Rs.{}", outstanding)]
}

/// Renders a template to text; used by tests and the sync sender path.
/// Production delivery substitutes variables provider-side.
pub fn render(template: &str, vars: &[String]) -> String {
    let var = |i: usize| vars.get(i).map(String::as_str).unwrap_or("");
    match template {
        TPL_ORDER_CONFIRMATION => format!(
            "Order {} confirmed: {}. Total {}.",
            var(0),
            var(1),
            var(2)
        ),
        TPL_ORDER_REJECTED_CREDIT => format!(
            "Order exceeds available credit limit. Your available credit is {}. \
             Please reduce the order or clear dues.",
            var(0)
        ),
        TPL_ORDER_REJECTED_GENERIC => {
            "We could not process your order. Please rephrase it, e.g. \"10 kg rice, 5 L oil\"."
                .to_string()
        }
        TPL_PAYMENT_REMINDER => format!(
            "Reminder: order {} has {} outstanding. Please arrange payment.",
            var(0),
            var(1)
        ),
        TPL_CLARIFICATION_REQUEST => var(0).to_string(),
        TPL_PARSE_RETRY => {
            "Sorry, we could not read that order. Please send it as \"quantity unit product\"."
                .to_string()
        }
        other => format!("[unknown template {}]", other),
    }
}
