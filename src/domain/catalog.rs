//! Product catalog value objects.
//!
//! `Product` is the immutable canonical SKU descriptor; prices live on the
//! per-vendor `VendorProduct` link. Price changes never mutate history,
//! they emit `price_history` rows (see the analytics module).

use crate::domain::types::{ProductId, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: String,
    /// Canonical unit this product is quantified in (e.g. "kg", "l", "piece").
    pub unit: String,
    /// Alternate names buyers use ("chal" for rice, brand names, ...).
    pub aliases: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Case-insensitive match of a normalized candidate against the
    /// product's alias list.
    pub fn matches_alias(&self, candidate: &str) -> bool {
        self.aliases
            .iter()
            .any(|a| a.eq_ignore_ascii_case(candidate))
    }
}

/// A vendor's listing for a product: price, stock and order-size bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProduct {
    pub vendor_id: VendorId,
    pub product_id: ProductId,
    pub price: Decimal,
    pub stock: Decimal,
    pub is_available: bool,
    pub min_order_qty: Decimal,
    pub max_order_qty: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl VendorProduct {
    /// Whether this listing can serve `quantity` right now.
    pub fn can_fulfil(&self, quantity: Decimal) -> bool {
        self.is_available
            && self.stock >= quantity
            && quantity >= self.min_order_qty
            && quantity <= self.max_order_qty
    }
}
