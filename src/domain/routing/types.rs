use crate::domain::catalog::VendorProduct;
use crate::domain::party::Vendor;
use crate::domain::types::{OrderId, ProductId, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Tie-break strategy applied among the top-ranked candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadBalancingStrategy {
    RoundRobin,
    LeastLoaded,
}

impl fmt::Display for LoadBalancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalancingStrategy::RoundRobin => write!(f, "round-robin"),
            LoadBalancingStrategy::LeastLoaded => write!(f, "least-loaded"),
        }
    }
}

impl FromStr for LoadBalancingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "round-robin" | "round_robin" => Ok(LoadBalancingStrategy::RoundRobin),
            "least-loaded" | "least_loaded" => Ok(LoadBalancingStrategy::LeastLoaded),
            other => Err(format!(
                "Invalid LOAD_BALANCING_STRATEGY: {}. Must be 'round-robin' or 'least-loaded'",
                other
            )),
        }
    }
}

/// Ranking weights; must sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankingWeights {
    pub availability: f64,
    pub proximity: f64,
    pub workload: f64,
    pub price: f64,
    pub reliability: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            availability: 0.30,
            proximity: 0.20,
            workload: 0.15,
            price: 0.20,
            reliability: 0.15,
        }
    }
}

impl RankingWeights {
    pub fn sum(&self) -> f64 {
        self.availability + self.proximity + self.workload + self.price + self.reliability
    }
}

/// Config snapshot persisted with every decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub weights: RankingWeights,
    pub monopoly_threshold: f64,
    pub working_hours_enabled: bool,
    pub strategy: LoadBalancingStrategy,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            monopoly_threshold: 0.40,
            working_hours_enabled: true,
            strategy: LoadBalancingStrategy::LeastLoaded,
        }
    }
}

/// A vendor under consideration, with the projected load and market data
/// the filters and scorer need. Assembled by the routing service from the
/// capacity projection (cached, eventually consistent).
#[derive(Debug, Clone)]
pub struct VendorCandidate {
    pub vendor: Vendor,
    pub listing: VendorProduct,
    pub active_orders: u32,
    pub pending_orders: u32,
    /// Vendor's share of this product's order count over the last 30 days.
    pub market_share_30d: f64,
    /// Mean price across vendors currently listing the product.
    pub market_avg_price: Decimal,
}

/// Retailer-side context for proximity scoring.
#[derive(Debug, Clone, Default)]
pub struct RetailerLocation {
    pub delivery_zone: Option<String>,
    pub district: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Subscores {
    pub availability: f64,
    pub proximity: f64,
    pub workload: f64,
    pub price: f64,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub total: f64,
    pub subscores: Subscores,
    pub active_orders: u32,
    pub price: Decimal,
    pub reliability: Decimal,
}

/// Immutable record of one selection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionDecision {
    pub id: Uuid,
    pub product_id: ProductId,
    pub order_id: Option<OrderId>,
    pub quantity: Decimal,
    pub chosen_vendor_id: VendorId,
    pub shortlist: Vec<ScoredCandidate>,
    pub config_snapshot: RoutingConfig,
    pub reason: String,
    pub excluded: Vec<VendorId>,
    pub decided_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = RankingWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "round-robin".parse::<LoadBalancingStrategy>().unwrap(),
            LoadBalancingStrategy::RoundRobin
        );
        assert_eq!(
            "LEAST_LOADED".parse::<LoadBalancingStrategy>().unwrap(),
            LoadBalancingStrategy::LeastLoaded
        );
        assert!("random".parse::<LoadBalancingStrategy>().is_err());
    }
}
