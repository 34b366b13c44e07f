//! Vendor selection and load balancing configuration.

use crate::domain::routing::{LoadBalancingStrategy, RankingWeights, RoutingConfig};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct RoutingEnvConfig {
    pub max_active_orders_per_vendor: u32,
    pub max_pending_orders_per_vendor: u32,
    pub monopoly_threshold: f64,
    pub working_hours_enabled: bool,
    pub strategy: LoadBalancingStrategy,
    pub vendor_response_deadline_hours: i64,
    pub max_vendor_attempts: u32,
}

impl RoutingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let strategy_str =
            env::var("LOAD_BALANCING_STRATEGY").unwrap_or_else(|_| "least-loaded".to_string());
        let strategy = LoadBalancingStrategy::from_str(&strategy_str)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse LOAD_BALANCING_STRATEGY")?;

        let monopoly_threshold = super::parse_env_f64("MONOPOLY_THRESHOLD", 0.40)?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&monopoly_threshold),
            "MONOPOLY_THRESHOLD must be in [0,1], got {}",
            monopoly_threshold
        );

        Ok(Self {
            max_active_orders_per_vendor: super::parse_env_u64("MAX_ACTIVE_ORDERS_PER_VENDOR", 10)?
                as u32,
            max_pending_orders_per_vendor: super::parse_env_u64(
                "MAX_PENDING_ORDERS_PER_VENDOR",
                5,
            )? as u32,
            monopoly_threshold,
            working_hours_enabled: super::parse_env_bool("WORKING_HOURS_ENABLED", true),
            strategy,
            vendor_response_deadline_hours: super::parse_env_u64(
                "RECOVERY_VENDOR_RESPONSE_DEADLINE_HOURS",
                2,
            )? as i64,
            max_vendor_attempts: super::parse_env_u64("RECOVERY_MAX_VENDOR_ATTEMPTS", 5)? as u32,
        })
    }

    /// The domain-level config snapshot used by selection runs.
    pub fn to_routing_config(&self) -> RoutingConfig {
        RoutingConfig {
            weights: RankingWeights::default(),
            monopoly_threshold: self.monopoly_threshold,
            working_hours_enabled: self.working_hours_enabled,
            strategy: self.strategy,
        }
    }
}
