//! Configuration loading from environment variables, organized by
//! concern: core (database/broker/secrets), routing, parser, recovery,
//! external providers.

mod core_env_config;
mod parser_env_config;
mod providers_env_config;
mod recovery_env_config;
mod routing_env_config;

pub use core_env_config::CoreEnvConfig;
pub use parser_env_config::ParserEnvConfig;
pub use providers_env_config::ProvidersEnvConfig;
pub use recovery_env_config::RecoveryEnvConfig;
pub use routing_env_config::RoutingEnvConfig;

use anyhow::{Context, Result};
use std::env;

/// Aggregated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub core: CoreEnvConfig,
    pub routing: RoutingEnvConfig,
    pub parser: ParserEnvConfig,
    pub recovery: RecoveryEnvConfig,
    pub providers: ProvidersEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            core: CoreEnvConfig::from_env().context("Failed to load core config")?,
            routing: RoutingEnvConfig::from_env().context("Failed to load routing config")?,
            parser: ParserEnvConfig::from_env().context("Failed to load parser config")?,
            recovery: RecoveryEnvConfig::from_env().context("Failed to load recovery config")?,
            providers: ProvidersEnvConfig::from_env(),
        })
    }
}

pub(crate) fn parse_env_f64(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(value) => value
            .parse::<f64>()
            .with_context(|| format!("Failed to parse {} as a number: '{}'", key, value)),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {} as an integer: '{}'", key, value)),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helpers_defaults() {
        assert_eq!(parse_env_u64("MANDI_TEST_UNSET_U64", 42).unwrap(), 42);
        assert!((parse_env_f64("MANDI_TEST_UNSET_F64", 0.4).unwrap() - 0.4).abs() < 1e-9);
        assert!(parse_env_bool("MANDI_TEST_UNSET_BOOL", true));
    }

    #[test]
    fn test_parse_bool_forms() {
        env::set_var("MANDI_TEST_BOOL", "YES");
        assert!(parse_env_bool("MANDI_TEST_BOOL", false));
        env::set_var("MANDI_TEST_BOOL", "off");
        assert!(!parse_env_bool("MANDI_TEST_BOOL", true));
        env::remove_var("MANDI_TEST_BOOL");
    }
}
