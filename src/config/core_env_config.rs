//! Core environment configuration: database, broker, secrets, limits.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct CoreEnvConfig {
    pub database_url: String,
    /// Absence flips the job fabric to sync mode.
    pub broker_url: Option<String>,
    pub jwt_secret: String,
    pub slow_query_threshold_ms: u64,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
}

impl CoreEnvConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        anyhow::ensure!(
            database_url.contains("://"),
            "DATABASE_URL must be a SQL DSN, got '{}'",
            database_url
        );

        let broker_url = env::var("BROKER_URL").ok().filter(|s| !s.is_empty());

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is required")?;
        anyhow::ensure!(
            jwt_secret.len() >= 32,
            "JWT_SECRET must be at least 32 characters ({} given); 64+ recommended in production",
            jwt_secret.len()
        );
        if jwt_secret.len() < 64 {
            tracing::warn!("JWT_SECRET is shorter than the 64 characters recommended for production");
        }

        Ok(Self {
            database_url,
            broker_url,
            jwt_secret,
            slow_query_threshold_ms: super::parse_env_u64("SLOW_QUERY_THRESHOLD_MS", 500)?,
            rate_limit_window_ms: super::parse_env_u64("RATE_LIMIT_WINDOW_MS", 60_000)?,
            rate_limit_max_requests: super::parse_env_u64("RATE_LIMIT_MAX_REQUESTS", 300)? as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them serialized by testing
    // distinct keys only.

    #[test]
    fn test_requires_database_url() {
        env::remove_var("DATABASE_URL");
        env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        assert!(CoreEnvConfig::from_env().is_err());
    }

    #[test]
    fn test_rejects_short_jwt_secret() {
        env::set_var("DATABASE_URL", "sqlite://test.db");
        env::set_var("JWT_SECRET", "too-short");
        assert!(CoreEnvConfig::from_env().is_err());
    }
}
