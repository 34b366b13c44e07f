//! Recovery and self-healing configuration.

use anyhow::Result;
use chrono::Duration;

#[derive(Debug, Clone)]
pub struct RecoveryEnvConfig {
    pub webhook_max_retries: u32,
    pub workflow_timeout_minutes: i64,
    pub webhook_stuck_threshold_minutes: i64,
    pub sweep_interval_seconds: u64,
    pub startup_settle_seconds: u64,
}

impl RecoveryEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            webhook_max_retries: super::parse_env_u64("RECOVERY_WEBHOOK_MAX_RETRIES", 3)? as u32,
            workflow_timeout_minutes: super::parse_env_u64(
                "RECOVERY_WORKFLOW_TIMEOUT_MINUTES",
                5,
            )? as i64,
            webhook_stuck_threshold_minutes: super::parse_env_u64(
                "RECOVERY_WEBHOOK_STUCK_MINUTES",
                10,
            )? as i64,
            sweep_interval_seconds: super::parse_env_u64("RECOVERY_SWEEP_INTERVAL_SECONDS", 120)?,
            startup_settle_seconds: super::parse_env_u64("RECOVERY_STARTUP_SETTLE_SECONDS", 15)?,
        })
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::minutes(self.workflow_timeout_minutes)
    }

    pub fn webhook_stuck_threshold(&self) -> Duration {
        Duration::minutes(self.webhook_stuck_threshold_minutes)
    }
}
