//! Order parser thresholds.

use crate::domain::parser::ParserConfig;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct ParserEnvConfig {
    pub auto_accept: u8,
    pub needs_review: u8,
    pub product_match_threshold: f64,
}

impl ParserEnvConfig {
    /// Fuzzy matching below this similarity is never trusted.
    const MIN_MATCH_THRESHOLD: f64 = 0.65;

    pub fn from_env() -> Result<Self> {
        let auto_accept = super::parse_env_u64("PARSE_AUTO_ACCEPT", 80)?.min(100) as u8;
        let needs_review = super::parse_env_u64("PARSE_NEEDS_REVIEW", 50)?.min(100) as u8;
        anyhow::ensure!(
            needs_review <= auto_accept,
            "PARSE_NEEDS_REVIEW ({}) must not exceed PARSE_AUTO_ACCEPT ({})",
            needs_review,
            auto_accept
        );

        let product_match_threshold = super::parse_env_f64("PRODUCT_MATCH_THRESHOLD", 0.70)?
            .max(Self::MIN_MATCH_THRESHOLD);

        Ok(Self {
            auto_accept,
            needs_review,
            product_match_threshold,
        })
    }

    pub fn to_parser_config(&self) -> ParserConfig {
        ParserConfig {
            auto_accept: self.auto_accept,
            needs_review: self.needs_review,
            min_similarity: self.product_match_threshold,
            clarification_penalty: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_threshold_floor() {
        std::env::set_var("PRODUCT_MATCH_THRESHOLD", "0.3");
        let config = ParserEnvConfig::from_env().unwrap();
        assert!((config.product_match_threshold - 0.65).abs() < 1e-9);
        std::env::remove_var("PRODUCT_MATCH_THRESHOLD");
    }
}
