//! Exponential backoff between job attempts.

use rand::Rng;
use std::time::Duration;

/// Cap on any single inter-attempt delay.
const MAX_DELAY: Duration = Duration::from_secs(300);

/// delay_n = base * 2^(n-1), with up to 10% jitter, capped.
///
/// `attempt` is the attempt about to run (1-based); the first retry waits
/// one base interval.
pub fn delay_for_attempt(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let raw = base.saturating_mul(2u32.saturating_pow(exponent));
    let capped = raw.min(MAX_DELAY);
    let jitter_ms = rand::rng().random_range(0..=capped.as_millis() as u64 / 10);
    capped + Duration::from_millis(jitter_ms)
}

/// Deterministic variant for schedule computation and tests.
pub fn base_delay_for_attempt(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(2u32.saturating_pow(exponent)).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling() {
        let base = Duration::from_secs(5);
        assert_eq!(base_delay_for_attempt(base, 1), Duration::from_secs(5));
        assert_eq!(base_delay_for_attempt(base, 2), Duration::from_secs(10));
        assert_eq!(base_delay_for_attempt(base, 3), Duration::from_secs(20));
        assert_eq!(base_delay_for_attempt(base, 4), Duration::from_secs(40));
    }

    #[test]
    fn test_cap() {
        let base = Duration::from_secs(5);
        assert_eq!(base_delay_for_attempt(base, 12), MAX_DELAY);
    }

    #[test]
    fn test_jitter_bounded() {
        let base = Duration::from_secs(5);
        for attempt in 1..6 {
            let with_jitter = delay_for_attempt(base, attempt);
            let floor = base_delay_for_attempt(base, attempt);
            assert!(with_jitter >= floor);
            assert!(with_jitter <= floor + floor / 10 + Duration::from_millis(1));
        }
    }
}
