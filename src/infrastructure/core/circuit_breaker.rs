//! Failure tripwire for the external OCR/LLM providers.
//!
//! The intake tiers must fail fast when a provider is down so the image
//! and parse paths fall through to the next tier instead of stalling a
//! queue worker for the full request timeout. Lifecycle: while closed,
//! consecutive failures are counted and `trip_after` of them trip the
//! breaker; while tripped, every call is refused until the cooldown
//! elapses; after the cooldown exactly one probe call at a time is let
//! through, `close_after` probe successes close the breaker again, and
//! any probe failure re-trips it.

use anyhow::Result;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("{provider} is unavailable; retry in {cooldown_left:?}")]
    Tripped {
        provider: String,
        cooldown_left: Duration,
    },

    #[error("{provider} is being probed after an outage; try again shortly")]
    ProbeBusy { provider: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Tripped,
    Probing,
}

struct Tripwire {
    phase: Phase,
    consecutive_failures: u32,
    probe_successes: u32,
    probe_in_flight: bool,
    tripped_at: Option<Instant>,
}

pub struct CircuitBreaker {
    provider: String,
    trip_after: u32,
    close_after: u32,
    cooldown: Duration,
    state: Mutex<Tripwire>,
}

impl CircuitBreaker {
    /// # Arguments
    /// * `provider` - Provider name for logs and error messages
    /// * `trip_after` - Consecutive failures that trip the breaker
    /// * `close_after` - Probe successes needed to close it again
    /// * `cooldown` - How long calls are refused before probing starts
    pub fn new(
        provider: impl Into<String>,
        trip_after: u32,
        close_after: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            trip_after,
            close_after,
            cooldown,
            state: Mutex::new(Tripwire {
                phase: Phase::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                probe_in_flight: false,
                tripped_at: None,
            }),
        }
    }

    /// Runs `op` under the tripwire. Refused calls fail fast with a
    /// `BreakerError`; admitted calls settle the breaker by outcome and
    /// pass their result through.
    pub async fn call<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.admit()?;
        let result = op.await;
        self.settle(result.is_ok());
        result
    }

    pub fn is_tripped(&self) -> bool {
        self.state.lock().expect("tripwire poisoned").phase != Phase::Closed
    }

    /// Admission decision. In the probing phase this also claims the
    /// single probe slot.
    fn admit(&self) -> Result<(), BreakerError> {
        let mut state = self.state.lock().expect("tripwire poisoned");
        match state.phase {
            Phase::Closed => Ok(()),
            Phase::Tripped => {
                let since = state.tripped_at.unwrap_or_else(Instant::now);
                let elapsed = since.elapsed();
                if elapsed < self.cooldown {
                    return Err(BreakerError::Tripped {
                        provider: self.provider.clone(),
                        cooldown_left: self.cooldown - elapsed,
                    });
                }
                info!(
                    "Tripwire [{}]: cooldown over, probing provider",
                    self.provider
                );
                state.phase = Phase::Probing;
                state.probe_successes = 0;
                state.probe_in_flight = true;
                Ok(())
            }
            Phase::Probing => {
                if state.probe_in_flight {
                    return Err(BreakerError::ProbeBusy {
                        provider: self.provider.clone(),
                    });
                }
                state.probe_in_flight = true;
                Ok(())
            }
        }
    }

    /// Records the outcome of an admitted call.
    fn settle(&self, ok: bool) {
        let mut state = self.state.lock().expect("tripwire poisoned");
        match state.phase {
            Phase::Closed => {
                if ok {
                    state.consecutive_failures = 0;
                    return;
                }
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.trip_after {
                    warn!(
                        "Tripwire [{}]: tripped after {} consecutive failures",
                        self.provider, state.consecutive_failures
                    );
                    state.phase = Phase::Tripped;
                    state.tripped_at = Some(Instant::now());
                }
            }
            Phase::Probing => {
                state.probe_in_flight = false;
                if !ok {
                    warn!(
                        "Tripwire [{}]: probe failed, provider still down",
                        self.provider
                    );
                    state.phase = Phase::Tripped;
                    state.tripped_at = Some(Instant::now());
                    return;
                }
                state.probe_successes += 1;
                if state.probe_successes >= self.close_after {
                    info!(
                        "Tripwire [{}]: provider recovered after {} probe(s)",
                        self.provider, state.probe_successes
                    );
                    state.phase = Phase::Closed;
                    state.consecutive_failures = 0;
                }
            }
            // No call is admitted while tripped, so nothing settles here.
            Phase::Tripped => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fail() -> impl Future<Output = Result<()>> {
        async { anyhow::bail!("provider exploded") }
    }

    fn succeed() -> impl Future<Output = Result<()>> {
        async { Ok(()) }
    }

    #[tokio::test]
    async fn test_trips_after_consecutive_failures_and_fails_fast() {
        let breaker = CircuitBreaker::new("ocr", 3, 1, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(breaker.call(fail()).await.is_err());
        }
        assert!(breaker.is_tripped());

        // A refused call never reaches the provider
        let refused = breaker.call(succeed()).await;
        let message = format!("{:#}", refused.unwrap_err());
        assert!(message.contains("ocr is unavailable"));
    }

    #[tokio::test]
    async fn test_success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new("llm-primary", 3, 1, Duration::from_secs(60));

        assert!(breaker.call(fail()).await.is_err());
        assert!(breaker.call(fail()).await.is_err());
        assert!(breaker.call(succeed()).await.is_ok());
        assert!(breaker.call(fail()).await.is_err());
        assert!(breaker.call(fail()).await.is_err());

        // Five failures total but never three in a row
        assert!(!breaker.is_tripped());
    }

    #[tokio::test]
    async fn test_only_one_probe_runs_at_a_time() {
        let breaker = Arc::new(CircuitBreaker::new("ocr", 1, 1, Duration::from_millis(50)));
        let _ = breaker.call(fail()).await;
        assert!(breaker.is_tripped());

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Hold one probe in flight
        let (release, held) = tokio::sync::oneshot::channel::<()>();
        let probing = breaker.clone();
        let probe = tokio::spawn(async move {
            probing
                .call(async {
                    held.await.ok();
                    Ok(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The probe slot is taken; a second caller is refused
        let busy = breaker.call(succeed()).await;
        let message = format!("{:#}", busy.unwrap_err());
        assert!(message.contains("probed"));

        // The probe succeeds and closes the breaker
        release.send(()).unwrap();
        assert!(probe.await.unwrap().is_ok());
        assert!(!breaker.is_tripped());
        assert!(breaker.call(succeed()).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_failure_restarts_the_cooldown() {
        let breaker = CircuitBreaker::new("llm-fallback", 1, 1, Duration::from_millis(50));
        let _ = breaker.call(fail()).await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(breaker.call(fail()).await.is_err());
        assert!(breaker.is_tripped());

        // Back in cooldown: refused without reaching the provider
        let refused = breaker.call(succeed()).await;
        assert!(format!("{:#}", refused.unwrap_err()).contains("unavailable"));
    }

    #[tokio::test]
    async fn test_needs_enough_probe_successes_to_close() {
        let breaker = CircuitBreaker::new("ocr", 1, 2, Duration::from_millis(50));
        let _ = breaker.call(fail()).await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(breaker.call(succeed()).await.is_ok());
        // One good probe is not enough yet
        assert!(breaker.is_tripped());

        assert!(breaker.call(succeed()).await.is_ok());
        assert!(!breaker.is_tripped());
    }
}
