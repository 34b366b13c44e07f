//! Per-queue worker pools for broker mode.
//!
//! Each queue gets its configured number of workers plus one promoter
//! ticker that moves due delayed jobs to the ready list. Pools are
//! independent: one queue saturating never starves another.

use crate::infrastructure::queue::backoff::base_delay_for_attempt;
use crate::infrastructure::queue::job::{DeadLetter, Job, QueueName};
use crate::infrastructure::queue::JobFabric;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Fixed-window per-second rate limiter shared by a queue's workers.
pub struct RateLimiter {
    cap: u32,
    state: Mutex<(Instant, u32)>,
}

impl RateLimiter {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            state: Mutex::new((Instant::now(), 0)),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let (window_start, count) = *state;
                let elapsed = window_start.elapsed();
                if elapsed >= Duration::from_secs(1) {
                    *state = (Instant::now(), 1);
                    return;
                }
                if count < self.cap {
                    state.1 += 1;
                    return;
                }
                Duration::from_secs(1) - elapsed
            };
            tokio::time::sleep(wait).await;
        }
    }
}

/// Spawns the workers and promoter for one queue.
pub fn spawn_queue_workers(
    fabric: Arc<JobFabric>,
    queue: QueueName,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let config = queue.config();
    let limiter = config.rate_per_sec.map(|cap| Arc::new(RateLimiter::new(cap)));
    let mut handles = Vec::with_capacity(config.concurrency + 1);

    for worker_index in 0..config.concurrency {
        let fabric = fabric.clone();
        let limiter = limiter.clone();
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            info!("Worker {}/{} started for {}", worker_index + 1, config.concurrency, queue);
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    info!("Worker for {} shutting down", queue);
                    return;
                }
                let Some(redis) = fabric.redis() else {
                    return;
                };
                let job = match redis.pop(queue, Duration::from_secs(2)).await {
                    Ok(Some(job)) => job,
                    Ok(None) => continue,
                    Err(e) => {
                        error!("Worker pop failed for {}: {:#}", queue, e);
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                };

                if let Some(ref limiter) = limiter {
                    limiter.acquire().await;
                }

                if let Err(e) = fabric.run_once(&job).await {
                    handle_failure(&fabric, job, format!("{:#}", e)).await;
                }
            }
        }));
    }

    // Promoter ticker: single instance per queue, sequential loop prevents
    // overlapping fires.
    let fabric_promoter = fabric.clone();
    let mut shutdown_rx = shutdown.subscribe();
    handles.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = ticker.tick() => {
                    let Some(redis) = fabric_promoter.redis() else { return };
                    if let Err(e) = redis.promote_due(queue, Utc::now()).await {
                        warn!("Promoter failed for {}: {:#}", queue, e);
                    }
                }
            }
        }
    }));

    handles
}

async fn handle_failure(fabric: &Arc<JobFabric>, mut job: Job, error: String) {
    let config = job.queue.config();
    let Some(redis) = fabric.redis() else {
        return;
    };

    if job.attempt < config.max_attempts {
        job.attempt += 1;
        let delay = base_delay_for_attempt(config.backoff_base, job.attempt);
        let ready_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        warn!(
            "Job {} on {} failed (attempt {}/{}), retrying in {:?}: {}",
            job.id, job.queue, job.attempt - 1, config.max_attempts, delay, error
        );
        if let Err(e) = redis.enqueue_delayed(&job, ready_at).await {
            error!("Failed to schedule retry for job {}: {:#}", job.id, e);
        }
        return;
    }

    error!(
        "Job {} on {} exhausted {} attempts, dead-lettering: {}",
        job.id, job.queue, config.max_attempts, error
    );
    let dead = DeadLetter {
        original_queue: job.queue,
        attempt_count: job.attempt,
        last_error: error.clone(),
        failed_at: Utc::now(),
        job,
    };
    fabric.record_dead_letter(&dead, &error).await;
    if let Err(e) = redis.dead_letter(&dead).await {
        error!("Failed to write dead letter {}: {:#}", dead.job.id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_caps_per_window() {
        tokio::time::pause();
        let limiter = RateLimiter::new(2);
        limiter.acquire().await;
        limiter.acquire().await;

        // Third acquire must wait for the next window
        let start = Instant::now();
        let acquire = limiter.acquire();
        tokio::pin!(acquire);
        assert!(
            tokio::time::timeout(Duration::from_millis(10), &mut acquire)
                .await
                .is_err()
        );
        tokio::time::advance(Duration::from_secs(1)).await;
        acquire.await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
