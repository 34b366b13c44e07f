//! The asynchronous job fabric.
//!
//! Durable queues over redis when `BROKER_URL` is configured; an in-process
//! sync executor with the identical submit API otherwise. Submitting never
//! blocks a request path: broker mode enqueues, sync mode spawns.

pub mod backoff;
pub mod job;
pub mod redis_queue;
pub mod worker_pool;

pub use job::{DeadLetter, Job, JobPayload, QueueConfig, QueueName};
pub use redis_queue::RedisQueue;

use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The common processor capability: one implementation per queue.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    fn queue(&self) -> QueueName;

    async fn process(&self, job: &Job) -> Result<()>;

    /// Called once when the job is about to be dead-lettered.
    async fn on_exhausted(&self, _job: &Job, _error: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FabricMode {
    Redis,
    Sync,
}

impl fmt::Display for FabricMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FabricMode::Redis => write!(f, "redis"),
            FabricMode::Sync => write!(f, "sync"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queue: String,
    pub waiting: u64,
    pub delayed: u64,
}

pub struct JobFabric {
    redis: Option<RedisQueue>,
    processors: RwLock<HashMap<QueueName, Arc<dyn JobProcessor>>>,
    metrics: Metrics,
}

impl JobFabric {
    /// Connects to the broker, or degrades to sync mode when `broker_url`
    /// is absent or unreachable.
    pub async fn connect(broker_url: Option<&str>, metrics: Metrics) -> Arc<Self> {
        let redis = match broker_url {
            Some(url) => match RedisQueue::connect(url).await {
                Ok(queue) => {
                    info!("Job fabric connected to broker");
                    Some(queue)
                }
                Err(e) => {
                    warn!(
                        "Broker unreachable, falling back to sync executor: {:#}",
                        e
                    );
                    None
                }
            },
            None => {
                info!("No BROKER_URL configured; job fabric in sync mode");
                None
            }
        };
        metrics
            .broker_mode
            .set(if redis.is_some() { 1.0 } else { 0.0 });
        Arc::new(Self {
            redis,
            processors: RwLock::new(HashMap::new()),
            metrics,
        })
    }

    pub fn mode(&self) -> FabricMode {
        if self.redis.is_some() {
            FabricMode::Redis
        } else {
            FabricMode::Sync
        }
    }

    pub(crate) fn redis(&self) -> Option<RedisQueue> {
        self.redis.clone()
    }

    pub fn register(&self, processor: Arc<dyn JobProcessor>) {
        let queue = processor.queue();
        self.processors
            .write()
            .expect("processor registry poisoned")
            .insert(queue, processor);
    }

    fn processor_for(&self, queue: QueueName) -> Option<Arc<dyn JobProcessor>> {
        self.processors
            .read()
            .expect("processor registry poisoned")
            .get(&queue)
            .cloned()
    }

    /// Submits a job. Broker mode enqueues durably; sync mode spawns the
    /// processor with inline retries, trading durability for liveness.
    pub async fn submit(&self, payload: JobPayload) -> Result<Uuid> {
        let job = Job::new(payload);
        let job_id = job.id;
        match &self.redis {
            Some(redis) => {
                redis.enqueue(&job).await?;
            }
            None => {
                let processor = self
                    .processor_for(job.queue)
                    .with_context(|| format!("No processor registered for {}", job.queue))?;
                let metrics = self.metrics.clone();
                tokio::spawn(async move {
                    run_sync_with_retries(processor, metrics, job).await;
                });
            }
        }
        Ok(job_id)
    }

    /// Runs one attempt under the common wrapper: log start/complete/fail,
    /// apply the queue timeout, record metrics, re-raise the error for the
    /// caller to apply backoff/DLQ policy.
    pub async fn run_once(&self, job: &Job) -> Result<()> {
        let processor = self
            .processor_for(job.queue)
            .with_context(|| format!("No processor registered for {}", job.queue))?;
        run_attempt(&processor, &self.metrics, job).await
    }

    /// Metrics and processor notification for an exhausted job. Broker
    /// persistence of the dead letter is the caller's responsibility.
    pub(crate) async fn record_dead_letter(&self, dead: &DeadLetter, error: &str) {
        self.metrics
            .jobs_total
            .with_label_values(&[&dead.original_queue.to_string(), "dead_lettered"])
            .inc();
        if let Some(processor) = self.processor_for(dead.original_queue) {
            processor.on_exhausted(&dead.job, error).await;
        }
    }

    /// Starts the per-queue worker pools (broker mode only).
    pub fn start_workers(self: Arc<Self>, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        if self.redis.is_none() {
            return Vec::new();
        }
        let mut handles = Vec::new();
        for queue in QueueName::ALL {
            handles.extend(worker_pool::spawn_queue_workers(
                self.clone(),
                queue,
                shutdown,
            ));
        }
        handles
    }

    /// Per-queue depth snapshot for operators; updates the depth gauges.
    pub async fn stats(&self) -> Result<Vec<QueueStats>> {
        let mut stats = Vec::with_capacity(QueueName::ALL.len());
        for queue in QueueName::ALL {
            let (waiting, delayed) = match &self.redis {
                Some(redis) => redis.depths(queue).await?,
                None => (0, 0),
            };
            self.metrics
                .queue_depth
                .with_label_values(&[&queue.to_string()])
                .set((waiting + delayed) as f64);
            stats.push(QueueStats {
                queue: queue.to_string(),
                waiting,
                delayed,
            });
        }
        Ok(stats)
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        match &self.redis {
            Some(redis) => redis.list_dead().await,
            None => Ok(Vec::new()),
        }
    }

    /// Admin operation: requeue a dead letter onto its original queue with
    /// a fresh attempt counter.
    pub async fn retry_dead_letter(&self, job_id: &str) -> Result<()> {
        let redis = self
            .redis
            .as_ref()
            .context("Dead-letter retry requires broker mode")?;
        let dead = redis
            .take_dead(job_id)
            .await?
            .with_context(|| format!("Dead letter {} not found", job_id))?;

        let mut job = dead.job;
        job.attempt = 1;
        redis.enqueue(&job).await?;
        info!("Dead letter {} requeued onto {}", job.id, job.queue);
        Ok(())
    }
}

/// The common wrapper around a single attempt.
async fn run_attempt(
    processor: &Arc<dyn JobProcessor>,
    metrics: &Metrics,
    job: &Job,
) -> Result<()> {
    let config = job.queue.config();
    let queue_label = job.queue.to_string();

    info!("Job {} started on {} (attempt {})", job.id, job.queue, job.attempt);
    let result = tokio::time::timeout(config.timeout, processor.process(job)).await;

    match result {
        Ok(Ok(())) => {
            info!("Job {} completed on {}", job.id, job.queue);
            metrics
                .jobs_total
                .with_label_values(&[&queue_label, "completed"])
                .inc();
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Job {} failed on {}: {:#}", job.id, job.queue, e);
            metrics
                .jobs_total
                .with_label_values(&[&queue_label, "failed"])
                .inc();
            Err(e)
        }
        Err(_) => {
            error!(
                "Job {} timed out on {} after {:?}",
                job.id, job.queue, config.timeout
            );
            metrics
                .jobs_total
                .with_label_values(&[&queue_label, "failed"])
                .inc();
            anyhow::bail!("Job timed out after {:?}", config.timeout)
        }
    }
}

/// Sync-mode execution: inline retries with the same backoff schedule,
/// no durable dead letter.
async fn run_sync_with_retries(
    processor: Arc<dyn JobProcessor>,
    metrics: Metrics,
    mut job: Job,
) {
    let config = job.queue.config();
    loop {
        match run_attempt(&processor, &metrics, &job).await {
            Ok(()) => return,
            Err(e) => {
                if job.attempt >= config.max_attempts {
                    let error = format!("{:#}", e);
                    metrics
                        .jobs_total
                        .with_label_values(&[&job.queue.to_string(), "dead_lettered"])
                        .inc();
                    processor.on_exhausted(&job, &error).await;
                    return;
                }
                job.attempt += 1;
                let delay = backoff::base_delay_for_attempt(config.backoff_base, job.attempt);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
