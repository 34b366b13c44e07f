//! Redis-backed durable queues.
//!
//! Layout per queue: a list `mandi:queue:{name}` of ready jobs, a sorted
//! set `mandi:queue:{name}:delayed` of jobs keyed by ready-at epoch millis,
//! and one shared dead-letter hash `mandi:dlq` keyed by job id. Delivery is
//! at-least-once: a worker crash between pop and completion re-runs the
//! job after recovery, which the idempotency layer absorbs.

use crate::infrastructure::queue::job::{DeadLetter, Job, QueueName};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

const DLQ_KEY: &str = "mandi:dlq";

#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
}

fn list_key(queue: QueueName) -> String {
    format!("mandi:queue:{}", queue)
}

fn delayed_key(queue: QueueName) -> String {
    format!("mandi:queue:{}:delayed", queue)
}

impl RedisQueue {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Bad BROKER_URL")?;
        let manager = client
            .get_connection_manager()
            .await
            .context("Failed to connect to broker")?;
        Ok(Self { manager })
    }

    pub async fn enqueue(&self, job: &Job) -> Result<()> {
        let mut con = self.manager.clone();
        let encoded = serde_json::to_string(job)?;
        let _: () = con
            .lpush(list_key(job.queue), encoded)
            .await
            .context("Failed to enqueue job")?;
        Ok(())
    }

    pub async fn enqueue_delayed(&self, job: &Job, ready_at: DateTime<Utc>) -> Result<()> {
        let mut con = self.manager.clone();
        let encoded = serde_json::to_string(job)?;
        let _: () = con
            .zadd(delayed_key(job.queue), encoded, ready_at.timestamp_millis())
            .await
            .context("Failed to schedule delayed job")?;
        Ok(())
    }

    /// Blocking pop with a short timeout so workers can observe shutdown.
    pub async fn pop(&self, queue: QueueName, timeout: Duration) -> Result<Option<Job>> {
        let mut con = self.manager.clone();
        let reply: Option<(String, String)> = con
            .brpop(list_key(queue), timeout.as_secs_f64())
            .await
            .context("Failed to pop job")?;
        match reply {
            Some((_, encoded)) => {
                let job = serde_json::from_str(&encoded).context("Bad job payload")?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Moves due delayed jobs back onto the ready list.
    pub async fn promote_due(&self, queue: QueueName, now: DateTime<Utc>) -> Result<u32> {
        let mut con = self.manager.clone();
        let due: Vec<String> = con
            .zrangebyscore_limit(delayed_key(queue), 0, now.timestamp_millis(), 0, 100)
            .await
            .context("Failed to read delayed jobs")?;

        let mut promoted = 0;
        for encoded in due {
            let removed: u32 = con
                .zrem(delayed_key(queue), &encoded)
                .await
                .context("Failed to remove delayed job")?;
            // Another promoter may have raced us; only push if we won.
            if removed > 0 {
                let _: () = con
                    .lpush(list_key(queue), &encoded)
                    .await
                    .context("Failed to promote job")?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    pub async fn dead_letter(&self, dead: &DeadLetter) -> Result<()> {
        let mut con = self.manager.clone();
        let encoded = serde_json::to_string(dead)?;
        let _: () = con
            .hset(DLQ_KEY, dead.job.id.to_string(), encoded)
            .await
            .context("Failed to dead-letter job")?;
        Ok(())
    }

    pub async fn list_dead(&self) -> Result<Vec<DeadLetter>> {
        let mut con = self.manager.clone();
        let all: Vec<(String, String)> = con
            .hgetall(DLQ_KEY)
            .await
            .context("Failed to list dead letters")?;
        all.into_iter()
            .map(|(_, encoded)| serde_json::from_str(&encoded).context("Bad dead letter"))
            .collect()
    }

    /// Removes and returns one dead letter for retry-into-original-queue.
    pub async fn take_dead(&self, job_id: &str) -> Result<Option<DeadLetter>> {
        let mut con = self.manager.clone();
        let encoded: Option<String> = con
            .hget(DLQ_KEY, job_id)
            .await
            .context("Failed to read dead letter")?;
        let Some(encoded) = encoded else {
            return Ok(None);
        };
        let _: () = con
            .hdel(DLQ_KEY, job_id)
            .await
            .context("Failed to remove dead letter")?;
        Ok(Some(
            serde_json::from_str(&encoded).context("Bad dead letter")?,
        ))
    }

    /// (waiting, delayed) depth for a queue.
    pub async fn depths(&self, queue: QueueName) -> Result<(u64, u64)> {
        let mut con = self.manager.clone();
        let waiting: u64 = con
            .llen(list_key(queue))
            .await
            .context("Failed to read queue depth")?;
        let delayed: u64 = con
            .zcard(delayed_key(queue))
            .await
            .context("Failed to read delayed depth")?;
        Ok((waiting, delayed))
    }

    pub async fn dead_count(&self) -> Result<u64> {
        let mut con = self.manager.clone();
        let count: u64 = con.hlen(DLQ_KEY).await.context("Failed to count DLQ")?;
        Ok(count)
    }
}
