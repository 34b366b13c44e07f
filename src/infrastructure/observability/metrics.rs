//! Prometheus metrics definitions.
//!
//! All metrics use the `mandi_` prefix. The registry is process-wide and
//! injected at startup; `render` text-encodes for whatever transport the
//! deployment wires up.

use prometheus::{CounterVec, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Orders by outcome (created / rejected)
    pub orders_total: CounterVec,
    /// Ledger entries by transaction type
    pub ledger_entries_total: CounterVec,
    /// Webhooks received by source
    pub webhooks_received_total: CounterVec,
    /// Jobs by queue and outcome (completed / failed / dead_lettered)
    pub jobs_total: CounterVec,
    /// Waiting + delayed depth per queue
    pub queue_depth: GaugeVec,
    /// 1 when the fabric runs against the broker, 0 in sync fallback
    pub broker_mode: Gauge,
    /// Recovery sweep actions by kind
    pub recovery_actions_total: CounterVec,
    /// Parse sessions by decision (proceed / review / reject)
    pub parse_outcomes_total: CounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_total = CounterVec::new(
            Opts::new("mandi_orders_total", "Orders by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_total.clone()))?;

        let ledger_entries_total = CounterVec::new(
            Opts::new("mandi_ledger_entries_total", "Ledger entries by type"),
            &["transaction_type"],
        )?;
        registry.register(Box::new(ledger_entries_total.clone()))?;

        let webhooks_received_total = CounterVec::new(
            Opts::new("mandi_webhooks_received_total", "Webhooks received by source"),
            &["source"],
        )?;
        registry.register(Box::new(webhooks_received_total.clone()))?;

        let jobs_total = CounterVec::new(
            Opts::new("mandi_jobs_total", "Jobs by queue and outcome"),
            &["queue", "outcome"],
        )?;
        registry.register(Box::new(jobs_total.clone()))?;

        let queue_depth = GaugeVec::new(
            Opts::new("mandi_queue_depth", "Waiting plus delayed jobs per queue"),
            &["queue"],
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let broker_mode = Gauge::with_opts(Opts::new(
            "mandi_broker_mode",
            "1 when running against the broker, 0 in sync fallback",
        ))?;
        registry.register(Box::new(broker_mode.clone()))?;

        let recovery_actions_total = CounterVec::new(
            Opts::new("mandi_recovery_actions_total", "Recovery sweep actions"),
            &["action"],
        )?;
        registry.register(Box::new(recovery_actions_total.clone()))?;

        let parse_outcomes_total = CounterVec::new(
            Opts::new("mandi_parse_outcomes_total", "Parse sessions by decision"),
            &["decision"],
        )?;
        registry.register(Box::new(parse_outcomes_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            orders_total,
            ledger_entries_total,
            webhooks_received_total,
            jobs_total,
            queue_depth,
            broker_mode,
            recovery_actions_total,
            parse_outcomes_total,
        })
    }

    /// Text-encoded snapshot of the registry.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        Ok(encoder.encode_to_string(&self.registry.gather())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_render() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_total.with_label_values(&["created"]).inc();
        metrics
            .jobs_total
            .with_label_values(&["order-processing", "completed"])
            .inc();
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("mandi_orders_total"));
        assert!(rendered.contains("mandi_jobs_total"));
    }
}
