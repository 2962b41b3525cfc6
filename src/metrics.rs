//! Prometheus metrics for taps, webhook deliveries and deploys

use lazy_static::lazy_static;
use prometheus::{
    opts, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use std::sync::Once;
use tracing::{debug, warn};

use crate::types::DeployStatus;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Successful taps
    pub static ref TAPS_TOTAL: IntCounter = register_int_counter!(
        opts!("taps_total", "Total number of recorded taps")
    )
    .expect("Failed to create taps_total metric");

    /// Webhook deliveries by event and outcome
    /// Labels: event (push, ping, ...), outcome (deployed, ignored, rejected, ...)
    pub static ref WEBHOOK_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhook_events_total", "Total number of webhook deliveries"),
        &["event", "outcome"]
    )
    .expect("Failed to create webhook_events_total metric");

    /// Deploys by final status
    /// Labels: status (succeeded, failed, timed_out)
    pub static ref DEPLOYMENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("deployment_total", "Total number of deploys"),
        &["status"]
    )
    .expect("Failed to create deployment_total metric");

    /// Deploy duration in seconds, 1s to 10min buckets
    pub static ref DEPLOYMENT_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "deployment_duration_seconds",
        "Time spent running the deploy command",
        &["status"],
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .expect("Failed to create deployment_duration_seconds metric");

    /// 1 while a deploy command is running
    pub static ref DEPLOYMENT_ACTIVE: IntGauge = register_int_gauge!(
        opts!("deployment_active", "Deploy currently running")
    )
    .expect("Failed to create deployment_active metric");

    /// Webhook calls blocked behind a running deploy
    pub static ref DEPLOYMENT_WAITING: IntGauge = register_int_gauge!(
        opts!("deployment_waiting", "Deploy requests waiting for the deploy lock")
    )
    .expect("Failed to create deployment_waiting metric");
}

/// Register all metrics with the global registry; later calls are no-ops
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(TAPS_TOTAL.clone()),
            Box::new(WEBHOOK_EVENTS_TOTAL.clone()),
            Box::new(DEPLOYMENT_TOTAL.clone()),
            Box::new(DEPLOYMENT_DURATION_SECONDS.clone()),
            Box::new(DEPLOYMENT_ACTIVE.clone()),
            Box::new(DEPLOYMENT_WAITING.clone()),
        ];

        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!(error = %e, "Failed to register metric");
            }
        }

        debug!("Prometheus metrics registry initialized");
    });
}

pub fn record_tap() {
    TAPS_TOTAL.inc();
}

/// Record a webhook delivery outcome
pub fn record_webhook_event(event: &str, outcome: &str) {
    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[event, outcome])
        .inc();

    debug!(
        event = %event,
        outcome = %outcome,
        "Recorded webhook event metric"
    );
}

/// Record a deploy completion with its final status
pub fn record_deployment_complete(status: DeployStatus, duration_ms: u64) {
    let status_label = status.as_label();

    DEPLOYMENT_TOTAL.with_label_values(&[status_label]).inc();
    DEPLOYMENT_DURATION_SECONDS
        .with_label_values(&[status_label])
        .observe(duration_ms as f64 / 1000.0);

    debug!(
        status = %status_label,
        duration_ms = duration_ms,
        "Recorded deployment completion metric"
    );
}

/// Gather all metrics and encode them in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e))
}

/// Tracks a running deploy; decrements the gauge when dropped
pub struct DeploymentMetricsGuard;

impl DeploymentMetricsGuard {
    pub fn new() -> Self {
        DEPLOYMENT_ACTIVE.inc();
        Self
    }
}

impl Drop for DeploymentMetricsGuard {
    fn drop(&mut self) {
        DEPLOYMENT_ACTIVE.dec();
    }
}

/// Tracks a webhook call waiting for the deploy lock
pub struct WaitingGuard;

impl WaitingGuard {
    pub fn new() -> Self {
        DEPLOYMENT_WAITING.inc();
        Self
    }
}

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        DEPLOYMENT_WAITING.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_record_functions_do_not_panic() {
        record_tap();
        record_webhook_event("push", "deployed");
        record_webhook_event("ping", "pong");
        record_deployment_complete(DeployStatus::Succeeded, 1500);
        record_deployment_complete(DeployStatus::TimedOut, 120_000);
    }

    #[test]
    fn test_guards_do_not_panic() {
        let _active = DeploymentMetricsGuard::new();
        let _waiting = WaitingGuard::new();
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics();
        record_tap();
        record_deployment_complete(DeployStatus::Failed, 10);

        let output = gather_metrics().unwrap();
        assert!(output.contains("taps_total"));
        assert!(output.contains("deployment_total"));
        assert!(output.contains("status=\"failed\""));
    }
}
