//! Prometheus metrics for the task-token lifecycle.
//!
//! All metrics follow the naming convention: `tt_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., records_created_total)
//! - **Gauge**: Value that can go up or down (e.g., catalog_records)
//! - **Histogram**: Distribution of values (e.g., workflow_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // WORKFLOW METRICS
    // =========================================================================

    /// Records created and committed
    pub static ref RECORDS_CREATED: Counter = Counter::new(
        "tt_records_created_total",
        "Total number of task records created"
    ).expect("metric creation failed");

    /// Records redeemed and committed
    pub static ref RECORDS_REDEEMED: Counter = Counter::new(
        "tt_records_redeemed_total",
        "Total number of task records redeemed"
    ).expect("metric creation failed");

    /// Failed workflows
    pub static ref WORKFLOW_FAILURES: CounterVec = CounterVec::new(
        Opts::new("tt_workflow_failures_total", "Failed workflows by kind"),
        &["workflow"]  // workflow: create/redeem
    ).expect("metric creation failed");

    /// Workflow duration
    pub static ref WORKFLOW_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "tt_workflow_duration_seconds",
            "Time from assembling to commit or failure"
        ).buckets(exponential_buckets(0.001, 2.0, 14).expect("valid buckets")),
        &["workflow"]
    ).expect("metric creation failed");

    // =========================================================================
    // DISCOVERY METRICS
    // =========================================================================

    /// Discovery passes by outcome
    pub static ref DISCOVERY_RUNS: CounterVec = CounterVec::new(
        Opts::new("tt_discovery_runs_total", "Discovery passes"),
        &["outcome"]  // outcome: completed/awaiting_service/failed
    ).expect("metric creation failed");

    /// Records dropped during discovery
    pub static ref DISCOVERY_FAILURES: CounterVec = CounterVec::new(
        Opts::new("tt_discovery_record_failures_total", "Records dropped during discovery"),
        &["stage"]  // stage: missing_script/decode/decrypt
    ).expect("metric creation failed");

    /// Records currently visible in the catalog
    pub static ref CATALOG_SIZE: Gauge = Gauge::new(
        "tt_catalog_records",
        "Number of records in the in-memory catalog"
    ).expect("metric creation failed");

    // =========================================================================
    // EVIDENCE METRICS
    // =========================================================================

    /// Evidence verifications by result
    pub static ref EVIDENCE_VERIFICATIONS: CounterVec = CounterVec::new(
        Opts::new("tt_evidence_verifications_total", "Evidence bundle verifications"),
        &["result"]  // result: verified/failed/skipped/unavailable
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Workflows
        Box::new(RECORDS_CREATED.clone()),
        Box::new(RECORDS_REDEEMED.clone()),
        Box::new(WORKFLOW_FAILURES.clone()),
        Box::new(WORKFLOW_DURATION.clone()),
        // Discovery
        Box::new(DISCOVERY_RUNS.clone()),
        Box::new(DISCOVERY_FAILURES.clone()),
        Box::new(CATALOG_SIZE.clone()),
        // Evidence
        Box::new(EVIDENCE_VERIFICATIONS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct WorkflowTimer {
    workflow: &'static str,
    start: std::time::Instant,
}

impl WorkflowTimer {
    /// Start a new timer labelled with the workflow kind.
    pub fn start(workflow: &'static str) -> Self {
        Self {
            workflow,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for WorkflowTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        WORKFLOW_DURATION
            .with_label_values(&[self.workflow])
            .observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // May fail if already registered by another test, which is fine
        let _ = register_metrics();
    }

    #[test]
    fn test_counter_increment() {
        RECORDS_CREATED.inc();
        assert!(RECORDS_CREATED.get() >= 1.0);
    }

    #[test]
    fn test_labelled_counter() {
        DISCOVERY_FAILURES.with_label_values(&["decrypt"]).inc();
        assert!(DISCOVERY_FAILURES.with_label_values(&["decrypt"]).get() >= 1.0);
    }

    #[test]
    fn test_gauge_set() {
        CATALOG_SIZE.set(3.0);
        assert_eq!(CATALOG_SIZE.get(), 3.0);
    }

    #[test]
    fn test_workflow_timer_observes() {
        {
            let _timer = WorkflowTimer::start("create");
        }
        let count = WORKFLOW_DURATION
            .with_label_values(&["create"])
            .get_sample_count();
        assert!(count >= 1);
    }
}
