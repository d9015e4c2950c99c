//! Prometheus metrics for service observability.

use metrics::{counter, histogram};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a successful bulk load.
pub fn load_completed(duration_ms: u64) {
    counter!("metrics_loads_total", "outcome" => "success").increment(1);
    histogram!("metrics_load_duration_ms").record(duration_ms as f64);
}

/// Record a failed bulk load.
pub fn load_failed() {
    counter!("metrics_loads_total", "outcome" => "failure").increment(1);
}

/// Record a completed aggregation run.
pub fn aggregation_completed(duration_ms: u64) {
    counter!("metrics_aggregations_total", "outcome" => "success").increment(1);
    histogram!("metrics_aggregation_duration_ms").record(duration_ms as f64);
}

/// Record a failed aggregation run.
pub fn aggregation_failed(retryable: bool) {
    let outcome = if retryable { "timeout" } else { "failure" };
    counter!("metrics_aggregations_total", "outcome" => outcome).increment(1);
}

/// Record a tick dropped because a run was still active.
pub fn aggregation_skipped() {
    counter!("metrics_aggregations_total", "outcome" => "skipped").increment(1);
}

/// Record a read query.
pub fn query_executed(query: &'static str, duration_ms: u64, ok: bool) {
    histogram!("metrics_query_duration_ms", "query" => query).record(duration_ms as f64);
    if !ok {
        counter!("metrics_query_failures_total", "query" => query).increment(1);
    }
}
