//! Metrics and observability utilities
//!
//! Prometheus-style counters and histograms with standardized naming.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Quire metrics
pub const METRICS_PREFIX: &str = "quire";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Content metrics
    describe_counter!(
        format!("{}_post_mutations_total", METRICS_PREFIX),
        Unit::Count,
        "Post creates, replaces, patches and deletes"
    );

    describe_counter!(
        format!("{}_tags_created_total", METRICS_PREFIX),
        Unit::Count,
        "Tags created on demand while resolving post tags"
    );

    // Orphan sweeper metrics
    describe_counter!(
        format!("{}_orphan_sweeps_total", METRICS_PREFIX),
        Unit::Count,
        "Orphan tag sweeps run"
    );

    describe_counter!(
        format!("{}_orphan_tags_removed_total", METRICS_PREFIX),
        Unit::Count,
        "Tags removed because no post referenced them"
    );

    describe_histogram!(
        format!("{}_orphan_sweep_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Orphan tag sweep latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Count a post mutation by kind ("create", "replace", "patch", "delete")
pub fn record_post_mutation(kind: &'static str) {
    counter!(
        format!("{}_post_mutations_total", METRICS_PREFIX),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_tags_created(count: usize) {
    counter!(format!("{}_tags_created_total", METRICS_PREFIX)).increment(count as u64);
}

/// Helper to record one sweeper run
pub fn record_orphan_sweep(duration_secs: f64, removed: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_orphan_sweeps_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    if success {
        counter!(format!("{}_orphan_tags_removed_total", METRICS_PREFIX)).increment(removed as u64);
        histogram!(format!("{}_orphan_sweep_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // no global recorder installed: every call is a no-op
        register_metrics();
        let metrics = RequestMetrics::start("GET", "/v1/posts");
        metrics.finish(200);
        record_post_mutation("create");
        record_tags_created(2);
        record_orphan_sweep(0.01, 3, true);
        record_orphan_sweep(0.01, 0, false);
    }
}
