//! Metrics and observability utilities
//!
//! Prometheus metric registration with standardized naming.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Metrics prefix for all Rishi metrics
pub const METRICS_PREFIX: &str = "rishi";

/// Histogram buckets for agent run latency (in seconds)
pub const RUN_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Buckets for single external calls (embedding, chat, retrieval)
pub const CALL_BUCKETS: &[f64] = &[
    0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Agent run metrics
    describe_counter!(
        format!("{}_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total research runs started"
    );

    describe_counter!(
        format!("{}_runs_aborted_total", METRICS_PREFIX),
        Unit::Count,
        "Research runs terminated by the transition ceiling"
    );

    describe_histogram!(
        format!("{}_run_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end research run latency in seconds"
    );

    describe_counter!(
        format!("{}_steps_executed_total", METRICS_PREFIX),
        Unit::Count,
        "Plan steps executed"
    );

    describe_counter!(
        format!("{}_step_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Plan steps that produced inline error text"
    );

    // Ranking pipeline metrics
    describe_counter!(
        format!("{}_rank_candidates_total", METRICS_PREFIX),
        Unit::Count,
        "Candidates retrieved for ranking"
    );

    describe_counter!(
        format!("{}_rank_batch_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Classification batches conservatively included after errors"
    );

    describe_gauge!(
        format!("{}_rank_kept_count", METRICS_PREFIX),
        Unit::Count,
        "Evidence kept by the last ranking run"
    );

    // External call metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_chat_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat model API requests"
    );

    describe_histogram!(
        format!("{}_chat_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat completion latency in seconds"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_verses_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total verses ingested"
    );

    describe_counter!(
        format!("{}_points_upserted_total", METRICS_PREFIX),
        Unit::Count,
        "Total vector points upserted"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        register_metrics();
        register_metrics();
    }
}
