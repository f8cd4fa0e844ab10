//! Metric names and Prometheus recorder setup

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const RECONCILE_TOTAL: &str = "user_profile_reconcile_total";
pub const DRIFT_DETECTED_TOTAL: &str = "user_profile_drift_detected_total";
pub const RECONCILE_DURATION_SECONDS: &str = "user_profile_reconcile_duration_seconds";

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    // Reconciliation is a handful of HTTP round trips
    let buckets = [0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions so HELP/TYPE lines appear before first use.
pub fn describe_metrics() {
    describe_counter!(
        RECONCILE_TOTAL,
        "User profile apply calls by outcome (success or error kind)"
    );
    describe_counter!(
        DRIFT_DETECTED_TOTAL,
        "Apply calls that found the server out of date and issued a write"
    );
    describe_histogram!(
        RECONCILE_DURATION_SECONDS,
        "User profile apply duration in seconds"
    );
}
