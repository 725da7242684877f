//! Prometheus metrics for the ingest pipeline and the push stream.
//!
//! The recorder is installed once by the binary. Until then every
//! `record_*` helper is a no-op, so library code and tests can call them
//! freely.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Returns `false` if a recorder was already installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("ingest_lines_total", "Sanitized log lines read by the ingest loop");
    describe_histogram!(
        "ingest_poll_duration_seconds",
        "Duration of one ingest tick (tail, extract, merge)"
    );

    describe_counter!("transfers_recorded_total", "Completed transfers added to history");
    describe_counter!(
        "transfers_discarded_total",
        "Completed transfers dropped as recent duplicates"
    );
    describe_counter!(
        "history_write_failures_total",
        "History merges that failed and were kept for retry"
    );

    describe_gauge!("stream_subscribers", "Connected push-stream subscribers");
    describe_counter!(
        "stream_subscribers_pruned_total",
        "Subscribers removed after a failed send"
    );
}

/// Render current metrics in Prometheus text format, if initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_poll(lines: usize, duration: Duration) {
    counter!("ingest_lines_total").increment(lines as u64);
    histogram!("ingest_poll_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_merge(accepted: usize, discarded: usize) {
    counter!("transfers_recorded_total").increment(accepted as u64);
    counter!("transfers_discarded_total").increment(discarded as u64);
}

pub fn record_history_write_failure() {
    counter!("history_write_failures_total").increment(1);
}

pub fn record_subscribers(count: usize) {
    gauge!("stream_subscribers").set(count as f64);
}

pub fn record_pruned(count: usize) {
    counter!("stream_subscribers_pruned_total").increment(count as u64);
}
