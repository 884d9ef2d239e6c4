//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route pattern, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `active_connections` (gauge): requests currently being served
//! - `log_shipper_submissions_total` (counter): submit outcomes
//! - `log_shipper_stale_retries_total` (counter): appends retried after a stale token
//! - `log_shipper_soft_failures_total` (counter): absorbed bootstrap/lookup failures

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const REQUEST_DURATION: &str = "http_request_duration_seconds";
const REQUEST_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0];

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            REQUEST_DURATION_BUCKETS,
        )?
        .install()?;

    describe_counter!("http_requests_total", "Total HTTP requests served");
    describe_histogram!(REQUEST_DURATION, "HTTP request duration in seconds");
    describe_gauge!("active_connections", "Requests currently being served");
    describe_counter!("log_shipper_submissions_total", "Log submissions by outcome");
    describe_counter!(
        "log_shipper_stale_retries_total",
        "Appends retried after a stale continuation token"
    );
    describe_counter!(
        "log_shipper_soft_failures_total",
        "Absorbed failures while preparing an append"
    );

    tracing::info!(address = %addr, "Metrics listener started");
    Ok(())
}

/// Record a finished HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status_code", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!(REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    gauge!("active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("active_connections").decrement(1.0);
}

/// Outcome of one submission: "delivered", "failed", "exhausted", or
/// "dropped" when the error reporter had no free slot.
pub fn record_submission(outcome: &'static str) {
    counter!("log_shipper_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_stale_retry() {
    counter!("log_shipper_stale_retries_total").increment(1);
}

pub fn record_soft_failure(step: &'static str) {
    counter!("log_shipper_soft_failures_total", "step" => step).increment(1);
}
