//! Prometheus counters and histograms.
//!
//! Recording goes through the `metrics` facade, so nothing is exported until
//! [`install`] sets a global recorder. Without one every call is a no-op.
//!
//! - `vote_votes_total{option}`: votes accepted, per label
//! - `vote_resets_total`: reset actions
//! - `vote_store_failures_total`: requests that failed on the counter store
//! - `vote_http_requests_total{method, status}`: handled requests
//! - `vote_http_request_duration_seconds{method}`: request latency

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

pub const VOTES_TOTAL: &str = "vote_votes_total";
pub const RESETS_TOTAL: &str = "vote_resets_total";
pub const STORE_FAILURES_TOTAL: &str = "vote_store_failures_total";
pub const HTTP_REQUESTS_TOTAL: &str = "vote_http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "vote_http_request_duration_seconds";

/// Serves `/metrics` on `addr` from a background task.
pub fn install(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    info!("📈 Metrics listening on http://{}/metrics", addr);
    Ok(())
}

pub fn describe() {
    describe_counter!(VOTES_TOTAL, Unit::Count, "Votes accepted, by option");
    describe_counter!(RESETS_TOTAL, Unit::Count, "Counter resets");
    describe_counter!(STORE_FAILURES_TOTAL, Unit::Count, "Requests that failed on the counter store");
    describe_counter!(HTTP_REQUESTS_TOTAL, Unit::Count, "Handled HTTP requests");
    describe_histogram!(HTTP_REQUEST_DURATION, Unit::Seconds, "HTTP request latency");
}

pub fn record_vote(label: &str) {
    counter!(VOTES_TOTAL, "option" => label.to_string()).increment(1);
}

pub fn record_reset() {
    counter!(RESETS_TOTAL).increment(1);
}

pub fn record_store_failure() {
    counter!(STORE_FAILURES_TOTAL).increment(1);
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(HTTP_REQUEST_DURATION, "method" => method.to_string()).record(elapsed.as_secs_f64());
}
