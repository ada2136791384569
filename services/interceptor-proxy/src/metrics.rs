//! Prometheus metrics exposition
//!
//! - `interceptor_requests_total` (counter): labels `method`, `outcome`
//! - `interceptor_request_duration_seconds` (histogram): label `outcome`
//! - `interceptor_notifications_total` (counter): label `severity`
//!
//! Recorded through collaborator wrappers, so the pipeline itself stays
//! metrics-agnostic.

use interceptor::{
    Notifier, RequestLog, RequestLogger, Severity, TracingNotifier, TracingRequestLogger,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "interceptor_request_duration_seconds";

/// 5ms to 60s, matching the configurable upstream timeout range.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Explicit buckets make the duration metric render as a histogram (`_bucket`
/// lines) rather than the exporter's default summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a dispatched request.
pub fn record_request(method: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "interceptor_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "outcome" => outcome.to_string()).record(duration_secs);
}

pub fn record_notification(severity: Severity) {
    metrics::counter!("interceptor_notifications_total", "severity" => severity.label())
        .increment(1);
}

/// Request logger that also feeds the request counter and latency histogram.
#[derive(Debug, Default)]
pub struct MetricsLogger {
    inner: TracingRequestLogger,
}

impl RequestLogger for MetricsLogger {
    fn log(&self, line: &RequestLog) {
        self.inner.log(line);
        record_request(
            line.method.as_str(),
            line.outcome_label(),
            line.elapsed.as_secs_f64(),
        );
    }
}

/// Notifier that counts notifications by severity.
#[derive(Debug, Default)]
pub struct MetricsNotifier {
    inner: TracingNotifier,
}

impl Notifier for MetricsNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.inner.notify(severity, message);
        record_notification(severity);
    }
}
