//! Tracing-backed notifier and request logger
//!
//! Defaults used when the application does not supply its own collaborators.
//! Notifications go to the `interceptor::notify` target and request lines to
//! `interceptor::http`, so either can be filtered independently with
//! `RUST_LOG`.

use tracing::{info, warn};

use crate::collaborators::{Notifier, RequestLog, RequestLogger, Severity};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Success => {
                info!(target: "interceptor::notify", severity = severity.label(), "{message}")
            }
            Severity::Error => {
                warn!(target: "interceptor::notify", severity = severity.label(), "{message}")
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRequestLogger;

impl RequestLogger for TracingRequestLogger {
    fn log(&self, line: &RequestLog) {
        info!(
            target: "interceptor::http",
            method = %line.method,
            url = %line.url,
            outcome = line.outcome_label(),
            elapsed_ms = line.elapsed.as_millis() as u64,
            "{line}"
        );
    }
}
