//! Seams between the pipeline and the outside world
//!
//! The pipeline never opens sockets, renders notifications or writes log
//! files itself. It delegates to four collaborators:
//! - `Transport` performs the network call
//! - `CredentialIssuer` renews the bearer credential (refresh leader only)
//! - `Notifier` surfaces user-facing success/error messages
//! - `RequestLogger` receives one line per dispatched request
//!
//! Futures are returned as `Pin<Box<dyn Future>>` so the traits stay
//! dyn-compatible and can be shared as `Arc<dyn Transport>` etc.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Method;

use crate::credentials::Credential;
use crate::error::{RefreshError, TransportError};
use crate::request::{PendingRequest, Response};

/// Boxed, sendable future returned by collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executes an augmented request on the network.
///
/// Any HTTP status is a `Response`; only failures below HTTP (connect,
/// timeout, truncated body) are `TransportError`s. Timeouts are the
/// transport's responsibility.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a PendingRequest,
    ) -> BoxFuture<'a, Result<Response, TransportError>>;
}

/// Obtains a fresh credential. Receives the credential that was rejected
/// (if any) as refresh context.
pub trait CredentialIssuer: Send + Sync {
    fn issue(&self, expired: Option<Credential>) -> BoxFuture<'_, Result<Credential, RefreshError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

/// Fire-and-forget user-facing notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// One completed (or failed) dispatch, timed from after the cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLog {
    pub method: Method,
    /// Full URL including query parameters.
    pub url: String,
    pub succeeded: bool,
    pub elapsed: Duration,
}

impl RequestLog {
    pub fn outcome_label(&self) -> &'static str {
        if self.succeeded { "succeeded" } else { "failed" }
    }
}

impl fmt::Display for RequestLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" {} in {} ms.",
            self.method,
            self.url,
            self.outcome_label(),
            self.elapsed.as_millis()
        )
    }
}

/// Fire-and-forget sink for per-request log lines.
pub trait RequestLogger: Send + Sync {
    fn log(&self, line: &RequestLog);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_log_renders_one_line() {
        let line = RequestLog {
            method: Method::GET,
            url: "https://api.test/items?page=2".into(),
            succeeded: true,
            elapsed: Duration::from_micros(12_700),
        };
        assert_eq!(
            line.to_string(),
            "GET \"https://api.test/items?page=2\" succeeded in 12 ms."
        );
    }

    #[test]
    fn failed_marker() {
        let line = RequestLog {
            method: Method::POST,
            url: "https://api.test/items".into(),
            succeeded: false,
            elapsed: Duration::ZERO,
        };
        assert_eq!(line.outcome_label(), "failed");
        assert!(line.to_string().starts_with("POST "));
    }

    #[test]
    fn severity_labels() {
        assert_eq!(Severity::Success.label(), "success");
        assert_eq!(Severity::Error.label(), "error");
    }
}
