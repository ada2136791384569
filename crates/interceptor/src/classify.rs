//! Outcome classification for transport results
//!
//! Maps each transport result onto the outcome that drives retry, refresh
//! and reporting:
//! - network failures and 5xx are Retryable (within the retry budget)
//! - 401 is AuthExpired (routed to the refresh coordinator)
//! - 204 is Fatal unless `reject_no_content` is off
//! - other 2xx are Success
//! - every other status is Fatal

use crate::error::{RefreshError, TransportError};
use crate::request::Response;

pub const UNAUTHORIZED: u16 = 401;
pub const NO_CONTENT: u16 = 204;

/// Result of one pipeline stage.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Response),
    Retryable(Transient),
    AuthExpired(Response),
    Fatal(Failure),
}

/// A failure that may succeed on an immediate retry.
#[derive(Debug, Clone)]
pub enum Transient {
    Network(TransportError),
    Server(Response),
}

/// Terminal failures returned to the caller and reported to the notifier.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Failure {
    /// The server answered with a status the pipeline does not accept.
    #[error("request failed with status {}", .0.status)]
    Status(Response),

    /// Every attempt failed below HTTP.
    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: TransportError,
    },

    /// The credential could not be renewed after a 401.
    #[error("authentication expired and renewal failed: {0}")]
    RefreshFailed(RefreshError),

    /// The request could not be built (e.g. unencodable bearer token).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Failure {
    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Status(response) => Some(response.status),
            Failure::RefreshFailed(_) => Some(UNAUTHORIZED),
            Failure::RetriesExhausted { .. } | Failure::InvalidRequest(_) => None,
        }
    }

    /// User-facing message for the error notification.
    pub fn notification(&self) -> String {
        match self {
            Failure::Status(_) | Failure::RefreshFailed(_) => {
                format!("{} Error", self.status().unwrap_or(UNAUTHORIZED))
            }
            Failure::RetriesExhausted { .. } => "Network Error".to_string(),
            Failure::InvalidRequest(msg) => format!("Invalid request: {msg}"),
        }
    }

    /// Upstream response carried by the failure, if the server answered.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Failure::Status(response) => Some(response),
            _ => None,
        }
    }
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Retryable(_) => "retryable",
            Outcome::AuthExpired(_) => "auth_expired",
            Outcome::Fatal(_) => "fatal",
        }
    }
}

/// Status classification switches.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    pub reject_no_content: bool,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            reject_no_content: true,
        }
    }
}

impl Classifier {
    pub fn classify(&self, result: Result<Response, TransportError>) -> Outcome {
        let response = match result {
            Ok(response) => response,
            Err(e) => return Outcome::Retryable(Transient::Network(e)),
        };

        match response.status {
            UNAUTHORIZED => Outcome::AuthExpired(response),
            NO_CONTENT if self.reject_no_content => Outcome::Fatal(Failure::Status(response)),
            200..=299 => Outcome::Success(response),
            500..=599 => Outcome::Retryable(Transient::Server(response)),
            _ => Outcome::Fatal(Failure::Status(response)),
        }
    }
}
