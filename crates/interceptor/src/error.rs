//! Error types for the interceptor pipeline and its collaborators
//!
//! Payloads are plain strings so every error is `Clone`: a refresh failure is
//! broadcast to every waiting request, and transport errors are carried inside
//! retry outcomes.

/// Errors from building or augmenting requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("invalid interceptor configuration: {0}")]
    Config(String),
}

/// Result alias for interceptor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Network-level failures reported by a transport. All of them are transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("failed to read response: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Failures of a credential renewal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// The issuer refused to renew (revoked or invalid refresh token).
    #[error("credential renewal rejected: {0}")]
    Rejected(String),

    /// The issuer could not be reached or returned an unusable response.
    #[error("credential issuer unavailable: {0}")]
    Unavailable(String),

    /// The leading request was dropped before the renewal resolved.
    #[error("credential renewal abandoned before completion")]
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_detection() {
        assert!(TransportError::Timeout("30s".into()).is_timeout());
        assert!(!TransportError::Connect("refused".into()).is_timeout());
    }

    #[test]
    fn refresh_errors_carry_their_cause() {
        let err = RefreshError::Rejected("invalid_grant".into());
        assert!(err.to_string().contains("invalid_grant"), "got: {err}");
        assert_eq!(
            RefreshError::Abandoned.to_string(),
            "credential renewal abandoned before completion"
        );
    }
}
