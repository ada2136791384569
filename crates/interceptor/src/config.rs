//! Pipeline configuration
//!
//! Every field has a default, so an empty `[interceptor]` table (or no table at
//! all) yields the baseline behavior: the four account endpoints are exempt
//! from bearer auth, JSON is the default content type, two immediate retries,
//! 201 announces a creation, and GET responses are cached.

use std::time::Duration;

use reqwest::header::HeaderValue;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Paths that authenticate with ambient cookies instead of a bearer token.
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &[
    "/login",
    "/password/reset",
    "/password/forgot",
    "/user/activate",
];

pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// URL substrings exempt from bearer-token attachment.
    pub exempt_paths: Vec<String>,
    /// Content-Type applied when the caller sets none.
    pub default_content_type: String,
    /// Retries after the first attempt for transient failures.
    pub retry_budget: u32,
    /// Fixed delay between attempts. Zero retries immediately.
    pub retry_backoff_ms: u64,
    /// Status that triggers the "Object created." notification.
    pub creation_status_code: u16,
    /// Memoize successful GET responses for the process lifetime.
    pub cache_enabled: bool,
    /// Report 204 No Content as a failure.
    pub reject_no_content: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            retry_budget: 2,
            retry_backoff_ms: 0,
            creation_status_code: 201,
            cache_enabled: true,
            reject_no_content: true,
        }
    }
}

impl InterceptorConfig {
    /// Check values serde cannot: header encodability and status range.
    pub fn validate(&self) -> Result<()> {
        self.content_type_header()?;

        if !(100..=599).contains(&self.creation_status_code) {
            return Err(Error::Config(format!(
                "creation_status_code must be an HTTP status (100-599), got {}",
                self.creation_status_code
            )));
        }

        if let Some(empty) = self.exempt_paths.iter().position(|p| p.is_empty()) {
            return Err(Error::Config(format!(
                "exempt_paths[{empty}] is empty and would exempt every request"
            )));
        }

        Ok(())
    }

    pub fn content_type_header(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.default_content_type).map_err(|e| {
            Error::Config(format!(
                "default_content_type {:?} is not a valid header value: {e}",
                self.default_content_type
            ))
        })
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
