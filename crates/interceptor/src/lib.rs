//! Outbound HTTP request interceptor
//!
//! Wraps every outbound request with credential injection, response caching,
//! bounded retry, single-flight credential renewal, user notifications and
//! latency logging. Network access, credential issuance, notifications and
//! log output go through the traits in `collaborators`, so the crate has no
//! opinion about the HTTP client or UI in use.
//!
//! Request flow through `Interceptor::execute`:
//! 1. `augment` attaches the bearer token (or cookie mode for account paths)
//! 2. `cache` answers repeated GETs without touching the network
//! 3. `retry` dispatches, `classify` sorts the result
//! 4. a 401 joins the `refresh` coordinator and is re-dispatched once
//! 5. `report` (or an application collaborator) notifies and logs

pub mod augment;
pub mod cache;
pub mod classify;
pub mod collaborators;
pub mod config;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod refresh;
pub mod report;
pub mod request;
pub mod retry;

#[cfg(test)]
mod testing;

pub use cache::{CacheKey, ResponseCache};
pub use classify::{Classifier, Failure, Outcome, Transient};
pub use collaborators::{
    BoxFuture, CredentialIssuer, Notifier, RequestLog, RequestLogger, Severity, Transport,
};
pub use config::InterceptorConfig;
pub use credentials::{Credential, CredentialStore};
pub use error::{Error, RefreshError, Result, TransportError};
pub use pipeline::{Interceptor, InterceptorBuilder};
pub use refresh::{RefreshPhase, RefreshStatus};
pub use report::{TracingNotifier, TracingRequestLogger};
pub use request::{PendingRequest, Response, TransportMode};
pub use retry::RetryPolicy;
