//! reqwest-backed collaborators for the interceptor pipeline
//!
//! - `ReqwestTransport` sends augmented requests, using a cookie-store client
//!   for account endpoints and a plain client for bearer requests
//! - `TokenEndpointIssuer` renews the bearer credential with an OAuth2
//!   `refresh_token` grant

pub mod issuer;
pub mod transport;

pub use issuer::{TokenEndpointIssuer, TokenResponse};
pub use transport::ReqwestTransport;
