//! Types shared by the interceptor crates and the proxy service

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
