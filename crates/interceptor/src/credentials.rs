//! Bearer credential storage
//!
//! Holds the one credential the pipeline attaches to outbound requests. The
//! store is the single source of truth for the token: the augmenter reads it
//! per request and the refresh coordinator replaces it after a successful
//! renewal. The lock is never held across an await, so the coordinator can
//! consult the store while holding its own state lock.

use std::fmt;
use std::sync::RwLock;

use common::Secret;
use tracing::debug;

/// An opaque bearer token. Redacted in Debug/Display output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Secret<String>);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    /// The raw token, for building the Authorization header.
    pub fn token(&self) -> &str {
        self.0.expose()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({:?})", self.0)
    }
}

/// Thread-safe holder of the current credential (absent when unauthenticated).
pub struct CredentialStore {
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    pub fn new(initial: Option<Credential>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Clone of the current credential.
    pub fn get(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the current credential. `None` returns to the unauthenticated state.
    pub fn set(&self, credential: Option<Credential>) {
        let present = credential.is_some();
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = credential;
        debug!(present, "credential updated");
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(None)
    }
}
