//! Single-flight credential renewal
//!
//! When a request comes back 401, its pipeline asks the coordinator for a
//! fresh credential. The first caller to find the coordinator `Idle` becomes
//! the leader and calls the credential issuer; every caller arriving while the
//! renewal is `InProgress` becomes a waiter on a `watch` channel. The leader
//! stores the new credential, broadcasts the resolution to all waiters and
//! returns the coordinator to `Idle`.
//!
//! State transitions:
//! - Idle → InProgress (first 401, leader elected under the state mutex)
//! - InProgress → Idle (resolution broadcast as Succeeded or Failed)
//! - InProgress → Idle (leader dropped mid-renewal, waiters rejoin)
//!
//! Abandonment is not a failed renewal: a waiter woken by it goes back
//! through the election, so one of them leads the next attempt and only the
//! cancelled caller loses its request.
//!
//! A caller whose rejected credential has already been replaced by a finished
//! renewal gets the current credential back without starting another one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::collaborators::CredentialIssuer;
use crate::credentials::{Credential, CredentialStore};
use crate::error::RefreshError;

/// Result of one renewal, as seen by every participant.
#[derive(Debug, Clone)]
pub enum Resolution {
    Succeeded(Credential),
    Failed(RefreshError),
}

impl Resolution {
    fn into_result(self) -> Result<Credential, RefreshError> {
        match self {
            Resolution::Succeeded(credential) => Ok(credential),
            Resolution::Failed(error) => Err(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    InProgress,
}

impl RefreshPhase {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshPhase::Idle => "idle",
            RefreshPhase::InProgress => "in_progress",
        }
    }
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStatus {
    pub phase: RefreshPhase,
    pub succeeded: u64,
    pub failed: u64,
}

enum RefreshState {
    Idle,
    InProgress {
        generation: u64,
        resolution: watch::Receiver<Option<Resolution>>,
    },
}

struct Inner {
    state: RefreshState,
    generation: u64,
}

enum Role<'a> {
    /// A renewal already replaced the rejected credential.
    Current(Credential),
    Leader(LeaderGuard<'a>),
    Waiter(watch::Receiver<Option<Resolution>>),
}

pub struct RefreshCoordinator {
    // Never held across an await.
    inner: Mutex<Inner>,
    store: Arc<CredentialStore>,
    issuer: Arc<dyn CredentialIssuer>,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                generation: 0,
            }),
            store,
            issuer,
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Obtain a credential to replace `rejected`, the one the failed request
    /// carried. Joins an in-flight renewal if there is one.
    pub async fn refresh(&self, rejected: Option<&Credential>) -> Result<Credential, RefreshError> {
        loop {
            match self.join(rejected) {
                Role::Current(credential) => return Ok(credential),
                Role::Leader(guard) => return self.lead(guard, rejected.cloned()).await,
                Role::Waiter(resolution) => match wait(resolution).await {
                    Err(RefreshError::Abandoned) => {
                        debug!("credential renewal abandoned, rejoining");
                    }
                    resolved => return resolved,
                },
            }
        }
    }

    pub fn status(&self) -> RefreshStatus {
        let phase = match self.lock().state {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::InProgress { .. } => RefreshPhase::InProgress,
        };
        RefreshStatus {
            phase,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// The indivisible check-and-transition: exactly one caller per renewal
    /// observes `Idle` and leaves it `InProgress`.
    fn join(&self, rejected: Option<&Credential>) -> Role<'_> {
        let mut inner = self.lock();

        if let RefreshState::InProgress {
            generation,
            resolution,
        } = &inner.state
        {
            debug!(generation, "credential renewal in progress, waiting");
            return Role::Waiter(resolution.clone());
        }

        if let Some(current) = self.store.get()
            && Some(&current) != rejected
        {
            debug!("credential already renewed, reusing current");
            return Role::Current(current);
        }

        inner.generation += 1;
        let generation = inner.generation;
        let (sender, resolution) = watch::channel(None);
        inner.state = RefreshState::InProgress {
            generation,
            resolution,
        };

        Role::Leader(LeaderGuard {
            coordinator: self,
            generation,
            sender: Some(sender),
        })
    }

    async fn lead(
        &self,
        mut guard: LeaderGuard<'_>,
        rejected: Option<Credential>,
    ) -> Result<Credential, RefreshError> {
        info!(generation = guard.generation, "renewing credential");

        let resolution = match self.issuer.issue(rejected).await {
            Ok(credential) => {
                self.store.set(Some(credential.clone()));
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                info!(generation = guard.generation, "credential renewed");
                Resolution::Succeeded(credential)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(generation = guard.generation, error = %e, "credential renewal failed");
                Resolution::Failed(e)
            }
        };

        guard.resolve(resolution.clone());
        resolution.into_result()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn wait(
    mut resolution: watch::Receiver<Option<Resolution>>,
) -> Result<Credential, RefreshError> {
    loop {
        let resolved = resolution.borrow_and_update().clone();
        if let Some(resolved) = resolved {
            return resolved.into_result();
        }
        if resolution.changed().await.is_err() {
            let last = resolution.borrow().clone();
            return last
                .map(Resolution::into_result)
                .unwrap_or(Err(RefreshError::Abandoned));
        }
    }
}

/// Held by the leader for the duration of a renewal. Dropping it unresolved
/// (leader cancelled) releases `InProgress` and wakes the waiters to rejoin.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    generation: u64,
    sender: Option<watch::Sender<Option<Resolution>>>,
}

impl LeaderGuard<'_> {
    fn resolve(&mut self, resolution: Resolution) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        let mut inner = self.coordinator.lock();
        if matches!(inner.state, RefreshState::InProgress { generation, .. } if generation == self.generation)
        {
            inner.state = RefreshState::Idle;
        }
        sender.send_replace(Some(resolution));
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            warn!(
                generation = self.generation,
                "credential renewal abandoned by its leader"
            );
            self.resolve(Resolution::Failed(RefreshError::Abandoned));
        }
    }
}
