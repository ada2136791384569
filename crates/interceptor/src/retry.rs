//! Bounded retry of transient transport failures
//!
//! A request gets `budget + 1` attempts. Network errors and 5xx responses are
//! retried; every other classification returns immediately. When the last
//! attempt is still transient it becomes Fatal: `RetriesExhausted` for network
//! errors, `Status` for a server error response.

use std::time::Duration;

use tracing::{debug, warn};

use crate::classify::{Classifier, Failure, Outcome, Transient};
use crate::collaborators::Transport;
use crate::request::PendingRequest;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    budget: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(budget: u32, backoff: Duration) -> Self {
        Self { budget, backoff }
    }

    /// Retries immediately, without a delay between attempts.
    pub fn immediate(budget: u32) -> Self {
        Self::new(budget, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.budget + 1
    }

    /// Send `request` until it produces a non-transient outcome or the budget
    /// runs out. Never returns `Outcome::Retryable`.
    pub async fn run(
        &self,
        transport: &dyn Transport,
        request: &PendingRequest,
        classifier: &Classifier,
    ) -> Outcome {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let outcome = classifier.classify(transport.send(request).await);

            let transient = match outcome {
                Outcome::Retryable(transient) => transient,
                other => {
                    debug!(attempt, outcome = other.label(), "dispatch finished");
                    return other;
                }
            };

            if attempt >= max_attempts {
                warn!(attempts = attempt, url = %request.url, "retry budget exhausted");
                return Outcome::Fatal(match transient {
                    Transient::Network(source) => Failure::RetriesExhausted {
                        attempts: attempt,
                        source,
                    },
                    Transient::Server(response) => Failure::Status(response),
                });
            }

            match &transient {
                Transient::Network(e) => {
                    warn!(attempt, error = %e, url = %request.url, "transient network failure, retrying")
                }
                Transient::Server(r) => {
                    warn!(attempt, status = r.status, url = %request.url, "server error, retrying")
                }
            }

            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate(2)
    }
}
