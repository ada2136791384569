//! Request pipeline orchestration
//!
//! `Interceptor::execute` runs one request through every stage:
//! 1. augment (bearer or cookie mode, default Content-Type)
//! 2. cache lookup for bearer-mode GET requests; a hit returns immediately,
//!    untimed
//! 3. dispatch through the retry policy and classify the result
//! 4. on 401, join the single-flight renewal and re-dispatch once
//! 5. cache successful bearer-mode GET responses
//! 6. notify creations and failures, log one line with the elapsed time
//!
//! The interceptor owns the credential store and refresh state; nothing
//! outside it can write them except through `credentials()`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::augment::Augmenter;
use crate::cache::{CacheKey, ResponseCache};
use crate::classify::{Classifier, Failure, Outcome};
use crate::collaborators::{
    CredentialIssuer, Notifier, RequestLog, RequestLogger, Severity, Transport,
};
use crate::config::InterceptorConfig;
use crate::credentials::{Credential, CredentialStore};
use crate::error::Result;
use crate::refresh::{RefreshCoordinator, RefreshStatus};
use crate::report::{TracingNotifier, TracingRequestLogger};
use crate::request::{PendingRequest, TransportMode};
use crate::retry::RetryPolicy;

pub const CREATED_MESSAGE: &str = "Object created.";

pub struct Interceptor {
    augmenter: Augmenter,
    classifier: Classifier,
    retry: RetryPolicy,
    creation_status: u16,
    cache_enabled: bool,
    cache: ResponseCache,
    credentials: Arc<CredentialStore>,
    refresh: RefreshCoordinator,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    logger: Arc<dyn RequestLogger>,
}

impl Interceptor {
    pub fn builder(
        transport: Arc<dyn Transport>,
        issuer: Arc<dyn CredentialIssuer>,
    ) -> InterceptorBuilder {
        InterceptorBuilder {
            transport,
            issuer,
            config: InterceptorConfig::default(),
            notifier: None,
            logger: None,
            credential: None,
        }
    }

    /// Run `request` through the pipeline. Always returns `Success` or `Fatal`.
    pub async fn execute(&self, request: PendingRequest) -> Outcome {
        let sent_with = self.credentials.get();

        let augmented = match self.augmenter.augment(&request, sent_with.as_ref()) {
            Ok(augmented) => augmented,
            Err(e) => {
                let outcome = Outcome::Fatal(Failure::InvalidRequest(e.to_string()));
                self.report(&request, &outcome, Instant::now());
                return outcome;
            }
        };

        // Cookie-mode responses depend on the caller's cookies, which the key ignores.
        let key = if self.cache_enabled && augmented.mode == TransportMode::Bearer {
            CacheKey::for_request(&augmented)
        } else {
            None
        };
        if let Some(key) = &key
            && let Some(hit) = self.cache.lookup(key).await
        {
            debug!(url = %augmented.url, "serving cached response");
            return Outcome::Success(hit);
        }

        let started = Instant::now();
        let mut outcome = self.dispatch(&augmented).await;

        if let Outcome::AuthExpired(response) = outcome {
            outcome = if augmented.mode == TransportMode::Cookie {
                // Exempt endpoints never carried the bearer credential.
                Outcome::Fatal(Failure::Status(response))
            } else {
                self.recover(&request, sent_with.as_ref()).await
            };
        }

        if let (Outcome::Success(response), Some(key)) = (&outcome, key) {
            self.cache.store(key, response.clone()).await;
        }

        self.report(&augmented, &outcome, started);
        outcome
    }

    /// Credential store shared with the refresh coordinator. Applications
    /// seed it after login and clear it on logout.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.refresh.status()
    }

    async fn dispatch(&self, request: &PendingRequest) -> Outcome {
        self.retry
            .run(self.transport.as_ref(), request, &self.classifier)
            .await
    }

    /// Renew the credential (or join a renewal) and re-dispatch once. A second
    /// 401 is final: no further renewal is attempted for this request.
    async fn recover(&self, original: &PendingRequest, sent_with: Option<&Credential>) -> Outcome {
        info!(url = %original.url, "authentication expired, renewing credential");

        let credential = match self.refresh.refresh(sent_with).await {
            Ok(credential) => credential,
            Err(e) => return Outcome::Fatal(Failure::RefreshFailed(e)),
        };

        let retry = match self.augmenter.augment(original, Some(&credential)) {
            Ok(retry) => retry,
            Err(e) => return Outcome::Fatal(Failure::InvalidRequest(e.to_string())),
        };

        match self.dispatch(&retry).await {
            Outcome::AuthExpired(response) => {
                warn!(url = %original.url, "renewed credential rejected");
                Outcome::Fatal(Failure::Status(response))
            }
            other => other,
        }
    }

    fn report(&self, request: &PendingRequest, outcome: &Outcome, started: Instant) {
        match outcome {
            Outcome::Success(response) if response.status == self.creation_status => {
                self.notifier.notify(Severity::Success, CREATED_MESSAGE);
            }
            Outcome::Fatal(failure) => {
                self.notifier.notify(Severity::Error, &failure.notification());
            }
            _ => {}
        }

        self.logger.log(&RequestLog {
            method: request.method.clone(),
            url: request.url.clone(),
            succeeded: outcome.is_success(),
            elapsed: started.elapsed(),
        });
    }
}

pub struct InterceptorBuilder {
    transport: Arc<dyn Transport>,
    issuer: Arc<dyn CredentialIssuer>,
    config: InterceptorConfig,
    notifier: Option<Arc<dyn Notifier>>,
    logger: Option<Arc<dyn RequestLogger>>,
    credential: Option<Credential>,
}

impl InterceptorBuilder {
    pub fn config(mut self, config: InterceptorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Credential to start with (e.g. restored from a previous login).
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn build(self) -> Result<Interceptor> {
        self.config.validate()?;

        let credentials = Arc::new(CredentialStore::new(self.credential));
        let refresh = RefreshCoordinator::new(credentials.clone(), self.issuer);

        Ok(Interceptor {
            augmenter: Augmenter::from_config(&self.config)?,
            classifier: Classifier {
                reject_no_content: self.config.reject_no_content,
            },
            retry: RetryPolicy::new(self.config.retry_budget, self.config.retry_backoff()),
            creation_status: self.config.creation_status_code,
            cache_enabled: self.config.cache_enabled,
            cache: ResponseCache::new(),
            credentials,
            refresh,
            transport: self.transport,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingRequestLogger)),
        })
    }
}
