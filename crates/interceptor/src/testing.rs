//! Hand-written collaborator doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::AUTHORIZATION;

use crate::collaborators::{
    BoxFuture, CredentialIssuer, Notifier, RequestLog, RequestLogger, Severity, Transport,
};
use crate::credentials::Credential;
use crate::error::{RefreshError, TransportError};
use crate::request::{PendingRequest, Response};

/// Replays a fixed script of results, one per call.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response, TransportError>>>,
    seen: Mutex<Vec<PendingRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<Response, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<PendingRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: &'a PendingRequest,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())));
        Box::pin(async move { next })
    }
}

/// Accepts exactly one bearer token; everything else gets a 401.
pub struct TokenGatedTransport {
    accepted: Mutex<String>,
    status: u16,
    calls: AtomicUsize,
    authorizations: Mutex<Vec<Option<String>>>,
}

impl TokenGatedTransport {
    pub fn new(accepted: &str, status: u16) -> Self {
        Self {
            accepted: Mutex::new(accepted.to_string()),
            status,
            calls: AtomicUsize::new(0),
            authorizations: Mutex::new(Vec::new()),
        }
    }

    /// Reject every token, including refreshed ones.
    pub fn reject_all(status: u16) -> Self {
        Self::new("", status)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Authorization header of each call, in order.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.authorizations.lock().unwrap().clone()
    }
}

impl Transport for TokenGatedTransport {
    fn send<'a>(
        &'a self,
        request: &'a PendingRequest,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let auth = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.authorizations.lock().unwrap().push(auth.clone());

        let accepted = self.accepted.lock().unwrap().clone();
        let expected = format!("Bearer {accepted}");
        let ok = !accepted.is_empty() && auth.as_deref() == Some(expected.as_str());
        let response = if ok {
            Response::new(self.status, format!("ok:{}", request.url))
        } else {
            Response::new(401, "token expired")
        };
        Box::pin(async move { Ok(response) })
    }
}

/// Issues a fixed result after an optional delay, counting calls.
pub struct CountingIssuer {
    result: Result<Credential, RefreshError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingIssuer {
    pub fn succeeding(token: &str, delay: Duration) -> Self {
        Self {
            result: Ok(Credential::new(token)),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: RefreshError, delay: Duration) -> Self {
        Self {
            result: Err(error),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialIssuer for CountingIssuer {
    fn issue(&self, _expired: Option<Credential>) -> BoxFuture<'_, Result<Credential, RefreshError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.clone();
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

/// Never answers its first call; later calls succeed with `token`.
pub struct StallOnceIssuer {
    token: String,
    calls: AtomicUsize,
}

impl StallOnceIssuer {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialIssuer for StallOnceIssuer {
    fn issue(&self, _expired: Option<Credential>) -> BoxFuture<'_, Result<Credential, RefreshError>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Box::pin(std::future::pending());
        }
        let credential = Credential::new(self.token.as_str());
        Box::pin(async move { Ok(credential) })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(Severity, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(s, _)| *s == Severity::Error)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn successes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(s, _)| *s == Severity::Success)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<RequestLog>>,
}

impl RecordingLogger {
    pub fn lines(&self) -> Vec<RequestLog> {
        self.lines.lock().unwrap().clone()
    }
}

impl RequestLogger for RecordingLogger {
    fn log(&self, line: &RequestLog) {
        self.lines.lock().unwrap().push(line.clone());
    }
}
