//! Request and response values flowing through the pipeline

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// How a request authenticates on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// `Authorization: Bearer` header from the credential store.
    Bearer,
    /// Ambient credentials (cookies) handled by the transport.
    Cookie,
}

/// An outbound request, created per call by the application.
///
/// The pipeline never mutates a caller's request: augmentation clones it and
/// returns the adjusted copy.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    /// Full URL including query parameters.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub mode: TransportMode,
}

impl PendingRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            mode: TransportMode::Bearer,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Idempotent reads are the only requests eligible for caching.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }
}

/// A completed transport response. Cloning shares the body buffer.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8, lossily. Used for log and error context only.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
