//! HTTP proxy logic
//!
//! Turns each inbound request into a `PendingRequest` against the upstream
//! URL, runs it through the interceptor pipeline and maps the outcome back
//! to an HTTP response. Upstream responses (success or failure status) are
//! returned verbatim minus hop-by-hop headers; failures without an upstream
//! response become a JSON error body.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use interceptor::{Failure, Interceptor, Outcome, PendingRequest};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, instrument, warn};

/// Headers to strip before forwarding (hop-by-hop per RFC 2616 Section 13.5.1)
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared state passed to the proxy handler via axum State extractor
#[derive(Clone)]
pub struct ProxyState {
    pub interceptor: Arc<Interceptor>,
    pub upstream_url: String,
    pub requests_total: Arc<AtomicU64>,
}

/// JSON error body: {"error":{"type":"interceptor_error","message":"...","request_id":"req_..."}}
pub fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": "interceptor_error",
            "message": message,
            "request_id": request_id,
        }
    });
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Forward an inbound request through the interceptor pipeline.
#[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.uri().path()))]
pub async fn proxy_request(
    state: &ProxyState,
    request: axum::http::Request<axum::body::Body>,
    request_id: String,
) -> Response {
    state.requests_total.fetch_add(1, Ordering::Relaxed);

    let method = request.method().clone();
    let url = match request.uri().path_and_query() {
        Some(pq) => format!("{}{}", state.upstream_url.trim_end_matches('/'), pq),
        None => state.upstream_url.clone(),
    };

    // Host belongs to this proxy, not the upstream
    let headers = forwardable(request.headers(), &[header::HOST.as_str()]);

    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "failed to read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {e}"),
                &request_id,
            );
        }
    };

    let mut pending = PendingRequest::new(method, url).with_body(body);
    pending.headers = headers;

    outcome_response(state.interceptor.execute(pending).await, &request_id)
}

/// Map a pipeline outcome to the response returned to the client.
pub fn outcome_response(outcome: Outcome, request_id: &str) -> Response {
    match outcome {
        Outcome::Success(upstream) | Outcome::Fatal(Failure::Status(upstream)) => {
            upstream_response(upstream, request_id)
        }
        Outcome::Fatal(Failure::RefreshFailed(e)) => {
            warn!(error = %e, "credential renewal failed");
            error_response(
                StatusCode::UNAUTHORIZED,
                &format!("authentication expired and renewal failed: {e}"),
                request_id,
            )
        }
        Outcome::Fatal(failure) => {
            error!(error = %failure, "request failed");
            error_response(StatusCode::BAD_GATEWAY, &failure.to_string(), request_id)
        }
        other => {
            error!(outcome = other.label(), "pipeline returned a non-terminal outcome");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected pipeline outcome",
                request_id,
            )
        }
    }
}

fn upstream_response(upstream: interceptor::Response, request_id: &str) -> Response {
    let status = match StatusCode::from_u16(upstream.status) {
        Ok(s) => s,
        Err(e) => {
            return error_response(
                StatusCode::BAD_GATEWAY,
                &format!("upstream returned invalid status: {e}"),
                request_id,
            );
        }
    };

    let mut response = Response::new(axum::body::Body::from(upstream.body));
    *response.status_mut() = status;
    *response.headers_mut() = forwardable(&upstream.headers, &[]);
    response
}

/// Copy headers, dropping hop-by-hop ones and any listed in `also_strip`.
fn forwardable(headers: &HeaderMap, also_strip: &[&str]) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name.as_str()) && !also_strip.contains(&name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Check if a header is hop-by-hop (should be stripped before forwarding)
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}
