//! Interceptor Proxy
//!
//! Single-binary forwarding proxy that runs every request through the
//! interceptor pipeline:
//! 1. Attaches the bearer credential (cookie mode for account endpoints)
//! 2. Serves repeated GETs from the response cache
//! 3. Retries transient upstream failures
//! 4. Renews the credential once on 401, shared across concurrent requests

mod config;
mod metrics;
mod proxy;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use common::Secret;
use http_transport::{ReqwestTransport, TokenEndpointIssuer};
use interceptor::{Credential, Interceptor};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::metrics::{MetricsLogger, MetricsNotifier};
use crate::proxy::ProxyState;

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    proxy: ProxyState,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit queues requests beyond `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(proxy_handler)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Wire the reqwest collaborators and metrics wrappers into an interceptor.
fn build_interceptor(config: &Config) -> Result<Interceptor> {
    let timeout = Duration::from_secs(config.proxy.timeout_secs);
    let transport = ReqwestTransport::new(timeout).context("failed to build HTTP clients")?;

    let refresh_token = config
        .credentials
        .refresh_token
        .clone()
        .unwrap_or_else(|| Secret::new(String::new()));
    if refresh_token.is_blank() {
        warn!("no refresh token configured; credential renewal will fail");
    }
    let token_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build token endpoint client")?;
    let issuer = TokenEndpointIssuer::new(
        token_client,
        &config.credentials.token_endpoint,
        &config.credentials.client_id,
        refresh_token,
    );

    let mut builder = Interceptor::builder(Arc::new(transport), Arc::new(issuer))
        .config(config.interceptor.clone())
        .notifier(Arc::new(MetricsNotifier::default()))
        .logger(Arc::new(MetricsLogger::default()));
    if let Some(token) = &config.credentials.access_token {
        builder = builder.credential(Credential::new(token.expose().clone()));
    }

    builder.build().context("invalid interceptor configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting interceptor-proxy");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.proxy.listen_addr,
        upstream_url = %config.proxy.upstream_url,
        token_endpoint = %config.credentials.token_endpoint,
        retry_budget = config.interceptor.retry_budget,
        cache_enabled = config.interceptor.cache_enabled,
        authenticated = config.credentials.access_token.is_some(),
        "configuration loaded"
    );

    let interceptor = build_interceptor(&config)?;

    let app_state = AppState {
        proxy: ProxyState {
            interceptor: Arc::new(interceptor),
            upstream_url: config.proxy.upstream_url.clone(),
            requests_total: Arc::new(AtomicU64::new(0)),
        },
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.proxy.max_connections);

    let listen_addr = config.proxy.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires: the server is
    // told to drain, then the drain races DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: uptime, requests served, cache size and renewal state.
/// Returns 200 when a credential is held, 503 (degraded) otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let interceptor = &state.proxy.interceptor;
    let refresh = interceptor.refresh_status();
    let authenticated = interceptor.credentials().is_authenticated();
    let cache_entries = interceptor.cache().len().await;

    let (status_code, status) = if authenticated {
        (axum::http::StatusCode::OK, "healthy")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = serde_json::json!({
        "status": status,
        "authenticated": authenticated,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "requests_served": state.proxy.requests_total.load(Ordering::Relaxed),
        "cache_entries": cache_entries,
        "refresh": {
            "phase": refresh.phase.label(),
            "succeeded": refresh.succeeded,
            "failed": refresh.failed,
        },
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Catch-all handler that proxies all non-health requests to upstream.
async fn proxy_handler(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    proxy::proxy_request(&state.proxy, request, request_id).await
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
