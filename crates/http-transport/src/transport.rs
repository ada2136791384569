//! Network transport over reqwest
//!
//! Any HTTP status comes back as a `Response`; the pipeline classifies it.
//! Only failures below HTTP (connect, timeout, truncated body) become
//! `TransportError`s.

use std::time::Duration;

use interceptor::{
    BoxFuture, PendingRequest, Response, Transport, TransportError, TransportMode,
};
use tracing::debug;

pub struct ReqwestTransport {
    bearer: reqwest::Client,
    cookie: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build both clients. `timeout` bounds each attempt, body included.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            bearer: reqwest::Client::builder().build()?,
            cookie: reqwest::Client::builder().cookie_store(true).build()?,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client(&self, mode: TransportMode) -> &reqwest::Client {
        match mode {
            TransportMode::Bearer => &self.bearer,
            TransportMode::Cookie => &self.cookie,
        }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a PendingRequest,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            let mut builder = self
                .client(request.mode)
                .request(request.method.clone(), &request.url)
                .headers(request.headers.clone())
                .timeout(self.timeout);
            if !request.body.is_empty() {
                builder = builder.body(request.body.clone());
            }

            let upstream = builder.send().await.map_err(map_error)?;
            let status = upstream.status().as_u16();
            let headers = upstream.headers().clone();
            let body = upstream.bytes().await.map_err(map_error)?;

            debug!(status, bytes = body.len(), mode = ?request.mode, "upstream responded");
            Ok(Response {
                status,
                headers,
                body,
            })
        })
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        TransportError::Body(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, StatusCode};
    use reqwest::Method;
    use reqwest::header::{AUTHORIZATION, HeaderValue};
    use tokio::net::TcpListener;

    /// Mock upstream echoing method, path, query, authorization, cookie and body.
    async fn start_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/login",
                    axum::routing::post(|| async {
                        (StatusCode::OK, [("set-cookie", "session=s1; Path=/")], "{}")
                    }),
                )
                .route(
                    "/missing",
                    axum::routing::get(|| async { (StatusCode::NOT_FOUND, "nope") }),
                )
                .fallback(|request: axum::http::Request<Body>| async move {
                    let header = |h: &HeaderMap, name: &str| {
                        h.get(name)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string()
                    };
                    let authorization = header(request.headers(), "authorization");
                    let cookie = header(request.headers(), "cookie");
                    let method = request.method().to_string();
                    let path = request.uri().path().to_string();
                    let query = request.uri().query().unwrap_or("").to_string();
                    let body = axum::body::to_bytes(request.into_body(), 1024 * 1024)
                        .await
                        .unwrap();
                    axum::Json(serde_json::json!({
                        "method": method,
                        "path": path,
                        "query": query,
                        "authorization": authorization,
                        "cookie": cookie,
                        "body": String::from_utf8_lossy(&body),
                    }))
                });
            axum::serve(listener, app).await.unwrap();
        });

        url
    }

    fn json(response: &Response) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[tokio::test]
    async fn forwards_method_headers_query_and_body() {
        let base = start_echo_server().await;
        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let request = PendingRequest::new(Method::PUT, format!("{base}/items/3?force=true"))
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer at_abc"))
            .with_body(r#"{"name":"widget"}"#);

        let response = transport.send(&request).await.unwrap();

        assert_eq!(response.status, 200);
        let echo = json(&response);
        assert_eq!(echo["method"], "PUT");
        assert_eq!(echo["path"], "/items/3");
        assert_eq!(echo["query"], "force=true");
        assert_eq!(echo["authorization"], "Bearer at_abc");
        assert_eq!(echo["body"], r#"{"name":"widget"}"#);
    }

    #[tokio::test]
    async fn non_success_status_is_a_response_not_an_error() {
        let base = start_echo_server().await;
        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();

        let response = transport
            .send(&PendingRequest::get(format!("{base}/missing")))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.text(), "nope");
    }

    #[tokio::test]
    async fn cookie_mode_keeps_session_cookies() {
        let base = start_echo_server().await;
        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();

        let mut login = PendingRequest::post(format!("{base}/login"), "{}");
        login.mode = TransportMode::Cookie;
        transport.send(&login).await.unwrap();

        let mut follow_up = PendingRequest::get(format!("{base}/user/activate"));
        follow_up.mode = TransportMode::Cookie;
        let with_cookie = transport.send(&follow_up).await.unwrap();
        assert_eq!(json(&with_cookie)["cookie"], "session=s1");

        let bearer = transport
            .send(&PendingRequest::get(format!("{base}/items")))
            .await
            .unwrap();
        assert_eq!(json(&bearer)["cookie"], "", "bearer client has no cookie jar");
    }

    #[tokio::test]
    async fn dead_upstream_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/items", listener.local_addr().unwrap());
        drop(listener);

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let err = transport.send(&PendingRequest::get(url)).await.unwrap_err();

        assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn hung_upstream_is_a_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/slow", listener.local_addr().unwrap());
        tokio::spawn(async move {
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    drop(socket);
                });
            }
        });

        let transport = ReqwestTransport::new(Duration::from_millis(50)).unwrap();
        let err = transport.send(&PendingRequest::get(url)).await.unwrap_err();

        assert!(err.is_timeout(), "got {err:?}");
    }
}
