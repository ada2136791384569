//! Credential renewal against an OAuth2 token endpoint
//!
//! POSTs a `refresh_token` grant and turns the returned access token into a
//! `Credential`. When the endpoint rotates the refresh token, the new one
//! replaces the stored one for the next renewal.
//!
//! Only the refresh leader calls `issue`, so renewals never race on the
//! stored refresh token.

use std::sync::Mutex;

use common::Secret;
use interceptor::{BoxFuture, Credential, CredentialIssuer, RefreshError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Token endpoint response. Only `access_token` is required.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

pub struct TokenEndpointIssuer {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    refresh_token: Mutex<Secret<String>>,
}

impl TokenEndpointIssuer {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        refresh_token: Secret<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            refresh_token: Mutex::new(refresh_token),
        }
    }

    fn current_refresh_token(&self) -> Secret<String> {
        self.refresh_token
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    async fn request_token(&self, refresh: &Secret<String>) -> Result<TokenResponse, RefreshError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh.expose().as_str()),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RefreshError::Unavailable(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 400 invalid_grant, 401/403: the refresh token itself is bad
            if matches!(status.as_u16(), 400 | 401 | 403) {
                return Err(RefreshError::Rejected(format!(
                    "refresh token rejected ({status}): {body}"
                )));
            }

            return Err(RefreshError::Unavailable(format!(
                "token refresh returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| RefreshError::Unavailable(format!("invalid refresh response: {e}")))
    }
}

impl CredentialIssuer for TokenEndpointIssuer {
    fn issue(&self, _expired: Option<Credential>) -> BoxFuture<'_, Result<Credential, RefreshError>> {
        Box::pin(async move {
            let refresh = self.current_refresh_token();
            if refresh.is_blank() {
                warn!("no refresh token configured, cannot renew credential");
                return Err(RefreshError::Rejected("no refresh token configured".into()));
            }

            let token = self.request_token(&refresh).await?;
            if token.access_token.trim().is_empty() {
                return Err(RefreshError::Unavailable(
                    "token endpoint returned an empty access token".into(),
                ));
            }

            if let Some(rotated) = token.refresh_token.filter(|t| !t.trim().is_empty()) {
                *self.refresh_token.lock().unwrap_or_else(|p| p.into_inner()) =
                    Secret::new(rotated);
            }

            info!(expires_in = ?token.expires_in, "credential renewed");
            Ok(Credential::new(token.access_token))
        })
    }
}
