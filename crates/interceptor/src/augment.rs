//! Per-request authentication and header normalization
//!
//! Account endpoints (login, password reset/forgot, activation) authenticate
//! with ambient cookies, so they are sent in cookie mode without a bearer
//! header. Every other request carries `Authorization: Bearer <token>` when a
//! credential is present. A missing Content-Type is filled with the configured
//! default; a caller-supplied one is left untouched.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};

use crate::config::InterceptorConfig;
use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::request::{PendingRequest, TransportMode};

#[derive(Debug, Clone)]
pub struct Augmenter {
    exempt_paths: Vec<String>,
    default_content_type: HeaderValue,
}

impl Augmenter {
    pub fn new(exempt_paths: Vec<String>, default_content_type: HeaderValue) -> Self {
        Self {
            exempt_paths,
            default_content_type,
        }
    }

    pub fn from_config(config: &InterceptorConfig) -> Result<Self> {
        Ok(Self::new(
            config.exempt_paths.clone(),
            config.content_type_header()?,
        ))
    }

    /// Whether the URL's path contains an exempt path substring. The query
    /// and fragment are never matched.
    pub fn is_exempt(&self, url: &str) -> bool {
        let path = url_path(url);
        self.exempt_paths.iter().any(|p| path.contains(p.as_str()))
    }

    /// Produce the request to dispatch. Pure: the input is cloned, never mutated.
    pub fn augment(
        &self,
        request: &PendingRequest,
        credential: Option<&Credential>,
    ) -> Result<PendingRequest> {
        let mut augmented = request.clone();

        if self.is_exempt(&request.url) {
            augmented.mode = TransportMode::Cookie;
            if is_bearer(augmented.headers.get(AUTHORIZATION)) {
                augmented.headers.remove(AUTHORIZATION);
            }
        } else {
            augmented.mode = TransportMode::Bearer;
            if let Some(credential) = credential {
                let value = HeaderValue::from_str(&format!("Bearer {}", credential.token()))
                    .map_err(|e| Error::InvalidHeader(format!("bearer token: {e}")))?;
                augmented.headers.insert(AUTHORIZATION, value);
            }
        }

        if !augmented.headers.contains_key(CONTENT_TYPE) {
            augmented
                .headers
                .insert(CONTENT_TYPE, self.default_content_type.clone());
        }

        Ok(augmented)
    }
}

/// Path of an absolute URL, or the text before any query or fragment when
/// the URL does not parse.
fn url_path(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_owned(),
    }
}

fn is_bearer(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.get(..7))
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("bearer "))
}
