//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens are loaded from REFRESH_TOKEN / ACCESS_TOKEN or from
//! refresh_token_file, never from the TOML body, so they cannot leak through
//! a committed config file.

use common::Secret;
use interceptor::InterceptorConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "interceptor-proxy.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub interceptor: InterceptorConfig,
    pub credentials: CredentialsConfig,
}

/// HTTP proxy settings
#[derive(Debug, Deserialize)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    pub upstream_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Credential renewal settings
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    /// OAuth2 token endpoint receiving the refresh_token grant
    pub token_endpoint: String,
    #[serde(default)]
    pub client_id: String,
    /// Path to a file containing the refresh token (alternative to REFRESH_TOKEN)
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
    #[serde(skip)]
    pub refresh_token: Option<Secret<String>>,
    /// Bearer token to start with; renewed on the first 401 when absent.
    #[serde(skip)]
    pub access_token: Option<Secret<String>>,
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Refresh token resolution order:
    /// 1. REFRESH_TOKEN env var
    /// 2. refresh_token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(token) = std::env::var("REFRESH_TOKEN") {
            config.credentials.refresh_token = Some(Secret::new(token));
        } else if let Some(ref token_file) = config.credentials.refresh_token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read refresh_token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.credentials.refresh_token = Some(Secret::new(token));
            }
        }

        if let Ok(token) = std::env::var("ACCESS_TOKEN") {
            let token = Secret::new(token);
            if !token.is_blank() {
                config.credentials.access_token = Some(token);
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !is_http_url(&self.proxy.upstream_url) {
            return Err(common::Error::Config(format!(
                "upstream_url must start with http:// or https://, got: {}",
                self.proxy.upstream_url
            )));
        }

        if self.proxy.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.proxy.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if !is_http_url(&self.credentials.token_endpoint) {
            return Err(common::Error::Config(format!(
                "token_endpoint must start with http:// or https://, got: {}",
                self.credentials.token_endpoint
            )));
        }

        self.interceptor
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}
