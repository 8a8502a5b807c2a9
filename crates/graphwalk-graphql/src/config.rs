//! Client configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::retry::{RateLimitPolicy, duration_secs};

/// Default API domain; the account name is its leftmost label.
pub const DEFAULT_DOMAIN: &str = "twingate.com";

/// Default GraphQL path on the account host.
pub const DEFAULT_PATH: &str = "api/graphql/";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The account name cannot be used as a host label.
    #[error("invalid account name `{0}`")]
    InvalidAccount(String),

    /// The assembled endpoint is not a valid URL.
    #[error("invalid endpoint `{url}`: {reason}")]
    InvalidEndpoint {
        /// Attempted URL.
        url: String,
        /// Parser message.
        reason: String,
    },
}

/// Connection settings for one account.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Account (tenant) name, the leftmost host label.
    pub account: String,

    /// API key sent as `X-API-KEY`.
    pub api_key: String,

    /// API domain (default: twingate.com)
    #[serde(default = "default_domain")]
    pub domain: String,

    /// GraphQL path (default: api/graphql/)
    #[serde(default = "default_path")]
    pub path: String,

    /// Full endpoint URL used instead of `https://{account}.{domain}/{path}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_override: Option<String>,

    /// Request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Identifying `User-Agent`.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Page size for every connection walk; `0` leaves it to the server.
    #[serde(default)]
    pub page_size: i32,

    /// Ceiling on pages fetched by one walk.
    #[serde(default = "default_max_pages")]
    pub max_pages: Option<usize>,

    /// 429 handling.
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.into()
}

fn default_path() -> String {
    DEFAULT_PATH.into()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("graphwalk/{}", env!("CARGO_PKG_VERSION"))
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_pages() -> Option<usize> {
    Some(10_000)
}

impl ClientConfig {
    /// Configuration with defaults for everything but the credentials.
    pub fn new(account: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            api_key: api_key.into(),
            domain: default_domain(),
            path: default_path(),
            endpoint_override: None,
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            page_size: 0,
            max_pages: default_max_pages(),
            rate_limit: RateLimitPolicy::default(),
        }
    }

    /// Parse from TOML.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// `https://{account}.{domain}/{path}`, or the override.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let raw = if let Some(endpoint) = &self.endpoint_override {
            endpoint.clone()
        } else {
            if !is_host_label(&self.account) {
                return Err(ConfigError::InvalidAccount(self.account.clone()));
            }
            format!(
                "https://{}.{}/{}",
                self.account,
                self.domain.trim_matches('.'),
                self.path.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|err| ConfigError::InvalidEndpoint {
            url: raw,
            reason: err.to_string(),
        })
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("account", &self.account)
            .field("api_key", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("endpoint_override", &self.endpoint_override)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

fn is_host_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
