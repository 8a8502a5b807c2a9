//! Rate-limit retry policy.
//!
//! HTTP 429 is the only condition retried. The wait comes from `Retry-After`
//! (seconds), falling back to a default, and is clamped to a ceiling. The
//! number of consecutive 429s per request is bounded.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};

/// Retry decision result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after a delay.
    RetryAfter(Duration),
    /// Do not retry.
    DoNotRetry,
}

/// Rate-limit policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Wait used when `Retry-After` is missing or unparseable.
    #[serde(default = "default_retry_after", with = "duration_secs")]
    pub default_retry_after: Duration,
    /// Longest wait honoured for a single 429.
    #[serde(default = "default_max_retry_after", with = "duration_secs")]
    pub max_retry_after: Duration,
    /// Maximum consecutive 429 responses per request; `None` retries forever.
    #[serde(default = "default_max_retries")]
    pub max_retries: Option<u32>,
}

const fn default_retry_after() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_retry_after() -> Duration {
    Duration::from_secs(300)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_retries() -> Option<u32> {
    Some(32)
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_retry_after: default_retry_after(),
            max_retry_after: default_max_retry_after(),
            max_retries: default_max_retries(),
        }
    }
}

impl RateLimitPolicy {
    /// Decide what to do after the `attempt`-th consecutive 429.
    #[must_use]
    pub fn decide(&self, attempt: u32, retry_after: Option<Duration>) -> RetryDecision {
        if self.max_retries.is_some_and(|max| attempt > max) {
            return RetryDecision::DoNotRetry;
        }
        let delay = retry_after
            .unwrap_or(self.default_retry_after)
            .min(self.max_retry_after);
        RetryDecision::RetryAfter(delay)
    }
}

/// Parse `Retry-After` as whole seconds.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(RETRY_AFTER)?;
    let value = header.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn uses_header_then_default() {
        let policy = RateLimitPolicy::default();
        assert_eq!(
            policy.decide(1, Some(Duration::from_secs(2))),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.decide(1, None),
            RetryDecision::RetryAfter(Duration::from_secs(60))
        );
    }

    #[test]
    fn clamps_and_stops() {
        let policy = RateLimitPolicy {
            max_retries: Some(2),
            max_retry_after: Duration::from_secs(10),
            ..RateLimitPolicy::default()
        };
        assert_eq!(
            policy.decide(2, Some(Duration::from_secs(3600))),
            RetryDecision::RetryAfter(Duration::from_secs(10))
        );
        assert_eq!(policy.decide(3, None), RetryDecision::DoNotRetry);

        let unbounded = RateLimitPolicy {
            max_retries: None,
            ..RateLimitPolicy::default()
        };
        assert!(matches!(
            unbounded.decide(u32::MAX, None),
            RetryDecision::RetryAfter(_)
        ));
    }

    #[test]
    fn retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn deserializes_with_defaults() {
        let policy: RateLimitPolicy = toml::from_str("max_retries = 5").expect("policy");
        assert_eq!(policy.max_retries, Some(5));
        assert_eq!(policy.default_retry_after, Duration::from_secs(60));
    }
}
