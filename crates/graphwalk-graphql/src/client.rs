//! GraphQL HTTP transport.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use graphwalk_schema::DEFAULT_ALIAS;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{GraphqlClientError, RequestContext};
use crate::logging::redact_sensitive;
use crate::operation::{GraphqlRequest, GraphqlResponse};
use crate::retry::{RateLimitPolicy, RetryDecision, parse_retry_after};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Executes one GraphQL operation and returns its `data`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`, returning the response `data` object.
    async fn exec(&self, request: GraphqlRequest<Value>) -> Result<Value, GraphqlClientError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn exec(&self, request: GraphqlRequest<Value>) -> Result<Value, GraphqlClientError> {
        (**self).exec(request).await
    }
}

/// Handler for responses carrying a non-empty `errors` array.
///
/// Returns the data to hand to the caller, or the error to raise.
pub type ErrorHook = Arc<
    dyn Fn(GraphqlResponse<Value>, &RequestContext) -> Result<Value, GraphqlClientError>
        + Send
        + Sync,
>;

/// GraphQL client metrics.
#[derive(Debug, Default)]
#[allow(clippy::struct_field_names)]
pub struct GraphqlClientMetrics {
    requests_total: AtomicU64,
    requests_success: AtomicU64,
    requests_error: AtomicU64,
    requests_rate_limited: AtomicU64,
    per_operation: Mutex<BTreeMap<String, u64>>,
}

impl GraphqlClientMetrics {
    fn record_call(&self, operation: &str) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        *self
            .per_operation
            .lock()
            .entry(operation.to_string())
            .or_insert(0) += 1;
    }

    /// Snapshot current metrics.
    #[must_use]
    pub fn snapshot(&self) -> GraphqlClientMetricsSnapshot {
        GraphqlClientMetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_error: self.requests_error.load(Ordering::Relaxed),
            requests_rate_limited: self.requests_rate_limited.load(Ordering::Relaxed),
            per_operation: self.per_operation.lock().clone(),
        }
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct GraphqlClientMetricsSnapshot {
    /// Operations executed (retries not counted).
    pub requests_total: u64,
    /// Operations that returned data without GraphQL errors.
    pub requests_success: u64,
    /// Operations that failed or returned GraphQL errors.
    pub requests_error: u64,
    /// 429 responses received.
    pub requests_rate_limited: u64,
    /// Operations executed, by operation name.
    pub per_operation: BTreeMap<String, u64>,
}

/// GraphQL client builder.
#[derive(Clone)]
pub struct GraphqlClientBuilder {
    endpoint: String,
    headers: HeaderMap,
    timeout: Duration,
    user_agent: Option<String>,
    rate_limit: RateLimitPolicy,
    error_hook: Option<ErrorHook>,
}

impl GraphqlClientBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            endpoint: endpoint.into(),
            headers,
            timeout: Duration::from_secs(30),
            user_agent: None,
            rate_limit: RateLimitPolicy::default(),
            error_hook: None,
        }
    }

    /// Builder for a [`ClientConfig`], credentials included.
    pub fn from_config(config: &ClientConfig) -> Result<Self, GraphqlClientError> {
        let endpoint = config
            .endpoint()
            .map_err(|err| GraphqlClientError::Configuration(err.to_string()))?;
        Ok(Self::new(endpoint.as_str())
            .with_api_key(&config.api_key)?
            .with_timeout(config.timeout)
            .with_user_agent(&config.user_agent)
            .with_rate_limit_policy(config.rate_limit.clone()))
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach the `X-API-KEY` header.
    pub fn with_api_key(mut self, api_key: impl AsRef<str>) -> Result<Self, GraphqlClientError> {
        let mut value = HeaderValue::from_str(api_key.as_ref()).map_err(|_| {
            GraphqlClientError::Configuration("API key is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        self.headers
            .insert(HeaderName::from_static(API_KEY_HEADER), value);
        Ok(self)
    }

    /// Set timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the `User-Agent`.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the 429 policy.
    #[must_use]
    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }

    /// Route responses with GraphQL errors to `hook` instead of the default handler.
    #[must_use]
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GraphqlClient, GraphqlClientError> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("graphwalk/{}", env!("CARGO_PKG_VERSION")));
        let http = reqwest::Client::builder()
            .default_headers(self.headers)
            .user_agent(user_agent)
            .timeout(self.timeout)
            .build()?;
        Ok(GraphqlClient {
            endpoint: self.endpoint,
            http,
            rate_limit: self.rate_limit,
            error_hook: self.error_hook,
            metrics: Arc::new(GraphqlClientMetrics::default()),
        })
    }
}

/// GraphQL client.
#[derive(Clone)]
pub struct GraphqlClient {
    endpoint: String,
    http: reqwest::Client,
    rate_limit: RateLimitPolicy,
    error_hook: Option<ErrorHook>,
    metrics: Arc<GraphqlClientMetrics>,
}

impl std::fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.endpoint)
            .field("rate_limit", &self.rate_limit)
            .field("error_hook", &self.error_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl GraphqlClient {
    /// Client for a [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, GraphqlClientError> {
        GraphqlClientBuilder::from_config(config)?.build()
    }

    /// Endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Return client metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> GraphqlClientMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Execute a request and return the full response, GraphQL errors included.
    #[instrument(skip(self, request), fields(operation = tracing::field::Empty))]
    pub async fn execute(
        &self,
        request: &GraphqlRequest<Value>,
    ) -> Result<GraphqlResponse<Value>, GraphqlClientError> {
        let context = request.context();
        tracing::Span::current().record("operation", context.operation.as_str());
        self.metrics.record_call(&context.operation);
        debug!(variables = %redact_sensitive(&context.variables), "executing GraphQL operation");

        let body = serde_json::to_vec(request)?;
        let bytes = match self.send_with_retry(body, &context).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.metrics.requests_error.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };
        let response: GraphqlResponse<Value> = serde_json::from_slice(&bytes)?;

        if response.is_ok() {
            self.metrics
                .requests_success
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.requests_error.fetch_add(1, Ordering::Relaxed);
        }
        Ok(response)
    }

    async fn send_with_retry(
        &self,
        body: Vec<u8>,
        context: &RequestContext,
    ) -> Result<Vec<u8>, GraphqlClientError> {
        let mut rate_limited = 0;
        loop {
            let response = self
                .http
                .post(&self.endpoint)
                .body(body.clone())
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                self.metrics
                    .requests_rate_limited
                    .fetch_add(1, Ordering::Relaxed);
                let retry_after = parse_retry_after(response.headers());
                match self.rate_limit.decide(rate_limited, retry_after) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            operation = %context.operation,
                            attempt = rate_limited,
                            retry_after_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "rate limited, waiting before retry"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    RetryDecision::DoNotRetry => {
                        return Err(GraphqlClientError::RateLimitExhausted {
                            attempts: rate_limited,
                            context: Box::new(context.clone()),
                        });
                    }
                }
            }

            let bytes = response.bytes().await?;
            if !status.is_success() {
                return Err(GraphqlClientError::HttpStatus {
                    status,
                    body: truncate_body(&bytes),
                    context: Box::new(context.clone()),
                });
            }
            debug!(operation = %context.operation, bytes = bytes.len(), "GraphQL response received");
            return Ok(bytes.to_vec());
        }
    }
}

#[async_trait]
impl Transport for GraphqlClient {
    async fn exec(&self, request: GraphqlRequest<Value>) -> Result<Value, GraphqlClientError> {
        let response = self.execute(&request).await?;
        let context = request.context();
        if !response.is_ok() {
            return match &self.error_hook {
                Some(hook) => hook(response, &context),
                None => tolerate_partial_edges(response, &context),
            };
        }
        response.data.ok_or_else(|| GraphqlClientError::Protocol {
            message: format!("missing GraphQL data for `{}`", context.operation),
        })
    }
}

/// Default handling of a response with GraphQL errors.
///
/// Logs the errors. When `data.result.edges` is a list the null edges and
/// edges with a null node are dropped and the partial data is returned;
/// otherwise the original errors are raised.
pub fn tolerate_partial_edges(
    mut response: GraphqlResponse<Value>,
    context: &RequestContext,
) -> Result<Value, GraphqlClientError> {
    warn!(
        operation = %context.operation,
        errors = ?response.errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
        "GraphQL errors in response"
    );

    let dropped = response
        .data
        .as_mut()
        .and_then(|data| data.get_mut(DEFAULT_ALIAS))
        .and_then(|result| result.get_mut("edges"))
        .and_then(Value::as_array_mut)
        .map(|edges| {
            let before = edges.len();
            edges.retain(|edge| edge.get("node").is_some_and(|node| !node.is_null()));
            before - edges.len()
        });

    match (dropped, response.data) {
        (Some(dropped), Some(data)) => {
            warn!(operation = %context.operation, dropped, "returning partial result");
            Ok(data)
        }
        _ => Err(GraphqlClientError::GraphqlErrors {
            errors: response.errors,
            context: Box::new(context.clone()),
        }),
    }
}

fn truncate_body(bytes: &[u8]) -> String {
    const MAX_LEN: usize = 4096;
    let mut body = String::from_utf8_lossy(bytes).to_string();
    if body.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::GraphqlError;

    fn context() -> RequestContext {
        RequestContext {
            operation: "Resources".into(),
            query: "query Resources{...}".into(),
            variables: json!({}),
        }
    }

    fn error(message: &str) -> GraphqlError {
        GraphqlError {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }

    #[test]
    fn null_edges_are_dropped() {
        let response = GraphqlResponse {
            data: Some(json!({"result": {
                "pageInfo": {"hasNextPage": false, "endCursor": null},
                "edges": [{"node": {"id": "a"}}, null, {"node": null}, {"node": {"id": "b"}}]
            }})),
            errors: vec![error("permission denied on one node")],
            extensions: None,
        };
        let data = tolerate_partial_edges(response, &context()).expect("partial data");
        assert_eq!(
            data["result"]["edges"],
            json!([{"node": {"id": "a"}}, {"node": {"id": "b"}}])
        );
    }

    #[test]
    fn errors_without_edges_are_raised() {
        let response = GraphqlResponse {
            data: Some(json!({"result": null})),
            errors: vec![error("boom")],
            extensions: None,
        };
        let err = tolerate_partial_edges(response, &context()).expect_err("raised");
        match err {
            GraphqlClientError::GraphqlErrors { errors, context } => {
                assert_eq!(errors[0].message, "boom");
                assert_eq!(context.operation, "Resources");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "é".repeat(4000);
        let truncated = truncate_body(body.as_bytes());
        assert!(truncated.len() <= 4096 + '…'.len_utf8());
        assert!(truncated.ends_with('…'));
    }
}
