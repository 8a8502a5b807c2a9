//! Error types for the transport and the fetch engine.

use graphwalk_schema::SchemaError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::pagination::PaginationError;

/// HTTP error information captured from reqwest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorInfo {
    /// Error message.
    pub message: String,
    /// HTTP status code (if available).
    pub status_code: Option<u16>,
    /// Whether the error was a timeout.
    pub is_timeout: bool,
    /// Whether the error was a connection failure.
    pub is_connect: bool,
}

impl From<reqwest::Error> for HttpErrorInfo {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status().map(|status| status.as_u16()),
            is_timeout: err.is_timeout(),
            is_connect: err.is_connect(),
        }
    }
}

/// GraphQL error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    /// Line number in the query (1-based).
    pub line: u32,
    /// Column number in the query (1-based).
    pub column: u32,
}

/// GraphQL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphqlPathSegment {
    /// Field name.
    Key(String),
    /// Array index.
    Index(i64),
}

/// One entry of a response `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human-readable error message.
    pub message: String,
    /// Location(s) within the query.
    #[serde(default)]
    pub locations: Vec<GraphqlErrorLocation>,
    /// Path within the response where the error occurred.
    #[serde(default)]
    pub path: Vec<GraphqlPathSegment>,
    /// Extensions metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// The request a fatal error belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestContext {
    /// Operation name, or `anonymous`.
    pub operation: String,
    /// Query document.
    pub query: String,
    /// Bound variables.
    pub variables: Value,
}

/// Error type for transport operations.
#[derive(Debug, Clone, Error)]
pub enum GraphqlClientError {
    /// HTTP/network error.
    #[error("HTTP error: {}", .0.message)]
    Http(HttpErrorInfo),

    /// Non-2xx response other than 429.
    #[error("HTTP status {status} for `{}` with body: {body}", .context.operation)]
    HttpStatus {
        /// HTTP status code.
        status: StatusCode,
        /// Response body (truncated if needed).
        body: String,
        /// Failed request.
        context: Box<RequestContext>,
    },

    /// The server kept answering 429 past the configured ceiling.
    #[error("rate limited {attempts} times for `{}`, giving up", .context.operation)]
    RateLimitExhausted {
        /// Number of 429 responses received.
        attempts: u32,
        /// Failed request.
        context: Box<RequestContext>,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(String),

    /// GraphQL-level errors returned by the server.
    #[error("GraphQL errors for `{}`: {}", .context.operation, join_messages(.errors))]
    GraphqlErrors {
        /// Original GraphQL error list.
        errors: Vec<GraphqlError>,
        /// Failed request.
        context: Box<RequestContext>,
    },

    /// GraphQL protocol violation.
    #[error("GraphQL protocol error: {message}")]
    Protocol {
        /// Details.
        message: String,
    },

    /// Client could not be constructed.
    #[error("client configuration error: {0}")]
    Configuration(String),
}

fn join_messages(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|err| err.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<reqwest::Error> for GraphqlClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(HttpErrorInfo::from(err))
    }
}

impl From<serde_json::Error> for GraphqlClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl GraphqlClientError {
    /// Request context, for errors raised after a request was sent.
    #[must_use]
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            Self::HttpStatus { context, .. }
            | Self::RateLimitExhausted { context, .. }
            | Self::GraphqlErrors { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Top-level error of [`GraphEngine`](crate::GraphEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Schema integrity or usage error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Transport failure.
    #[error(transparent)]
    Client(#[from] GraphqlClientError),

    /// Pagination failure.
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    /// The engine was asked for something its configuration cannot serve.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A mutation reported its own `error` despite transport success.
    #[error("{message}")]
    DomainValidation {
        /// Message from the mutation's `error` field, verbatim.
        message: String,
        /// The mutation request.
        context: Box<RequestContext>,
    },
}

impl EngineError {
    /// Query and variables of the failed request, for errors raised after
    /// one was sent.
    #[must_use]
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            Self::Client(err) => err.context(),
            Self::Pagination(err) => err.context(),
            Self::DomainValidation { context, .. } => Some(context),
            Self::Schema(_) | Self::Configuration(_) => None,
        }
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
