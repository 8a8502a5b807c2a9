//! graphwalk GraphQL - transport and fetch engine over a schema registry.
//!
//! This crate provides:
//! - An HTTP GraphQL client with rate-limit retry and partial-error tolerance.
//! - The cursor pagination engine and embedded connection continuation.
//! - [`GraphEngine`], returning resolved and normalized records.
//! - Account and API key validity probes.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

mod client;
mod config;
mod engine;
mod error;
mod logging;
mod operation;
mod pagination;
mod probe;
mod resolver;
mod retry;

pub use client::{
    API_KEY_HEADER, ErrorHook, GraphqlClient, GraphqlClientBuilder, GraphqlClientMetrics,
    GraphqlClientMetricsSnapshot, Transport, tolerate_partial_edges,
};
pub use config::{ClientConfig, ConfigError, DEFAULT_DOMAIN, DEFAULT_PATH};
pub use engine::{FetchOptions, GraphEngine};
pub use error::{
    EngineError, EngineResult, GraphqlClientError, GraphqlError, GraphqlErrorLocation,
    GraphqlPathSegment, HttpErrorInfo, RequestContext,
};
pub use logging::{LoggingConfig, LoggingError, init_logging, redact_sensitive};
pub use operation::{GraphqlQuery, GraphqlRequest, GraphqlResponse};
pub use pagination::{
    Connection, CursorPage, CursorState, Edge, PageInfo, PaginationError, Paginator, ResultPath,
    paginate_cursor,
};
pub use probe::{probe_account, probe_api_key};
pub use resolver::{ConnectionJoin, ConnectionResolver, NodeMap};
pub use retry::{RateLimitPolicy, RetryDecision};
