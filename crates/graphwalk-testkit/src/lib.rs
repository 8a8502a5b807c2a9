//! graphwalk testkit - shared test support.
//!
//! This crate provides:
//! - Idempotent tracing setup for tests.
//! - [`ScriptedTransport`], an in-memory [`Transport`](graphwalk_graphql::Transport)
//!   replaying queued responses.
//! - [`MockGraphqlServer`], a wiremock endpoint answering from a queue.
//! - Registry and payload fixtures.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod fixtures;
mod mock_server;
mod scripted;
mod tracing_config;

pub use mock_server::{MockGraphqlServer, QueuedResponder};
pub use scripted::ScriptedTransport;
pub use tracing_config::{init_test_tracing, init_test_tracing_with_filter};
