//! graphwalk schema - declarative type registry for a node/object/connection API.
//!
//! This crate provides:
//! - A preprocessed, immutable [`Registry`] of node and object types.
//! - Recursive selection text generation ([`FieldSelector`]).
//! - The canonical paged and single-node query documents.
//! - Per-type record normalization ([`RecordTransform`]).
//! - The built-in type [`catalog`] of the remote API.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

pub mod catalog;
mod error;
mod query;
mod registry;
mod selector;
mod transform;

pub use error::{SchemaError, SchemaResult};
pub use query::{
    DEFAULT_ALIAS, PAGE_INFO_SELECTION, PageOptions, connection_envelope, detect_connection_field,
    is_connection, key_value_query, root_connection_query, root_node_paged_query, root_node_query,
};
pub use registry::{
    EnumLabels, FieldDescriptor, FieldKind, ID_FIELD, NodeQueries, Registry, RegistryBuilder,
    ScalarKind, TypeDescriptor, TypeInfo, is_graphql_name,
};
pub use selector::{
    ConnectionNodes, DEFAULT_MAX_DEPTH, FieldOptions, FieldOverride, FieldSelector, FieldSet,
};
pub use transform::{
    FlattenHook, Record, RecordTransform, TransformOptions, TransformRule,
    default_flatten_overrides, port_ranges_to_string, record_datetime,
};
