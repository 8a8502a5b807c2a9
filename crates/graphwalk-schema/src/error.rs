//! Error types for schema registration, selection and query synthesis.

use thiserror::Error;

/// Schema integrity and usage errors.
///
/// These are never retried: they describe a mismatch between the static type
/// table and what a caller asked of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A type name that is not in the registry.
    #[error("type `{0}` is not registered")]
    UnknownType(String),

    /// A field whose referenced type is not in the registry.
    #[error("field `{type_name}.{field}` references unregistered type `{target}`")]
    DanglingReference {
        /// Declaring type.
        type_name: String,
        /// Field name.
        field: String,
        /// Referenced type name.
        target: String,
    },

    /// The same type was registered twice.
    #[error("type `{0}` is registered more than once")]
    DuplicateType(String),

    /// The same field name appears twice on one type.
    #[error("field `{type_name}.{field}` is declared more than once")]
    DuplicateField {
        /// Declaring type.
        type_name: String,
        /// Field name.
        field: String,
    },

    /// A field name that the type does not declare.
    #[error("type `{type_name}` has no field `{field}`")]
    UnknownField {
        /// Type name.
        type_name: String,
        /// Field name.
        field: String,
    },

    /// A label was required but the type has no unique label field.
    #[error("type `{0}` has no unique label field")]
    MissingLabel(String),

    /// A node-only operation was requested on an object type.
    #[error("type `{0}` is not a node type")]
    NotANode(String),

    /// A name that is not a valid GraphQL identifier.
    #[error("`{0}` is not a valid GraphQL name")]
    InvalidName(String),

    /// Nested expansion went deeper than the configured limit.
    #[error("selection depth limit {max} exceeded at `{path}`")]
    DepthExceeded {
        /// Dotted path of the field being expanded.
        path: String,
        /// Configured maximum depth.
        max: usize,
    },

    /// More than one connection field under a result envelope.
    #[error("ambiguous continuation target, connection fields: {}", .0.join(", "))]
    AmbiguousConnection(Vec<String>),

    /// No connection field under a result envelope.
    #[error("no connection field found under result")]
    NoConnection,
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
