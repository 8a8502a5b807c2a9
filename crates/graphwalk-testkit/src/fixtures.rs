//! Registry and payload fixtures.

use std::sync::Arc;

use graphwalk_schema::{EnumLabels, FieldDescriptor, Registry, TypeDescriptor, catalog};
use serde_json::{Value, json};

/// The preprocessed built-in catalog.
pub fn catalog_registry() -> Arc<Registry> {
    Arc::new(catalog::registry().expect("catalog preprocesses"))
}

/// A small schema: `Group` nodes with a `users` connection and an owner
/// node, `User` nodes labelled by email.
pub fn groups_registry() -> Arc<Registry> {
    Arc::new(
        Registry::build([
            TypeDescriptor::node("Group")
                .field(FieldDescriptor::string("name").label())
                .field(FieldDescriptor::enumeration(
                    "type",
                    EnumLabels::new([("MANUAL", "Manual"), ("SYSTEM", "System")]),
                ))
                .field(FieldDescriptor::datetime("createdAt"))
                .field(FieldDescriptor::node("owner", "User"))
                .field(FieldDescriptor::connection("users", "User")),
            TypeDescriptor::node("User")
                .field(FieldDescriptor::string("email").label())
                .field(FieldDescriptor::string("firstName")),
        ])
        .expect("group schema preprocesses"),
    )
}

/// `{"result": {pageInfo, edges}}` with one edge per node.
pub fn page(nodes: impl IntoIterator<Item = Value>, has_next_page: bool, cursor: Option<&str>) -> Value {
    json!({ "result": connection(nodes, has_next_page, cursor) })
}

/// `{"result": {<field>: {pageInfo, edges}}}`, a continuation page.
pub fn nested_page(
    field: &str,
    nodes: impl IntoIterator<Item = Value>,
    has_next_page: bool,
    cursor: Option<&str>,
) -> Value {
    json!({ "result": { (field): connection(nodes, has_next_page, cursor) } })
}

/// A bare `{pageInfo, edges}` connection.
pub fn connection(
    nodes: impl IntoIterator<Item = Value>,
    has_next_page: bool,
    cursor: Option<&str>,
) -> Value {
    let edges: Vec<Value> = nodes.into_iter().map(|node| json!({ "node": node })).collect();
    json!({
        "pageInfo": {"hasNextPage": has_next_page, "endCursor": cursor},
        "edges": edges,
    })
}
