//! Canonical parametrized query documents.
//!
//! Every shape pages with `$endCursor:String` and identifies with `$id:ID!`.
//! Caller values travel as variables; only registry names and the page size
//! are written into the document.

use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaResult};
use crate::registry::ensure_name;

/// Alias every document gives its root field.
pub const DEFAULT_ALIAS: &str = "result";

/// Page metadata requested for every connection.
pub const PAGE_INFO_SELECTION: &str = "pageInfo{hasNextPage endCursor}";

/// Layout options shared by the paged shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub alias: String,
    /// `first:` argument; omitted when `<= 0`.
    pub page_size: i32,
    /// Input type of a `$filter` variable, when the root connection is filtered.
    pub filter_type: Option<String>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            alias: DEFAULT_ALIAS.to_string(),
            page_size: 0,
            filter_type: None,
        }
    }
}

impl PageOptions {
    #[must_use]
    pub const fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_filter_type(mut self, filter_type: impl Into<String>) -> Self {
        self.filter_type = Some(filter_type.into());
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    fn connection_args(&self) -> String {
        let mut args = String::from("after:$endCursor");
        if self.page_size > 0 {
            args.push_str(&format!(", first:{}", self.page_size));
        }
        if self.filter_type.is_some() {
            args.push_str(", filter:$filter");
        }
        args
    }

    fn filter_declaration(&self) -> String {
        self.filter_type
            .as_ref()
            .map(|filter| format!(", $filter:{filter}"))
            .unwrap_or_default()
    }

    fn validate(&self) -> SchemaResult<()> {
        ensure_name(&self.alias)?;
        if let Some(filter) = &self.filter_type {
            ensure_name(filter)?;
        }
        Ok(())
    }
}

/// `pageInfo{...} edges{node{<selection>}}`.
#[must_use]
pub fn connection_envelope(node_selection: &str) -> String {
    format!("{PAGE_INFO_SELECTION} edges{{node{{{node_selection}}}}}")
}

/// Top-level list: `alias:field(after:$endCursor, first:N){<envelope>}`.
pub fn root_connection_query(
    name: &str,
    field: &str,
    selection: &str,
    options: &PageOptions,
) -> SchemaResult<String> {
    ensure_name(name)?;
    ensure_name(field)?;
    options.validate()?;
    Ok(format!(
        "query {name}($endCursor:String{filter}){{{alias}:{field}({args}){{{envelope}}}}}",
        filter = options.filter_declaration(),
        alias = options.alias,
        args = options.connection_args(),
        envelope = connection_envelope(selection),
    ))
}

/// A paged connection under one node identified by `$id`.
///
/// The page lives at `<alias>.<connection_field>` in the response.
pub fn root_node_paged_query(
    name: &str,
    field: &str,
    connection_field: &str,
    selection: &str,
    options: &PageOptions,
) -> SchemaResult<String> {
    ensure_name(name)?;
    ensure_name(field)?;
    ensure_name(connection_field)?;
    options.validate()?;
    Ok(format!(
        "query {name}($id:ID!, $endCursor:String{filter}){{{alias}:{field}(id:$id){{{connection_field}({args}){{{envelope}}}}}}}",
        filter = options.filter_declaration(),
        alias = options.alias,
        args = options.connection_args(),
        envelope = connection_envelope(selection),
    ))
}

/// Single node by `$id`, no pagination envelope.
pub fn root_node_query(name: &str, field: &str, selection: &str, alias: &str) -> SchemaResult<String> {
    ensure_name(name)?;
    ensure_name(field)?;
    ensure_name(alias)?;
    Ok(format!(
        "query {name}($id:ID!){{{alias}:{field}(id:$id){{{selection}}}}}"
    ))
}

/// Root connection whose nodes select exactly `key:<key_field> value:<value_field>`.
pub fn key_value_query(
    name: &str,
    field: &str,
    key_field: &str,
    value_field: &str,
    options: &PageOptions,
) -> SchemaResult<String> {
    ensure_name(key_field)?;
    ensure_name(value_field)?;
    root_connection_query(
        name,
        field,
        &format!("key:{key_field} value:{value_field}"),
        options,
    )
}

/// Returns `true` when `value` has the `{pageInfo, edges}` connection shape.
#[must_use]
pub fn is_connection(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("pageInfo") && map.contains_key("edges"))
}

/// Name of the single connection field inside a result object.
///
/// Fails when there is none, or more than one: the continuation target would
/// be ambiguous.
pub fn detect_connection_field(result: &Map<String, Value>) -> SchemaResult<String> {
    let mut found: Vec<String> = result
        .iter()
        .filter(|(_, value)| is_connection(value))
        .map(|(key, _)| key.clone())
        .collect();
    match found.len() {
        0 => Err(SchemaError::NoConnection),
        1 => Ok(found.remove(0)),
        _ => Err(SchemaError::AmbiguousConnection(found)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn root_connection_shape() {
        let query = root_connection_query(
            "Resources",
            "resources",
            "id name",
            &PageOptions::default().with_page_size(50),
        )
        .expect("query");
        assert_eq!(
            query,
            "query Resources($endCursor:String){result:resources(after:$endCursor, first:50)\
             {pageInfo{hasNextPage endCursor} edges{node{id name}}}}"
        );
    }

    #[test]
    fn page_size_omitted_when_not_positive() {
        let query = root_connection_query("Groups", "groups", "id", &PageOptions::default())
            .expect("query");
        assert!(!query.contains("first:"));
        let negative = root_connection_query(
            "Groups",
            "groups",
            "id",
            &PageOptions::default().with_page_size(-1),
        )
        .expect("query");
        assert_eq!(query, negative);
    }

    #[test]
    fn filter_travels_as_variable() {
        let query = root_connection_query(
            "Resources",
            "resources",
            "id",
            &PageOptions::default().with_filter_type("ResourceFilterInput"),
        )
        .expect("query");
        assert_eq!(
            query,
            "query Resources($endCursor:String, $filter:ResourceFilterInput)\
             {result:resources(after:$endCursor, filter:$filter)\
             {pageInfo{hasNextPage endCursor} edges{node{id}}}}"
        );
    }

    #[test]
    fn node_paged_shape() {
        let query = root_node_paged_query(
            "QueryGroupUsers",
            "group",
            "users",
            "id",
            &PageOptions::default(),
        )
        .expect("query");
        assert_eq!(
            query,
            "query QueryGroupUsers($id:ID!, $endCursor:String){result:group(id:$id)\
             {users(after:$endCursor){pageInfo{hasNextPage endCursor} edges{node{id}}}}}"
        );
    }

    #[test]
    fn node_shape() {
        let query = root_node_query("QueryGroup", "group", "id name", DEFAULT_ALIAS).expect("query");
        assert_eq!(query, "query QueryGroup($id:ID!){result:group(id:$id){id name}}");
    }

    #[test]
    fn key_value_shape() {
        let query = key_value_query(
            "GroupNames",
            "groups",
            "name",
            "id",
            &PageOptions::default(),
        )
        .expect("query");
        assert!(query.contains("edges{node{key:name value:id}}"));
    }

    #[test]
    fn names_are_validated() {
        let err = root_node_query("Q", "group(id:1){id}", "id", DEFAULT_ALIAS).expect_err("bad name");
        assert_eq!(err, SchemaError::InvalidName("group(id:1){id}".into()));
        let err = root_connection_query(
            "Q",
            "groups",
            "id",
            &PageOptions::default().with_alias("bad alias"),
        )
        .expect_err("bad alias");
        assert_eq!(err, SchemaError::InvalidName("bad alias".into()));
    }

    #[test]
    fn detect_single_connection() {
        let result = json!({
            "id": "g1",
            "users": {"pageInfo": {"hasNextPage": false, "endCursor": null}, "edges": []}
        });
        let map = result.as_object().expect("object");
        assert_eq!(detect_connection_field(map), Ok("users".to_string()));
    }

    #[test]
    fn detect_rejects_ambiguous_and_missing() {
        let page = json!({"pageInfo": {"hasNextPage": false}, "edges": []});
        let result = json!({"users": page.clone(), "resources": page});
        let map = result.as_object().expect("object");
        assert!(matches!(
            detect_connection_field(map),
            Err(SchemaError::AmbiguousConnection(fields)) if fields.len() == 2
        ));

        let empty = json!({"id": "g1"});
        assert_eq!(
            detect_connection_field(empty.as_object().expect("object")),
            Err(SchemaError::NoConnection)
        );
    }
}
