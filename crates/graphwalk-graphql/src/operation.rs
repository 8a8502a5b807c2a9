//! Request and response payloads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{GraphqlError, RequestContext};

/// GraphQL query wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphqlQuery {
    query: String,
}

impl GraphqlQuery {
    /// Create a new query from a string.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    /// Return the query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.query
    }

    /// Operation name declared by the document, e.g. `Resources` for
    /// `query Resources($endCursor:String){...}`.
    #[must_use]
    pub fn declared_name(&self) -> Option<&str> {
        let rest = self
            .query
            .trim_start()
            .strip_prefix("query")
            .or_else(|| self.query.trim_start().strip_prefix("mutation"))?;
        let rest = rest.trim_start();
        let end = rest
            .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
            .unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    }
}

/// GraphQL request payload: `{query, variables, operationName?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest<V = Value> {
    /// Query text.
    pub query: GraphqlQuery,
    /// Variables.
    pub variables: V,
    /// Optional operation name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl<V> GraphqlRequest<V> {
    /// Create a new request.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(query: GraphqlQuery, variables: V) -> Self {
        Self {
            query,
            variables,
            operation_name: None,
        }
    }

    /// Attach an operation name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Name used for counters and error context.
    #[must_use]
    pub fn operation_label(&self) -> String {
        self.operation_name
            .as_deref()
            .or_else(|| self.query.declared_name())
            .unwrap_or("anonymous")
            .to_string()
    }
}

impl GraphqlRequest<Value> {
    /// Set one variable, turning `variables` into an object if needed.
    #[must_use]
    pub fn with_variable(mut self, name: &str, value: Value) -> Self {
        if !self.variables.is_object() {
            self.variables = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.variables {
            map.insert(name.to_string(), value);
        }
        self
    }

    /// Snapshot for error reporting.
    #[must_use]
    pub fn context(&self) -> RequestContext {
        RequestContext {
            operation: self.operation_label(),
            query: self.query.as_str().to_string(),
            variables: self.variables.clone(),
        }
    }
}

/// GraphQL response container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphqlResponse<T = Value> {
    /// Response data.
    #[serde(default)]
    pub data: Option<T>,
    /// GraphQL errors; an explicit `null` reads as none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<GraphqlError>,
    /// Extensions payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl<T> GraphqlResponse<T> {
    /// Returns `true` if no GraphQL errors were returned.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<GraphqlError>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<GraphqlError>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let request = GraphqlRequest::new(GraphqlQuery::new("query Q{result:x{id}}"), json!({}))
            .with_operation_name("Q");
        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            body,
            json!({"query": "query Q{result:x{id}}", "variables": {}, "operationName": "Q"})
        );
    }

    #[test]
    fn declared_name_is_parsed() {
        let query = GraphqlQuery::new("query Resources($endCursor:String){result:resources{id}}");
        assert_eq!(query.declared_name(), Some("Resources"));
        let mutation = GraphqlQuery::new("mutation DeleteGroup($id:ID!){result:groupDelete(id:$id){ok}}");
        assert_eq!(mutation.declared_name(), Some("DeleteGroup"));
        assert_eq!(GraphqlQuery::new("{ viewer { id } }").declared_name(), None);
    }

    #[test]
    fn variables_are_merged() {
        let request = GraphqlRequest::new(GraphqlQuery::new("query Q{x}"), Value::Null)
            .with_variable("id", json!("g1"))
            .with_variable("endCursor", Value::Null);
        assert_eq!(request.variables, json!({"id": "g1", "endCursor": null}));
        assert_eq!(request.operation_label(), "Q");
    }

    #[test]
    fn null_errors_read_as_none() {
        let response: GraphqlResponse<Value> =
            serde_json::from_value(json!({"data": {"result": {"id": "g1"}}, "errors": null}))
                .expect("null errors");
        assert!(response.is_ok());
        assert_eq!(response.data, Some(json!({"result": {"id": "g1"}})));

        let failed: GraphqlResponse<Value> =
            serde_json::from_value(json!({"data": null, "errors": [{"message": "denied"}]}))
                .expect("errors");
        assert!(!failed.is_ok());
        assert_eq!(failed.errors[0].message, "denied");
        assert_eq!(failed.data, None);
    }
}
