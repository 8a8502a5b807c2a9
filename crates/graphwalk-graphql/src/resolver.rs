//! Continuation of connections embedded in a fetched record.
//!
//! A parent query only carries the first page of each connection field. The
//! resolver pages the rest through the parent's node query and replaces the
//! `{pageInfo, edges}` value with the flat list of nodes.

use std::collections::BTreeMap;

use graphwalk_schema::{
    FieldOptions, FieldSelector, ID_FIELD, PageOptions, Record, Registry, root_node_paged_query,
};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::client::Transport;
use crate::error::{EngineError, EngineResult, RequestContext};
use crate::pagination::{Connection, CursorState, Paginator, ResultPath};

/// How each node of a resolved connection is mapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeMap {
    /// Keep the node object.
    #[default]
    Identity,
    /// Replace the node with the value at a key path, `null` when absent.
    Path(Vec<String>),
}

impl NodeMap {
    /// Map to one scalar key of the node.
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self::Path(vec![key.into()])
    }

    fn apply(&self, node: Value) -> Value {
        match self {
            Self::Identity => node,
            Self::Path(path) => {
                let mut current = node;
                for key in path {
                    current = match current {
                        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Null),
                        _ => Value::Null,
                    };
                }
                current
            }
        }
    }
}

/// Per-field shaping of a resolved connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionJoin {
    pub node_map: NodeMap,
    /// When set, the mapped list is reduced to one joined string.
    pub separator: Option<String>,
}

impl ConnectionJoin {
    /// Map nodes through `node_map`, keeping a list.
    #[must_use]
    pub const fn mapped(node_map: NodeMap) -> Self {
        Self {
            node_map,
            separator: None,
        }
    }

    /// Map nodes through `node_map` and join them with `separator`.
    #[must_use]
    pub fn joined(node_map: NodeMap, separator: impl Into<String>) -> Self {
        Self {
            node_map,
            separator: Some(separator.into()),
        }
    }

    fn finish(&self, nodes: Vec<Value>) -> Value {
        let mapped = nodes.into_iter().map(|node| self.node_map.apply(node));
        match &self.separator {
            None => Value::Array(mapped.collect()),
            Some(separator) => Value::String(
                mapped
                    .filter(|value| !value.is_null())
                    .map(|value| match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(separator),
            ),
        }
    }
}

/// Finishes paging every connection field of a record.
pub struct ConnectionResolver<'a, T: ?Sized> {
    registry: &'a Registry,
    paginator: Paginator<'a, T>,
    page_size: i32,
}

impl<'a, T: Transport + ?Sized> ConnectionResolver<'a, T> {
    /// Create a resolver paging with `paginator`.
    #[must_use]
    pub const fn new(registry: &'a Registry, paginator: Paginator<'a, T>, page_size: i32) -> Self {
        Self {
            registry,
            paginator,
            page_size,
        }
    }

    /// Replace each non-null connection field of `record` with its full node
    /// list, shaped by `joins` when an entry exists for the field.
    ///
    /// `options` must be the options the parent was selected with: the
    /// continuation pages select the same node fields as the first page.
    /// `parent` is the request that returned `record`, reported when an
    /// embedded connection is malformed.
    #[instrument(skip(self, record, options, joins, parent))]
    pub async fn resolve(
        &self,
        type_name: &str,
        record: &mut Record,
        options: &FieldOptions,
        joins: &BTreeMap<String, ConnectionJoin>,
        parent: &RequestContext,
    ) -> EngineResult<()> {
        let info = self.registry.get(type_name)?;
        for field in info.connection_fields() {
            let Some(value) = record.get(field).filter(|value| !value.is_null()) else {
                continue;
            };
            let first = Connection::from_value(value.clone(), field, parent)?;
            let mut page = first.into_page();

            // Resuming from a null cursor would refetch the embedded page.
            let mut state = CursorState::initial();
            state.advance(page.page_info.clone());
            if state.has_next_page {
                let Some(queries) = info.queries() else {
                    return Err(EngineError::Configuration(format!(
                        "`{type_name}.{field}` has more pages but `{type_name}` has no node query"
                    )));
                };
                let Some(id) = record.get(ID_FIELD).and_then(Value::as_str) else {
                    return Err(EngineError::Configuration(format!(
                        "cannot continue `{type_name}.{field}` on a record without `{ID_FIELD}`"
                    )));
                };
                let target = info
                    .require_field(field)?
                    .kind
                    .target()
                    .unwrap_or_default()
                    .to_string();
                let selection = FieldSelector::new(self.registry)
                    .connection_node_selection(&target, options.connection_nodes(field))?;
                let query = root_node_paged_query(
                    &format!("{}{}", queries.query_name, upper_first(field)),
                    &queries.node_field,
                    field,
                    &selection,
                    &PageOptions::default().with_page_size(self.page_size),
                )?;
                let rest = self
                    .paginator
                    .fetch_flat_from(
                        state,
                        &query,
                        &json!({ "id": id }),
                        &ResultPath::nested(field.as_str()),
                    )
                    .await?;
                debug!(field = %field, embedded = page.items.len(), continued = rest.len(), "connection continued");
                page.items.extend(rest);
            }

            let resolved = match joins.get(field) {
                Some(join) => join.finish(page.items),
                None => Value::Array(page.items),
            };
            record.insert(field.clone(), resolved);
        }
        Ok(())
    }
}

pub(crate) fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
