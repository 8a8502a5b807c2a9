//! Fetch facade: select, synthesize, page, resolve, normalize.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use graphwalk_schema::{
    DEFAULT_ALIAS, FieldOptions, FieldSelector, FieldSet, PageOptions, Record, Registry,
    TransformOptions, TypeInfo, key_value_query, root_connection_query, root_node_query,
};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::client::{GraphqlClient, Transport};
use crate::config::ClientConfig;
use crate::error::{EngineError, EngineResult, GraphqlClientError, RequestContext};
use crate::operation::{GraphqlQuery, GraphqlRequest};
use crate::pagination::{Paginator, ResultPath};
use crate::resolver::{ConnectionJoin, ConnectionResolver, upper_first};

/// Per-call fetch options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Field categories selected on the root type.
    pub field_set: FieldSet,
    /// Extra fields and per-field overrides.
    pub field_options: FieldOptions,
    /// Normalization applied to every record.
    pub transform: TransformOptions,
    /// Shaping of resolved connection fields, by field name.
    pub connections: BTreeMap<String, ConnectionJoin>,
    /// Value of the `$filter` variable on root connection queries.
    pub filter: Option<Value>,
    /// Page embedded connections to completion.
    pub resolve_connections: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            field_set: FieldSet::default(),
            field_options: FieldOptions::default(),
            transform: TransformOptions::default(),
            connections: BTreeMap::new(),
            filter: None,
            resolve_connections: true,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn with_field_set(mut self, field_set: FieldSet) -> Self {
        self.field_set = field_set;
        self
    }

    #[must_use]
    pub fn with_field_options(mut self, field_options: FieldOptions) -> Self {
        self.field_options = field_options;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: TransformOptions) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_connection(mut self, field: impl Into<String>, join: ConnectionJoin) -> Self {
        self.connections.insert(field.into(), join);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub const fn without_connection_resolution(mut self) -> Self {
        self.resolve_connections = false;
        self
    }
}

/// Schema-driven reader and writer over one [`Transport`].
///
/// Records returned by every fetch are already resolved and normalized.
pub struct GraphEngine<T = GraphqlClient> {
    transport: T,
    registry: Arc<Registry>,
    page_size: i32,
    max_pages: Option<usize>,
}

impl GraphEngine<GraphqlClient> {
    /// Engine over an HTTP client built from `config`.
    pub fn from_config(config: &ClientConfig, registry: Arc<Registry>) -> EngineResult<Self> {
        let client = GraphqlClient::from_config(config)?;
        Ok(Self::new(client, registry)
            .with_page_size(config.page_size)
            .with_max_pages(config.max_pages))
    }
}

impl<T: Transport> GraphEngine<T> {
    /// Engine with server-default page size and no page ceiling.
    #[must_use]
    pub const fn new(transport: T, registry: Arc<Registry>) -> Self {
        Self {
            transport,
            registry,
            page_size: 0,
            max_pages: None,
        }
    }

    /// `first:` argument of every paged query; `<= 0` omits it.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Ceiling on pages per walk.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn paginator(&self) -> Paginator<'_, T> {
        Paginator::new(&self.transport, self.max_pages)
    }

    fn page_options(&self) -> PageOptions {
        PageOptions::default().with_page_size(self.page_size)
    }

    /// Every record of `type_name`.
    #[instrument(skip(self, options))]
    pub async fn fetch_all(
        &self,
        type_name: &str,
        options: &FetchOptions,
    ) -> EngineResult<Vec<Record>> {
        let info = self.registry.get(type_name)?;
        let queries = info.require_queries()?;
        let selection = FieldSelector::new(&self.registry).select(
            type_name,
            options.field_set,
            &options.field_options,
        )?;

        let mut page = self.page_options();
        let mut variables = json!({});
        if let Some(filter) = &options.filter {
            let filter_type = info.filter_input().ok_or_else(|| {
                EngineError::Configuration(format!("`{type_name}` declares no filter input"))
            })?;
            page = page.with_filter_type(filter_type);
            variables["filter"] = filter.clone();
        }
        let query = root_connection_query(
            &list_query_name(&queries.connection_field),
            &queries.connection_field,
            &selection,
            &page,
        )?;

        let nodes = self
            .paginator()
            .fetch_flat(&query, &variables, &ResultPath::root())
            .await?;
        let parent = request_context(&query, variables);
        let mut records = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Value::Object(record) = node else {
                warn!(type_name, "skipping non-object node");
                continue;
            };
            records.push(self.finish(info, record, options, &parent).await?);
        }
        info!(type_name, records = records.len(), "fetched all");
        Ok(records)
    }

    /// One record of `type_name` by id; `None` when the server returns null.
    #[instrument(skip(self, options))]
    pub async fn fetch_by_id(
        &self,
        type_name: &str,
        id: &str,
        options: &FetchOptions,
    ) -> EngineResult<Option<Record>> {
        let info = self.registry.get(type_name)?;
        let queries = info.require_queries()?;
        let selection = FieldSelector::new(&self.registry).select(
            type_name,
            options.field_set,
            &options.field_options,
        )?;
        let query = root_node_query(
            &queries.query_name,
            &queries.node_field,
            &selection,
            DEFAULT_ALIAS,
        )?;

        let variables = json!({ "id": id });
        match self.paginator().fetch_single(&query, &variables).await? {
            Some(Value::Object(record)) => {
                let parent = request_context(&query, variables);
                Ok(Some(self.finish(info, record, options, &parent).await?))
            }
            Some(other) => Err(GraphqlClientError::Protocol {
                message: format!("`{type_name}` {id} is not an object: {other}"),
            }
            .into()),
            None => Ok(None),
        }
    }

    /// `(key, value)` pairs over every `type_name` node, in server order.
    ///
    /// String keys are taken as-is, other keys are rendered as JSON.
    #[instrument(skip(self))]
    pub async fn fetch_key_value(
        &self,
        type_name: &str,
        key_field: &str,
        value_field: &str,
    ) -> EngineResult<Vec<(String, Value)>> {
        let info = self.registry.get(type_name)?;
        info.require_field(key_field)?;
        info.require_field(value_field)?;
        let queries = info.require_queries()?;
        let query = key_value_query(
            &format!("{}Map", list_query_name(&queries.connection_field)),
            &queries.connection_field,
            key_field,
            value_field,
            &self.page_options(),
        )?;

        let nodes = self
            .paginator()
            .fetch_flat(&query, &json!({}), &ResultPath::root())
            .await?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| match node {
                Value::Object(mut map) => {
                    let key = match map.remove("key")? {
                        Value::String(key) => key,
                        other => other.to_string(),
                    };
                    Some((key, map.remove("value").unwrap_or(Value::Null)))
                }
                _ => None,
            })
            .collect())
    }

    /// [`fetch_all`](Self::fetch_all) for several types concurrently.
    ///
    /// Each walk stays sequential; only the walks overlap.
    pub async fn fetch_all_many(
        &self,
        type_names: &[&str],
        options: &FetchOptions,
    ) -> EngineResult<BTreeMap<String, Vec<Record>>> {
        let walks = type_names.iter().map(|type_name| async move {
            let records = self.fetch_all(type_name, options).await?;
            Ok::<_, EngineError>(((*type_name).to_string(), records))
        });
        Ok(try_join_all(walks).await?.into_iter().collect())
    }

    /// Run a mutation and return its `result` object.
    ///
    /// A non-null `result.error` is raised as
    /// [`EngineError::DomainValidation`] with the message verbatim.
    #[instrument(skip(self, document, variables))]
    pub async fn mutate(
        &self,
        operation_name: &str,
        document: &str,
        variables: Value,
    ) -> EngineResult<Value> {
        let request = GraphqlRequest::new(GraphqlQuery::new(document), variables)
            .with_operation_name(operation_name);
        let context = request.context();
        let mut data = self.transport.exec(request).await?;
        let result = data
            .get_mut(DEFAULT_ALIAS)
            .map(Value::take)
            .filter(|result| !result.is_null())
            .ok_or_else(|| GraphqlClientError::Protocol {
                message: format!("mutation `{operation_name}` returned no `{DEFAULT_ALIAS}`"),
            })?;
        let message = match result.get("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(message)) => Some(message.clone()),
            Some(other) => Some(other.to_string()),
        };
        match message {
            None => Ok(result),
            Some(message) => Err(EngineError::DomainValidation {
                message,
                context: Box::new(context),
            }),
        }
    }

    async fn finish(
        &self,
        info: &TypeInfo,
        mut record: Record,
        options: &FetchOptions,
        parent: &RequestContext,
    ) -> EngineResult<Record> {
        if options.resolve_connections && !info.connection_fields().is_empty() {
            ConnectionResolver::new(&self.registry, self.paginator(), self.page_size)
                .resolve(
                    info.name(),
                    &mut record,
                    &options.field_options,
                    &options.connections,
                    parent,
                )
                .await?;
        }
        let transform = self.registry.record_transform(info.name())?;
        Ok(transform.apply(record, &options.transform))
    }
}

fn request_context(query: &str, variables: Value) -> RequestContext {
    GraphqlRequest::new(GraphqlQuery::new(query), variables).context()
}

fn list_query_name(connection_field: &str) -> String {
    format!("Query{}", upper_first(connection_field))
}
