//! Cursor pagination over connection-shaped results.
//!
//! Every multi-page fetch funnels through [`paginate_cursor`]: one request
//! per page, strictly in cursor order, items appended in server edge order.

use std::future::Future;

use graphwalk_schema::{DEFAULT_ALIAS, SchemaError, detect_connection_field};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::Transport;
use crate::error::{GraphqlClientError, RequestContext};
use crate::operation::{GraphqlQuery, GraphqlRequest};

/// Cursor-based page info, as returned under `pageInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Whether there is another page.
    #[serde(default)]
    pub has_next_page: bool,
    /// Cursor for the next page.
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// Position of a walk between two requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl CursorState {
    /// `{endCursor: null, hasNextPage: true}`.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            end_cursor: None,
            has_next_page: true,
        }
    }

    /// State to resume from an already-known cursor.
    #[must_use]
    pub const fn resume(end_cursor: Option<String>) -> Self {
        Self {
            end_cursor,
            has_next_page: true,
        }
    }

    /// Adopt the page info of the page just received.
    ///
    /// A page claiming more results without a cursor cannot be continued and
    /// ends the walk.
    pub fn advance(&mut self, page_info: PageInfo) {
        if page_info.has_next_page && page_info.end_cursor.is_none() {
            warn!("hasNextPage without endCursor, stopping walk");
            self.has_next_page = false;
        } else {
            self.has_next_page = page_info.has_next_page;
        }
        self.end_cursor = page_info.end_cursor;
    }
}

/// One `edges` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub node: Option<Value>,
}

/// A `{pageInfo, edges}` connection payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub page_info: PageInfo,
    #[serde(default)]
    pub edges: Vec<Option<Edge>>,
}

impl Connection {
    /// Parse a connection value found at `path` in the response to `context`.
    pub fn from_value(
        value: Value,
        path: &str,
        context: &RequestContext,
    ) -> Result<Self, PaginationError> {
        serde_json::from_value(value).map_err(|err| PaginationError::MalformedPage {
            path: path.to_string(),
            reason: err.to_string(),
            context: Box::new(context.clone()),
        })
    }

    /// Non-null nodes in edge order, with the page info.
    #[must_use]
    pub fn into_page(self) -> CursorPage<Value> {
        let items = self
            .edges
            .into_iter()
            .flatten()
            .filter_map(|edge| edge.node)
            .filter(|node| !node.is_null())
            .collect();
        CursorPage {
            items,
            page_info: self.page_info,
        }
    }
}

/// Cursor-based page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPage<T> {
    /// Items in the page.
    pub items: Vec<T>,
    /// Pagination info.
    pub page_info: PageInfo,
}

/// Where the connection sits inside the response `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPath(Vec<String>);

impl ResultPath {
    /// `data.result`.
    #[must_use]
    pub fn root() -> Self {
        Self(vec![DEFAULT_ALIAS.to_string()])
    }

    /// `data.result.<connection_field>`.
    #[must_use]
    pub fn nested(connection_field: impl Into<String>) -> Self {
        Self(vec![DEFAULT_ALIAS.to_string(), connection_field.into()])
    }

    /// Arbitrary key path.
    #[must_use]
    pub const fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Move the value at this path out of `data`.
    #[must_use]
    pub fn take(&self, mut data: Value) -> Option<Value> {
        for segment in &self.0 {
            data = match data {
                Value::Object(mut map) => map.remove(segment)?,
                _ => return None,
            };
        }
        (!data.is_null()).then_some(data)
    }

    fn connection(
        &self,
        data: Value,
        context: &RequestContext,
    ) -> Result<Connection, PaginationError> {
        let value = self
            .take(data)
            .ok_or_else(|| PaginationError::MissingConnection {
                path: self.to_string(),
                context: Box::new(context.clone()),
            })?;
        Connection::from_value(value, &self.to_string(), context)
    }
}

impl std::fmt::Display for ResultPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Pagination error type.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// Underlying client error.
    #[error("pagination fetch failed: {0}")]
    Client(#[from] GraphqlClientError),

    /// Continuation target could not be determined.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The walk hit the configured page ceiling.
    #[error("pagination limit exceeded after {pages} pages")]
    PageLimitExceeded {
        /// Pages fetched before giving up.
        pages: usize,
    },

    /// No connection at the expected path.
    #[error("no connection at `{path}` for `{}`", .context.operation)]
    MissingConnection {
        /// Dotted result path.
        path: String,
        /// Request whose response lacked it.
        context: Box<RequestContext>,
    },

    /// The value at the path is not a connection.
    #[error("malformed connection at `{path}` for `{}`: {reason}", .context.operation)]
    MalformedPage {
        /// Dotted result path.
        path: String,
        /// Deserializer message.
        reason: String,
        /// Request whose response carried it.
        context: Box<RequestContext>,
    },
}

impl PaginationError {
    /// Query and variables of the request the walk failed on, when known.
    #[must_use]
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            Self::Client(err) => err.context(),
            Self::MissingConnection { context, .. } | Self::MalformedPage { context, .. } => {
                Some(context)
            }
            Self::Schema(_) | Self::PageLimitExceeded { .. } => None,
        }
    }
}

/// Walk a cursor-based API from `start` until `hasNextPage` is false.
///
/// `fetch_page` receives the cursor to request; exactly one call is made per
/// page and the next call only starts after the previous page resolved.
pub async fn paginate_cursor<T, F, Fut>(
    start: CursorState,
    max_pages: Option<usize>,
    mut fetch_page: F,
) -> Result<Vec<T>, PaginationError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<CursorPage<T>, PaginationError>>,
{
    let mut state = start;
    let mut out = Vec::new();
    let mut pages = 0;
    while state.has_next_page {
        if max_pages.is_some_and(|max| pages >= max) {
            return Err(PaginationError::PageLimitExceeded { pages });
        }
        let page = fetch_page(state.end_cursor.clone()).await?;
        pages += 1;
        debug!(page = pages, items = page.items.len(), "page received");
        out.extend(page.items);
        state.advance(page.page_info);
    }
    Ok(out)
}

/// Drives [`paginate_cursor`] against a [`Transport`].
///
/// Every request binds `$endCursor`; other variables are passed through
/// untouched.
#[derive(Debug)]
pub struct Paginator<'a, T: ?Sized> {
    transport: &'a T,
    max_pages: Option<usize>,
}

impl<T: ?Sized> Clone for Paginator<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Paginator<'_, T> {}

impl<'a, T: Transport + ?Sized> Paginator<'a, T> {
    /// Create a paginator.
    #[must_use]
    pub const fn new(transport: &'a T, max_pages: Option<usize>) -> Self {
        Self {
            transport,
            max_pages,
        }
    }

    /// All nodes of the connection at `path`, from the first page.
    pub async fn fetch_flat(
        &self,
        query: &str,
        variables: &Value,
        path: &ResultPath,
    ) -> Result<Vec<Value>, PaginationError> {
        self.fetch_flat_from(CursorState::initial(), query, variables, path)
            .await
    }

    /// All remaining nodes of the connection at `path`, starting at `start`.
    pub async fn fetch_flat_from(
        &self,
        start: CursorState,
        query: &str,
        variables: &Value,
        path: &ResultPath,
    ) -> Result<Vec<Value>, PaginationError> {
        let transport = self.transport;
        paginate_cursor(start, self.max_pages, |cursor| {
            let request = page_request(query, variables, cursor);
            let context = request.context();
            async move {
                let data = transport.exec(request).await?;
                Ok(path.connection(data, &context)?.into_page())
            }
        })
        .await
    }

    /// The single `result` object of a non-paged query, `None` when null.
    ///
    /// The root is never paged: the walk makes exactly one request.
    pub async fn fetch_single(
        &self,
        query: &str,
        variables: &Value,
    ) -> Result<Option<Value>, PaginationError> {
        let transport = self.transport;
        let path = ResultPath::root();
        let mut records = paginate_cursor(CursorState::initial(), self.max_pages, |_| {
            let request = GraphqlRequest::new(GraphqlQuery::new(query), variables.clone());
            let path = &path;
            async move {
                let data = transport.exec(request).await?;
                Ok(CursorPage {
                    items: path.take(data).into_iter().collect(),
                    page_info: PageInfo::default(),
                })
            }
        })
        .await?;
        Ok(records.pop())
    }

    /// Like [`fetch_flat`](Self::fetch_flat) for a query whose `result` holds
    /// exactly one connection field, found by shape.
    pub async fn fetch_auto(
        &self,
        query: &str,
        variables: &Value,
    ) -> Result<Vec<Value>, PaginationError> {
        let transport = self.transport;
        paginate_cursor(CursorState::initial(), self.max_pages, |cursor| {
            let request = page_request(query, variables, cursor);
            let context = request.context();
            async move {
                let data = transport.exec(request).await?;
                let root = ResultPath::root();
                let Some(Value::Object(mut result)) = root.take(data) else {
                    return Err(PaginationError::MissingConnection {
                        path: root.to_string(),
                        context: Box::new(context),
                    });
                };
                let field = detect_connection_field(&result)?;
                let value = result.remove(&field).unwrap_or(Value::Null);
                let page = Connection::from_value(value, &format!("{root}.{field}"), &context)?;
                Ok(page.into_page())
            }
        })
        .await
    }
}

fn page_request(query: &str, variables: &Value, cursor: Option<String>) -> GraphqlRequest<Value> {
    GraphqlRequest::new(GraphqlQuery::new(query), variables.clone())
        .with_variable("endCursor", cursor.map_or(Value::Null, Value::String))
}
