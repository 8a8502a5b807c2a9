//! In-memory transport for engine tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use graphwalk_graphql::{GraphqlClientError, GraphqlRequest, Transport};
use parking_lot::Mutex;
use serde_json::Value;

type Scripted = Result<Value, GraphqlClientError>;

/// Replays queued `data` payloads (or errors) in order and records every
/// request it receives.
///
/// Responses queued for an operation name are served to that operation
/// first, so concurrent walks get deterministic answers.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Scripted>>,
    by_operation: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<GraphqlRequest<Value>>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport answering with each of `data`, in order.
    #[must_use]
    pub fn with_data(data: impl IntoIterator<Item = Value>) -> Self {
        let transport = Self::new();
        for item in data {
            transport.push_data(item);
        }
        transport
    }

    /// Queue a successful `data` payload.
    pub fn push_data(&self, data: Value) {
        self.responses.lock().push_back(Ok(data));
    }

    /// Queue a `data` payload served only to `operation`.
    pub fn push_data_for(&self, operation: &str, data: Value) {
        self.by_operation
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push_back(Ok(data));
    }

    /// Queue an error.
    pub fn push_error(&self, error: GraphqlClientError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GraphqlRequest<Value>> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// `endCursor` variable of every request, in order.
    pub fn cursors(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .iter()
            .map(|request| {
                request
                    .variables
                    .get("endCursor")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect()
    }

    /// Responses not consumed yet.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
            + self.by_operation.lock().values().map(VecDeque::len).sum::<usize>()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exec(&self, request: GraphqlRequest<Value>) -> Result<Value, GraphqlClientError> {
        let operation = request.operation_label();
        self.requests.lock().push(request);
        let routed = self
            .by_operation
            .lock()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        routed
            .or_else(|| self.responses.lock().pop_front())
            .unwrap_or_else(|| {
                Err(GraphqlClientError::Protocol {
                    message: format!("no scripted response left for `{operation}`"),
                })
            })
    }
}
