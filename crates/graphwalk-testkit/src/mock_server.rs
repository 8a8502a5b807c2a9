//! wiremock endpoint for HTTP-level transport tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use graphwalk_graphql::ClientConfig;
use parking_lot::Mutex;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// GraphQL path served by [`MockGraphqlServer`].
pub const GRAPHQL_PATH: &str = "/api/graphql/";

/// Answers with queued templates in order; the last one repeats.
#[derive(Clone, Default)]
pub struct QueuedResponder {
    queue: Arc<Mutex<VecDeque<ResponseTemplate>>>,
    last: Arc<Mutex<Option<ResponseTemplate>>>,
    calls: Arc<AtomicUsize>,
}

impl QueuedResponder {
    pub fn push(&self, template: ResponseTemplate) {
        self.queue.lock().push_back(template);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Respond for QueuedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().pop_front();
        match next {
            Some(template) => {
                *self.last.lock() = Some(template.clone());
                template
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| ResponseTemplate::new(500)),
        }
    }
}

/// A mock GraphQL endpoint.
pub struct MockGraphqlServer {
    server: MockServer,
    responder: QueuedResponder,
}

impl MockGraphqlServer {
    /// Start a server answering `POST /api/graphql/` from the queue.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let responder = QueuedResponder::default();
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .respond_with(responder.clone())
            .mount(&server)
            .await;
        Self { server, responder }
    }

    /// Endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}{GRAPHQL_PATH}", self.server.uri())
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn config(&self, api_key: &str) -> ClientConfig {
        let mut config = ClientConfig::new("acme", api_key);
        config.endpoint_override = Some(self.endpoint());
        config
    }

    /// Queue a 200 response with `{"data": data}`.
    pub fn push_data(&self, data: Value) {
        self.push(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data })));
    }

    /// Queue a 200 response with the full body.
    pub fn push_body(&self, body: Value) {
        self.push(ResponseTemplate::new(200).set_body_json(body));
    }

    pub fn push(&self, template: ResponseTemplate) {
        self.responder.push(template);
    }

    /// POSTs received.
    pub fn calls(&self) -> usize {
        self.responder.calls()
    }

    /// Requests received, all methods and paths.
    pub async fn received(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Underlying wiremock server for extra mocks.
    #[must_use]
    pub const fn inner(&self) -> &MockServer {
        &self.server
    }
}
