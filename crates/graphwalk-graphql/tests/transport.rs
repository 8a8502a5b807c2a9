use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use graphwalk_graphql::{
    ErrorHook, GraphqlClient, GraphqlClientBuilder, GraphqlClientError, GraphqlQuery,
    GraphqlRequest, GraphqlResponse, RateLimitPolicy, RequestContext, Transport, probe_account,
    probe_api_key,
};
use graphwalk_testkit::{MockGraphqlServer, init_test_tracing};

fn request(query: &str) -> GraphqlRequest<Value> {
    GraphqlRequest::new(GraphqlQuery::new(query), json!({}))
}

fn client(server: &MockGraphqlServer) -> GraphqlClient {
    GraphqlClient::from_config(&server.config("test-key")).expect("client")
}

#[tokio::test]
async fn exec_returns_data_and_sends_headers() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push_data(json!({"result": {"id": "g1"}}));

    let data = client(&server)
        .exec(request("query QueryGroup($id:ID!){result:group(id:$id){id}}").with_variable("id", json!("g1")))
        .await
        .expect("exec");
    assert_eq!(data, json!({"result": {"id": "g1"}}));

    let received = server.received().await;
    assert_eq!(received.len(), 1);
    let sent = &received[0];
    assert_eq!(sent.headers.get("x-api-key").expect("api key"), "test-key");
    assert_eq!(sent.headers.get("content-type").expect("content type"), "application/json");
    assert_eq!(sent.headers.get("accept").expect("accept"), "application/json");
    assert!(
        sent.headers
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|agent| agent.starts_with("graphwalk/"))
    );
    let body: Value = serde_json::from_slice(&sent.body).expect("json body");
    assert_eq!(body["variables"], json!({"id": "g1"}));
}

#[tokio::test]
async fn rate_limit_waits_for_retry_after() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push(ResponseTemplate::new(429).insert_header("Retry-After", "2"));
    server.push_data(json!({"result": {"ok": true}}));

    let client = client(&server);
    let started = Instant::now();
    let data = client.exec(request("query Ping{result:ping{ok}}")).await.expect("exec");

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(server.calls(), 2);
    assert_eq!(data["result"]["ok"], json!(true));
    let metrics = client.metrics();
    assert_eq!(metrics.requests_rate_limited, 1);
    assert_eq!(metrics.requests_total, 1);
}

#[tokio::test]
async fn rate_limit_ceiling_is_enforced() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push(ResponseTemplate::new(429).insert_header("Retry-After", "0"));

    let client = GraphqlClientBuilder::new(server.endpoint())
        .with_rate_limit_policy(RateLimitPolicy {
            max_retries: Some(2),
            ..RateLimitPolicy::default()
        })
        .build()
        .expect("client");
    let err = client
        .exec(request("query Ping{result:ping{ok}}"))
        .await
        .expect_err("exhausted");

    match err {
        GraphqlClientError::RateLimitExhausted { attempts, context } => {
            assert_eq!(attempts, 3);
            assert_eq!(context.operation, "Ping");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.calls(), 3);
}

#[tokio::test]
async fn non_success_status_fails_immediately_with_context() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push(ResponseTemplate::new(500).set_body_string("upstream exploded"));

    let err = client(&server)
        .exec(request("query Resources($endCursor:String){result:resources{id}}").with_variable("endCursor", Value::Null))
        .await
        .expect_err("status error");

    match &err {
        GraphqlClientError::HttpStatus { status, body, context } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "upstream exploded");
            assert_eq!(context.operation, "Resources");
            assert_eq!(context.variables, json!({"endCursor": null}));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.context().is_some());
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn partial_errors_drop_null_edges() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push_body(json!({
        "data": {"result": {
            "pageInfo": {"hasNextPage": false, "endCursor": null},
            "edges": [{"node": {"id": "r1"}}, null, {"node": {"id": "r2"}}]
        }},
        "errors": [{"message": "not authorized for one resource", "path": ["result", "edges", 1]}]
    }));

    let data = client(&server)
        .exec(request("query Resources{result:resources{id}}"))
        .await
        .expect("partial data");
    assert_eq!(
        data["result"]["edges"],
        json!([{"node": {"id": "r1"}}, {"node": {"id": "r2"}}])
    );
}

#[tokio::test]
async fn errors_without_edges_are_raised() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push_body(json!({
        "data": {"result": null},
        "errors": [{"message": "group not found"}]
    }));

    let err = client(&server)
        .exec(request("query QueryGroup{result:group{id}}"))
        .await
        .expect_err("graphql errors");
    match err {
        GraphqlClientError::GraphqlErrors { errors, context } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].message, "group not found");
            assert!(context.query.contains("result:group"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn error_hook_takes_over() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push_body(json!({"data": null, "errors": [{"message": "ignored"}]}));

    let hook: ErrorHook = Arc::new(|response: GraphqlResponse<Value>, context: &RequestContext| {
        Ok(json!({"handled": response.errors.len(), "operation": context.operation}))
    });
    let client = GraphqlClientBuilder::new(server.endpoint())
        .with_error_hook(hook)
        .build()
        .expect("client");
    let data = client
        .exec(request("query Users{result:users{id}}"))
        .await
        .expect("hook result");
    assert_eq!(data, json!({"handled": 1, "operation": "Users"}));
}

#[tokio::test]
async fn metrics_count_per_operation() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push_data(json!({"result": {}}));

    let client = client(&server);
    for query in ["query Groups{result:groups{id}}", "query Groups{result:groups{id}}", "query Users{result:users{id}}"] {
        client.exec(request(query)).await.expect("exec");
    }

    let metrics = client.metrics();
    assert_eq!(metrics.requests_total, 3);
    assert_eq!(metrics.requests_success, 3);
    assert_eq!(metrics.per_operation.get("Groups"), Some(&2));
    assert_eq!(metrics.per_operation.get("Users"), Some(&1));
}

#[tokio::test]
async fn missing_data_is_a_protocol_error() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    server.push_body(json!({}));

    let err = client(&server)
        .exec(request("query Users{result:users{id}}"))
        .await
        .expect_err("protocol error");
    assert!(matches!(err, GraphqlClientError::Protocol { .. }));
}

#[tokio::test]
async fn probes_classify_by_status() {
    init_test_tracing();
    let server = MockGraphqlServer::start().await;
    let config = server.config("good-key");

    Mock::given(method("GET"))
        .and(path("/api/graphql/"))
        .and(header("x-api-key", "good-key"))
        .respond_with(ResponseTemplate::new(405))
        .with_priority(1)
        .mount(server.inner())
        .await;
    Mock::given(method("GET"))
        .and(path("/api/graphql/"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(2)
        .mount(server.inner())
        .await;

    assert!(probe_account(&config).await.expect("account probe"));
    assert!(probe_api_key(&config).await.expect("key probe"));
    assert!(!probe_api_key(&server.config("bad-key")).await.expect("key probe"));

    let mut missing = server.config("good-key");
    missing.endpoint_override = Some(format!("{}/nowhere/", server.inner().uri()));
    assert!(!probe_account(&missing).await.expect("account probe"));
}
