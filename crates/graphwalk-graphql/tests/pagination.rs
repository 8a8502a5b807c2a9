use serde_json::{Value, json};

use graphwalk_graphql::{
    CursorPage, CursorState, GraphqlClientError, PageInfo, PaginationError, Paginator, ResultPath,
    paginate_cursor,
};
use graphwalk_schema::SchemaError;
use graphwalk_testkit::fixtures::{connection, nested_page, page};
use graphwalk_testkit::{ScriptedTransport, init_test_tracing};

const QUERY: &str = "query QueryResources($endCursor:String){result:resources(after:$endCursor){pageInfo{hasNextPage endCursor} edges{node{id}}}}";

fn node(id: &str) -> Value {
    json!({ "id": id })
}

#[tokio::test]
async fn paginate_cursor_walks_until_last_page() {
    let mut seen = Vec::new();
    let items = paginate_cursor(CursorState::initial(), None, |cursor| {
        seen.push(cursor.clone());
        let page = match cursor.as_deref() {
            None => CursorPage {
                items: vec![1, 2],
                page_info: PageInfo {
                    has_next_page: true,
                    end_cursor: Some("c1".into()),
                },
            },
            Some("c1") => CursorPage {
                items: vec![3],
                page_info: PageInfo::default(),
            },
            Some(other) => panic!("unexpected cursor {other}"),
        };
        async move { Ok::<_, PaginationError>(page) }
    })
    .await
    .expect("pages");

    assert_eq!(items, vec![1, 2, 3]);
    assert_eq!(seen, vec![None, Some("c1".to_string())]);
}

#[tokio::test]
async fn n_pages_take_exactly_n_requests() {
    const PAGES: usize = 5;
    init_test_tracing();
    let transport = ScriptedTransport::new();
    for index in 0..PAGES {
        let last = index + 1 == PAGES;
        let cursor = format!("c{index}");
        transport.push_data(page(
            [node(&format!("r{index}a")), node(&format!("r{index}b"))],
            !last,
            (!last).then_some(cursor.as_str()),
        ));
    }

    let nodes = Paginator::new(&transport, None)
        .fetch_flat(QUERY, &json!({}), &ResultPath::root())
        .await
        .expect("walk");

    assert_eq!(transport.request_count(), PAGES);
    let ids: Vec<&str> = nodes.iter().filter_map(|n| n["id"].as_str()).collect();
    let expected: Vec<String> = (0..PAGES)
        .flat_map(|index| [format!("r{index}a"), format!("r{index}b")])
        .collect();
    assert_eq!(ids, expected);

    let mut cursors = vec![None];
    cursors.extend((0..PAGES - 1).map(|index| Some(format!("c{index}"))));
    assert_eq!(transport.cursors(), cursors);
}

#[tokio::test]
async fn other_variables_are_passed_through() {
    let transport = ScriptedTransport::with_data([page([node("r1")], false, None)]);
    Paginator::new(&transport, None)
        .fetch_flat(QUERY, &json!({"filter": {"name": {"eq": "db"}}}), &ResultPath::root())
        .await
        .expect("walk");
    assert_eq!(
        transport.requests()[0].variables,
        json!({"filter": {"name": {"eq": "db"}}, "endCursor": null})
    );
}

#[tokio::test]
async fn page_ceiling_stops_endless_walks() {
    init_test_tracing();
    let transport = ScriptedTransport::new();
    for index in 0..4 {
        transport.push_data(page([node("r")], true, Some(format!("c{index}").as_str())));
    }

    let err = Paginator::new(&transport, Some(3))
        .fetch_flat(QUERY, &json!({}), &ResultPath::root())
        .await
        .expect_err("limit");
    assert!(matches!(err, PaginationError::PageLimitExceeded { pages: 3 }));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn next_page_without_cursor_ends_walk() {
    let transport = ScriptedTransport::with_data([page([node("r1")], true, None)]);
    let nodes = Paginator::new(&transport, None)
        .fetch_flat(QUERY, &json!({}), &ResultPath::root())
        .await
        .expect("walk");
    assert_eq!(nodes, vec![node("r1")]);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn null_edges_and_nodes_are_skipped() {
    let transport = ScriptedTransport::with_data([json!({"result": {
        "pageInfo": {"hasNextPage": false, "endCursor": null},
        "edges": [{"node": {"id": "r1"}}, null, {"node": null}]
    }})]);
    let nodes = Paginator::new(&transport, None)
        .fetch_flat(QUERY, &json!({}), &ResultPath::root())
        .await
        .expect("walk");
    assert_eq!(nodes, vec![node("r1")]);
}

#[tokio::test]
async fn missing_connection_is_reported() {
    let transport = ScriptedTransport::with_data([json!({"result": null})]);
    let err = Paginator::new(&transport, None)
        .fetch_flat(QUERY, &json!({}), &ResultPath::root())
        .await
        .expect_err("missing");
    match err {
        PaginationError::MissingConnection { path, context } => {
            assert_eq!(path, "result");
            assert_eq!(context.operation, "QueryResources");
            assert_eq!(context.variables, json!({"endCursor": null}));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_page_carries_query_and_variables() {
    let transport = ScriptedTransport::with_data([
        page([node("r1")], true, Some("c1")),
        json!({"result": {"edges": "oops"}}),
    ]);
    let err = Paginator::new(&transport, None)
        .fetch_flat(QUERY, &json!({"filter": {"name": {"eq": "db"}}}), &ResultPath::root())
        .await
        .expect_err("malformed");

    let context = err.context().expect("request context");
    assert_eq!(context.query, QUERY);
    assert_eq!(
        context.variables,
        json!({"filter": {"name": {"eq": "db"}}, "endCursor": "c1"})
    );
    assert!(matches!(
        err,
        PaginationError::MalformedPage { ref path, ref reason, .. }
            if path == "result" && reason.contains("expected a sequence")
    ));
}

#[tokio::test]
async fn transport_error_mid_walk_stops_the_walk() {
    let transport = ScriptedTransport::with_data([page([node("r1")], true, Some("c1"))]);
    transport.push_error(GraphqlClientError::Protocol {
        message: "connection reset".into(),
    });
    transport.push_data(page([node("r2")], false, None));

    let err = Paginator::new(&transport, None)
        .fetch_flat(QUERY, &json!({}), &ResultPath::root())
        .await
        .expect_err("transport error");
    assert!(matches!(
        err,
        PaginationError::Client(GraphqlClientError::Protocol { ref message }) if message == "connection reset"
    ));
    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test]
async fn resume_continues_from_cursor() {
    let transport = ScriptedTransport::with_data([
        nested_page("users", [node("u2")], true, Some("c2")),
        nested_page("users", [node("u3")], false, None),
    ]);
    let nodes = Paginator::new(&transport, None)
        .fetch_flat_from(
            CursorState::resume(Some("c1".into())),
            "query QueryGroupUsers($id:ID!, $endCursor:String){result:group(id:$id){users(after:$endCursor){pageInfo{hasNextPage endCursor} edges{node{id}}}}}",
            &json!({"id": "g1"}),
            &ResultPath::nested("users"),
        )
        .await
        .expect("walk");
    assert_eq!(nodes, vec![node("u2"), node("u3")]);
    assert_eq!(
        transport.cursors(),
        vec![Some("c1".to_string()), Some("c2".to_string())]
    );
}

#[tokio::test]
async fn fetch_single_makes_one_request() {
    let transport = ScriptedTransport::with_data([json!({"result": {
        "id": "g1",
        "users": connection([node("u1")], true, Some("c1")),
    }})]);
    let record = Paginator::new(&transport, None)
        .fetch_single("query QueryGroup($id:ID!){result:group(id:$id){id}}", &json!({"id": "g1"}))
        .await
        .expect("single")
        .expect("record");
    assert_eq!(record["id"], json!("g1"));
    assert_eq!(transport.request_count(), 1);
    assert_eq!(transport.requests()[0].variables, json!({"id": "g1"}));

    let empty = ScriptedTransport::with_data([json!({"result": null})]);
    let missing = Paginator::new(&empty, None)
        .fetch_single("query QueryGroup($id:ID!){result:group(id:$id){id}}", &json!({"id": "nope"}))
        .await
        .expect("single");
    assert_eq!(missing, None);
}

#[tokio::test]
async fn fetch_auto_detects_the_connection() {
    let transport = ScriptedTransport::with_data([
        nested_page("users", [node("u1")], true, Some("c1")),
        nested_page("users", [node("u2")], false, None),
    ]);
    let nodes = Paginator::new(&transport, None)
        .fetch_auto("query Q($endCursor:String){result:group(id:\"g\"){users(after:$endCursor){id}}}", &json!({}))
        .await
        .expect("walk");
    assert_eq!(nodes, vec![node("u1"), node("u2")]);
}

#[tokio::test]
async fn fetch_auto_rejects_ambiguous_results() {
    let transport = ScriptedTransport::with_data([json!({"result": {
        "users": connection([node("u1")], false, None),
        "resources": connection([node("r1")], false, None),
    }})]);
    let err = Paginator::new(&transport, None)
        .fetch_auto("query Q{result:group{id}}", &json!({}))
        .await
        .expect_err("ambiguous");
    assert!(matches!(
        err,
        PaginationError::Schema(SchemaError::AmbiguousConnection(fields)) if fields.len() == 2
    ));
}
