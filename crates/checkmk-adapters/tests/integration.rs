//! Integration tests for the checkmk-adapters crate.
//!
//! The adapter runs against a scripted [`MockTransport`]; each test checks
//! the records the host receives and the HTTP traffic behind them.

use std::sync::{Arc, Once};

use checkmk_adapters::{Adapter, AdapterError, CheckmkAdapter, HealthStatus, JsonItems};
use checkmk_client::testing::MockTransport;
use checkmk_client::{CheckmkClient, Credentials, HttpResponse, Method, StaticCredentials};
use serde_json::{Value, json};

static INIT: Once = Once::new();

fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

fn adapter(mock: &Arc<MockTransport>) -> CheckmkAdapter {
    let credentials = StaticCredentials::checkmk(Credentials::new(
        "https://monitoring.example.com",
        "prod",
        "automation",
        "s3cret",
    ));
    CheckmkAdapter::new("checkmk", CheckmkClient::new(mock.clone()), Arc::new(credentials))
}

/// A connected adapter; the `/version` probe is consumed from the mock.
async fn connected(mock: &Arc<MockTransport>) -> CheckmkAdapter {
    init_test_logging();
    mock.push_json(200, json!({"versions": {"checkmk": "2.3.0p1"}}));
    let mut adapter = adapter(mock);
    adapter.connect().await.unwrap();
    adapter
}

/// Requests issued after the connect probe.
fn traffic(mock: &MockTransport) -> Vec<checkmk_client::HttpRequest> {
    mock.requests().into_iter().skip(1).collect()
}

const API: &str = "https://monitoring.example.com/prod/check_mk/api/1.0";

// ═══════════════════════════════════════════════════════════════════════
//  Lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn lifecycle_connect_health_disconnect() {
    let mock = Arc::new(MockTransport::new());
    let mut adapter = connected(&mock).await;
    assert_eq!(adapter.id(), "checkmk");

    mock.push_json(200, json!({"versions": {}}));
    assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Healthy);

    adapter.disconnect().await.unwrap();
    assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Unhealthy);
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn every_tool_name_resolves() {
    let mock = Arc::new(MockTransport::new());
    let adapter = adapter(&mock);
    let tools = adapter.tools();
    assert_eq!(tools.len(), 42);
    assert!(tools.iter().all(|t| t.name.starts_with("checkmk_")));
    assert!(tools.iter().any(|t| t.name == "checkmk_activate_changes"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Hosts
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn host_create_posts_to_collection() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;
    mock.push_json(200, json!({"id": "srv1", "domainType": "host_config"}));

    let out = adapter
        .execute_tool(
            "checkmk_host",
            json!({
                "operation": "create",
                "hostName": "srv1",
                "folder": "/linux",
                "additionalFields": {"ipaddress": "10.0.0.5"}
            }),
        )
        .await
        .unwrap();
    assert_eq!(out, json!([{"id": "srv1", "domainType": "host_config"}]));

    let sent = traffic(&mock);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::POST);
    assert_eq!(sent[0].url, format!("{API}/domain-types/host_config/collections/all"));
    assert_eq!(
        sent[0].body,
        Some(json!({
            "host_name": "srv1",
            "folder": "/linux",
            "attributes": {"ipaddress": "10.0.0.5"}
        }))
    );
}

#[tokio::test]
async fn host_delete_uses_fresh_tag() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;
    mock.push_response(HttpResponse::json(200, &json!({"id": "srv1"})).with_header("ETag", "\"t1\""));
    mock.push_response(HttpResponse::empty(204));

    let out = adapter
        .execute_tool("checkmk_host", json!({"operation": "delete", "hostName": "srv1"}))
        .await
        .unwrap();
    assert_eq!(out, json!([{"success": true, "hostName": "srv1"}]));

    let sent = traffic(&mock);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].method, Method::GET);
    assert_eq!(sent[1].method, Method::DELETE);
    assert_eq!(sent[1].url, format!("{API}/objects/host_config/srv1"));
    assert_eq!(sent[1].headers.get("If-Match"), Some("\"t1\""));
}

#[tokio::test]
async fn missing_host_reports_not_found_with_hint() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;
    mock.push_json(404, json!({"title": "Not Found", "status": 404}));

    let err = adapter
        .execute_tool(
            "checkmk_host",
            json!({"operation": "update", "hostName": "ghost", "additionalFields": {}}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("ghost"));
    assert!(err.hint().is_some());
    assert_eq!(traffic(&mock).len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Listings
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn get_many_honours_limit() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;
    mock.push_json(
        200,
        json!({"value": [{"id": "a"}, {"id": "b"}, {"id": "c"}], "links": []}),
    );

    let out = adapter
        .execute_tool("checkmk_host", json!({"operation": "getMany", "limit": 2}))
        .await
        .unwrap();
    assert_eq!(out, json!([{"id": "a"}, {"id": "b"}]));
}

#[tokio::test]
async fn return_all_follows_next_links() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;
    mock.push_json(
        200,
        json!({
            "value": [{"id": "g1"}],
            "links": {"next": format!("{API}/domain-types/host_group_config/collections/all?page=2")}
        }),
    );
    mock.push_json(200, json!({"value": [{"id": "g2"}, {"id": "g3"}]}));

    let out = adapter
        .execute_tool("checkmk_host_group", json!({"operation": "getMany", "returnAll": true}))
        .await
        .unwrap();
    let ids: Vec<&str> = out
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["id"].as_str())
        .collect();
    assert_eq!(ids, ["g1", "g2", "g3"]);
    assert_eq!(traffic(&mock).len(), 2);
}

// ═══════════════════════════════════════════════════════════════════════
//  Validation and batches
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn invalid_parameters_send_nothing() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;

    let err = adapter
        .execute_tool("checkmk_host", json!({"operation": "delete", "hostName": "  "}))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidParams { .. }));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn unsupported_operation_is_rejected() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;

    let err = adapter
        .execute_tool("checkmk_rule", json!({"operation": "delete", "ruleId": "r1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::UnsupportedOperation { .. }));
}

#[tokio::test]
async fn batch_records_failures_when_continuing() {
    let mock = Arc::new(MockTransport::new());
    let adapter = adapter(&mock);
    mock.push_json(200, json!({"id": "a"}));
    mock.push_json(200, json!({"id": "c"}));

    let source = JsonItems::new(vec![
        json!({"hostName": "a"}),
        json!({"hostName": ""}),
        json!({"hostName": "c"}),
    ]);
    let items = adapter.run_batch("host", "get", &source, true).await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].json["id"], "a");
    assert_eq!(items[1].item_index, 1);
    assert!(items[1].json["error"].as_str().unwrap().contains("hostName"));
    assert_eq!(items[2].json["id"], "c");
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn batch_aborts_on_first_failure_by_default() {
    let mock = Arc::new(MockTransport::new());
    let adapter = adapter(&mock);
    mock.push_json(500, json!({"title": "Internal Server Error"}));

    let source = JsonItems::new(vec![json!({"hostName": "a"}), json!({"hostName": "b"})]);
    let err = adapter.run_batch("host", "get", &source, false).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn unknown_resource_fails_whole_batch() {
    let mock = Arc::new(MockTransport::new());
    let adapter = adapter(&mock);
    let source = JsonItems::single(json!({}));

    let err = adapter
        .run_batch("spaceship", "get", &source, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::UnknownResource(_)));
    assert_eq!(mock.request_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════
//  Change activation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn activation_reads_tag_from_pending_changes() {
    let mock = Arc::new(MockTransport::new());
    let adapter = connected(&mock).await;
    mock.push_response(
        HttpResponse::json(200, &json!({"value": []})).with_header("ETag", "\"pending-9\""),
    );
    mock.push_json(200, json!({"id": "run-1", "title": "Activation started"}));

    let out = adapter
        .execute_tool(
            "checkmk_activate_changes",
            json!({"operation": "activate", "activateOnSites": "prod", "forceForeignChanges": true}),
        )
        .await
        .unwrap();
    assert_eq!(out[0]["id"], "run-1");

    let sent = traffic(&mock);
    assert_eq!(
        sent[0].url,
        format!("{API}/domain-types/activation_run/collections/pending_changes")
    );
    assert_eq!(sent[1].method, Method::POST);
    assert_eq!(sent[1].headers.get("If-Match"), Some("\"pending-9\""));
    let body: &Value = sent[1].body.as_ref().unwrap();
    assert_eq!(body["sites"], json!(["prod"]));
    assert_eq!(body["force_foreign_changes"], true);
}
