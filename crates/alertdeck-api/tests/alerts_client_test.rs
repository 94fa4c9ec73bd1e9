// Contract tests for `AlertsClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alertdeck_api::{AlertQuery, AlertsClient, Error, Severity};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, AlertsClient) {
    let server = MockServer::start().await;
    let base_url = server.uri().parse().expect("mock server uri");
    let client = AlertsClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn alert_json(id: &str, severity: &str, acknowledged: bool) -> serde_json::Value {
    json!({
        "id": id,
        "alertType": "FLOOD",
        "severity": severity,
        "location": "Mumbai",
        "timestamp": "2026-02-10T12:00:00Z",
        "acknowledged": acknowledged
    })
}

// ── Listing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn list_alerts_unfiltered_omits_filter_params() {
    let (server, client) = setup().await;

    let body = json!({
        "content": [alert_json("1", "HIGH", false), alert_json("2", "LOW", true)],
        "totalPages": 3
    });

    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("page", "0"))
        .and(query_param("size", "10"))
        .and(query_param_is_missing("severity"))
        .and(query_param_is_missing("acknowledged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let page = client
        .list_alerts(&AlertQuery::first_page(10))
        .await
        .expect("listing should succeed");

    assert_eq!(page.total_pages, 3);
    assert_eq!(page.content.len(), 2);
    assert_eq!(page.content[0].id, "1");
    assert_eq!(page.content[0].severity, Severity::High);
    assert!(page.content[1].acknowledged);
}

#[tokio::test]
async fn list_alerts_sends_set_filters() {
    let (server, client) = setup().await;

    let body = json!({ "content": [alert_json("9", "CRITICAL", false)], "totalPages": 1 });

    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("page", "2"))
        .and(query_param("severity", "CRITICAL"))
        .and(query_param("acknowledged", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let query = AlertQuery {
        page: 2,
        size: 10,
        severity: Some(Severity::Critical),
        acknowledged: Some(false),
    };

    let page = client.list_alerts(&query).await.expect("filtered listing");
    assert_eq!(page.content[0].id, "9");
}

#[tokio::test]
async fn list_alerts_maps_401_to_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .list_alerts(&AlertQuery::first_page(10))
        .await
        .expect_err("401 must fail");

    assert!(matches!(err, Error::SessionExpired));
    assert!(err.is_auth_expired());
}

#[tokio::test]
async fn list_alerts_surfaces_server_errors() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client
        .list_alerts(&AlertQuery::first_page(10))
        .await
        .expect_err("500 must fail");

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

// ── Acknowledgment ──────────────────────────────────────────────────

#[tokio::test]
async fn acknowledge_returns_updated_alert() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/alerts/42/acknowledge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alert_json("42", "CRITICAL", true)))
        .mount(&server)
        .await;

    let alert = client.acknowledge("42").await.expect("ack should succeed");
    assert_eq!(alert.id, "42");
    assert!(alert.acknowledged);
}

#[tokio::test]
async fn acknowledge_failure_is_an_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/alerts/42/acknowledge"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already acknowledged"))
        .mount(&server)
        .await;

    let err = client.acknowledge("42").await.expect_err("409 must fail");
    assert!(matches!(err, Error::Api { status: 409, .. }));
}
