#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sentra_api::{ApiClient, ApiConfig, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let url = Url::parse(&server.uri()).unwrap();
    let client = ApiClient::new(ApiConfig {
        base_url: url.clone(),
        status_url: url,
        email: "user@example.com".into(),
        password: "test-password".to_string().into(),
        authorize_hours: 6,
    })
    .unwrap();
    (server, client)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_authorize_success() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    client.authorize().await.unwrap();
}

#[tokio::test]
async fn test_authorize_failure() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = client.authorize().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Maintenance probe ───────────────────────────────────────────────

#[tokio::test]
async fn test_is_maintenance() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "isMaintenance": true })),
        )
        .mount(&server)
        .await;

    assert!(client.is_maintenance().await.unwrap());
}

// ── Data endpoints ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_base_stations() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/me/basestations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "F0AD4E000000",
                "friendly_name": "Home",
                "status": "online",
                "intrusion_settings": {
                    "active_mode": "home",
                    "modes": [ { "home": {} }, { "away": {} } ]
                }
            }
        ])))
        .mount(&server)
        .await;

    let stations = client.get_base_stations().await.unwrap();

    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].id, "F0AD4E000000");
    assert_eq!(stations[0].status, "online");
    assert_eq!(stations[0].intrusion_settings.active_mode, "home");
    assert_eq!(stations[0].intrusion_settings.modes.len(), 2);
}

#[tokio::test]
async fn test_get_elements_splits_groups() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/me/elements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bs01": [{
                "id": "F0AD4E000000",
                "subelements": [{
                    "id": "F0AD4E000000.01ab",
                    "type": "bs01.ds02",
                    "friendlyName": "Front Door",
                    "connectionStatus": "online",
                    "firmwareStatus": "up_to_date",
                    "positionStatus": "closed"
                }]
            }],
            "gp02": [{
                "id": "1c0000aa",
                "friendlyName": "Handset",
                "connectionStatus": "online"
            }]
        })))
        .mount(&server)
        .await;

    let root = client.get_elements().await.unwrap();

    assert_eq!(root.bs01.len(), 1);
    assert_eq!(root.bs01[0].subelements[0].type_tag, "bs01.ds02");
    assert_eq!(root.gp02.len(), 1);
    assert_eq!(root.gp02[0].id, "1c0000aa");
}

#[tokio::test]
async fn test_get_recent_events_passes_cursor() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/me/events"))
        .and(query_param("from_ts", "1700000000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{
                "ts": "1700000001000",
                "type": "open",
                "source_id": "F0AD4E000000",
                "o": { "type": "ds02", "id": "01ab" }
            }]
        })))
        .mount(&server)
        .await;

    let page = client.get_recent_events(1_700_000_000_000).await.unwrap();

    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].ts_millis(), 1_700_000_001_000);
}

// ── Error classification ────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_carries_status_and_target() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/me/health"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.get_health().await.unwrap_err();
    match &err {
        Error::Rejected { status, method, target } => {
            assert_eq!(*status, 401);
            assert_eq!(*method, "GET");
            assert_eq!(target, "/api/v2/me/health");
        }
        other => panic!("expected Rejected, got: {other:?}"),
    }
    assert!(err.is_authorization_expired());
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_element_command() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/me/basestations/F0AD4E000000/endnodes/03ef/cmd"))
        .and(body_json(json!({ "name": "on" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    client
        .send_element_command("F0AD4E000000", "03ef", "on")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_intrusion_mode() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/me/basestations/F0AD4E000000"))
        .and(body_json(json!({ "intrusion_settings": { "active_mode": "away" } })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    client
        .set_intrusion_mode("F0AD4E000000", "away")
        .await
        .unwrap();
}
