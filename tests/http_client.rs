//! HTTP client behavior against a real socket: token header, error body
//! interpretation, transport retry, and the silent session refresh.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bdm_installer::api::{ApiCall, HttpApi, InstallerStatus, ProvisioningApi};

fn client(base_url: &str, timeout: Duration) -> HttpApi {
    HttpApi::with_base(base_url, "/api", timeout).unwrap()
}

#[tokio::test]
async fn installer_token_travels_in_the_dedicated_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/install/status"))
        .and(header("X-Installer-Token", "tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enabled": true,
            "db_ok": true,
            "installed": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_secs(5));
    let call: ApiCall<InstallerStatus> = api.status("tok-123").await;

    assert!(call.is_ok());
    let status = call.data.unwrap();
    assert!(status.enabled);
    assert!(!status.installed);
}

#[tokio::test]
async fn bootstrap_status_uses_the_hyphenated_route() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/install/bootstrap-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "env_dir_exists": true,
            "env_dir_writable": false,
            "sudoers_present": true,
            "system_install_exists": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_secs(5));
    let call = api.bootstrap_status("tok-123").await;

    assert!(call.is_ok());
    assert!(!call.data.unwrap().env_dir_writable);
}

#[tokio::test]
async fn blank_token_sends_no_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/install/status"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "Invalid installer token"
        })))
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_secs(5));
    let call = api.status("").await;

    assert_eq!(call.status, 403);
    assert_eq!(call.detail(), Some("Invalid installer token"));
    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("X-Installer-Token").is_none());
}

#[tokio::test]
async fn empty_success_body_yields_neither_data_nor_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/install/status"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_secs(5));
    let call: ApiCall<serde_json::Value> = api.get("/install/status", None).await;

    assert!(call.is_ok());
    assert!(call.data.is_none());
    assert!(call.error.is_none());
}

#[tokio::test]
async fn non_json_error_body_becomes_the_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/install/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_secs(5));
    let call: ApiCall<serde_json::Value> = api.get("/install/status", None).await;

    assert_eq!(call.status, 500);
    assert_eq!(call.detail(), Some("internal failure"));
}

/// Accepts TCP connections and drops them immediately, so every request dies
/// at the transport layer. Returns the base URL and an attempt counter.
fn dead_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });
    (format!("http://{}", addr), attempts)
}

#[tokio::test]
async fn get_retries_the_transport_once() {
    let (base, attempts) = dead_server();
    let api = client(&base, Duration::from_secs(2));

    let call: ApiCall<serde_json::Value> = api.get("/install/status", None).await;

    assert!(call.is_transport_failure());
    assert!(call.detail().is_some());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn post_is_never_retried_at_the_transport_layer() {
    let (base, attempts) = dead_server();
    let api = client(&base, Duration::from_secs(2));

    let call: ApiCall<serde_json::Value> =
        api.post_json("/install/env", None, &json!({})).await;

    assert!(call.is_transport_failure());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unauthorized_outside_installer_paths_refreshes_once_and_reissues() {
    let server = MockServer::start().await;

    // First probe is rejected, the re-issue after the refresh succeeds.
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_secs(5));
    let call: ApiCall<serde_json::Value> = api.get("/users/me", None).await;

    assert_eq!(call.status, 200);
    assert_eq!(call.data, Some(json!({ "id": 1 })));
}

#[tokio::test]
async fn unauthorized_installer_call_is_returned_without_a_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/install/status"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Invalid installer token"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_secs(5));
    let call = api.status("stale").await;

    assert_eq!(call.status, 401);
    assert_eq!(call.detail(), Some("Invalid installer token"));
}

#[tokio::test]
async fn slow_backend_surfaces_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/install/env"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let api = client(&server.uri(), Duration::from_millis(300));
    let call: ApiCall<serde_json::Value> =
        api.post_json("/install/env", None, &json!({})).await;

    assert!(call.is_transport_failure());
    assert_eq!(call.detail(), Some("Request timed out"));
}
