// crates/pedant-http/tests/transport.rs
// ============================================================================
// Module: Transport Integration Tests
// Description: Signed request execution against stub servers and mocks.
// Purpose: Validate body signing, response capture, and failure classes.
// Dependencies: pedant-core, pedant-http, serde_json, tempfile, tiny_http
// ============================================================================

//! ## Overview
//! Uses [`RecordingBackend`] to inspect prepared requests and a `tiny_http`
//! stub to exercise the live reqwest backend end to end.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pedant_core::CapturedResponse;
use pedant_core::HeaderMap;
use pedant_core::Identity;
use pedant_core::IdentityKind;
use pedant_core::Method;
use pedant_core::PrivateKey;
use pedant_core::PublicKey;
use pedant_core::RequestSigner;
use pedant_core::Requestor;
use pedant_core::Role;
use pedant_core::hashing::DigestAlgorithm;
use pedant_core::hashing::base64_digest;
use pedant_core::signing::verify_signature;
use pedant_http::ApiKeyManager;
use pedant_http::BackendSettings;
use pedant_http::FileRequestLog;
use pedant_http::KeyManager;
use pedant_http::KeyOwner;
use pedant_http::NewKey;
use pedant_http::RecordingBackend;
use pedant_http::RequestDefaults;
use pedant_http::RequestError;
use pedant_http::RequestOptions;
use pedant_http::ReqwestBackend;
use pedant_http::Transport;
use pedant_http::TransportError;
use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const ADMIN_PEM: &str = include_str!("../../pedant-core/tests/fixtures/keys/admin.pem");

fn admin() -> Requestor {
    let key = PrivateKey::from_pem(ADMIN_PEM).unwrap();
    Requestor::new(Identity::new("admin", IdentityKind::User, Role::Admin, key), RequestSigner::default())
}

fn recording() -> (Arc<RecordingBackend>, Transport) {
    let backend = Arc::new(RecordingBackend::new());
    let transport = Transport::new(backend.clone(), RequestDefaults::default());
    (backend, transport)
}

fn live(timeout: Duration) -> Transport {
    let backend = ReqwestBackend::new(BackendSettings {
        timeout,
        ssl_verify: true,
    })
    .unwrap();
    Transport::new(Arc::new(backend), RequestDefaults::default())
}

// ============================================================================
// SECTION: Recording Backend
// ============================================================================

#[test]
fn post_payload_is_canonical_json_and_signed_hash_matches() {
    let (backend, transport) = recording();
    let requestor = admin();
    let options = RequestOptions::new().payload(json!({"name": "x"}));
    transport.post("https://example.test/clients", &requestor, &options).unwrap();

    let request = backend.last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.body, br#"{"name":"x"}"#);
    let expected_hash = base64_digest(DigestAlgorithm::Sha1, br#"{"name":"x"}"#);
    assert_eq!(request.headers.get("X-Ops-Content-Hash"), Some(expected_hash.as_str()));

    let public = requestor.identity().key().public_key();
    verify_signature(Method::Post, request.url.path(), &request.body, &request.headers, &public).unwrap();
}

#[test]
fn raw_payload_is_sent_verbatim() {
    let (backend, transport) = recording();
    let options = RequestOptions::new().payload("{not json");
    transport.put("https://example.test/nodes/web01", &admin(), &options).unwrap();
    assert_eq!(backend.last_request().unwrap().body, b"{not json");
}

#[test]
fn auth_headers_bypass_the_signer() {
    let (backend, transport) = recording();
    let auth = HeaderMap::from_pairs([("X-Ops-Userid", "ghost")]);
    transport.get("https://example.test/clients", &admin(), &RequestOptions::new().auth_headers(auth)).unwrap();
    let request = backend.last_request().unwrap();
    assert_eq!(request.headers.get("X-Ops-Userid"), Some("ghost"));
    assert!(!request.headers.contains("X-Ops-Authorization-1"));
}

#[test]
fn queued_responses_and_errors_are_replayed() {
    let (backend, transport) = recording();
    backend.push_response(CapturedResponse::json(404, &json!({"error": ["not found"]})));
    backend.push_error(TransportError::Connect("refused".to_string()));

    let response = transport.get("https://example.test/nodes/x", &admin(), &RequestOptions::new()).unwrap();
    assert_eq!(response.status(), 404);
    let err = transport.get("https://example.test/nodes/x", &admin(), &RequestOptions::new()).unwrap_err();
    assert!(matches!(err, RequestError::Transport(TransportError::Connect(_))));
    assert_eq!(backend.requests().len(), 2);
}

#[test]
fn invalid_url_never_reaches_the_backend() {
    let (backend, transport) = recording();
    let err = transport.get("https://example.test/clients/has space", &admin(), &RequestOptions::new()).unwrap_err();
    assert!(matches!(err, RequestError::InvalidUrl(_)));
    assert!(backend.requests().is_empty());
}

#[test]
fn file_log_records_one_line_per_exchange_without_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");
    let (backend, transport) = recording();
    let transport = transport.with_log(Arc::new(FileRequestLog::open(&path).unwrap()));
    backend.push_response(CapturedResponse::json(201, &json!({"uri": "x"})));

    transport.post("https://example.test/clients", &admin(), &RequestOptions::new().payload(json!({"a": 1}))).unwrap();
    let _ = transport.get("https://example.test/bad url", &admin(), &RequestOptions::new());

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "http_request");
    assert_eq!(lines[0]["status"], 201);
    assert_eq!(lines[0]["requestor"], "admin");
    assert_eq!(lines[0]["request_bytes"], 7);
    assert_eq!(lines[1]["outcome"], "invalid_url");
    assert!(!text.contains("X-Ops-Authorization"));
}

#[test]
fn api_key_manager_posts_named_keys() {
    let (backend, transport) = recording();
    backend.push_response(CapturedResponse::json(201, &json!({"uri": "k"})));
    let manager = ApiKeyManager::new(transport, admin(), Url::parse("https://example.test").unwrap());
    let owner = KeyOwner::new(IdentityKind::Client, "acme", "web01");
    let public_key: PublicKey = PrivateKey::from_pem(ADMIN_PEM).unwrap().public_key();
    manager
        .add_key(&owner, &NewKey {
            name: "alt".to_string(),
            public_key,
            expiration_date: None,
        })
        .unwrap();

    let request = backend.last_request().unwrap();
    assert_eq!(request.url.path(), "/organizations/acme/clients/web01/keys");
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["name"], "alt");
    assert_eq!(body["expiration_date"], "infinity");
    assert!(body["public_key"].as_str().unwrap().starts_with("-----BEGIN PUBLIC KEY-----"));
}

#[test]
fn api_key_manager_lists_keys() {
    let (backend, transport) = recording();
    backend.push_response(CapturedResponse::json(
        200,
        &json!([{"name": "default", "uri": "https://example.test/users/u/keys/default", "expired": false}]),
    ));
    let manager = ApiKeyManager::new(transport, admin(), Url::parse("https://example.test").unwrap());
    let keys = manager.list_keys(&KeyOwner::new(IdentityKind::User, "", "u")).unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].name, "default");
    assert_eq!(keys[0].expired, Some(false));
}

// ============================================================================
// SECTION: Live Backend
// ============================================================================

#[test]
fn live_request_carries_signed_headers_and_captures_response() {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let addr = server.server_addr().to_ip().unwrap();
    let public = admin().identity().key().public_key();

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request");
        let mut body = Vec::new();
        request.as_reader().read_to_end(&mut body).unwrap();
        let mut headers = HeaderMap::new();
        for header in request.headers() {
            headers.insert(header.field.as_str().as_str(), header.value.as_str());
        }
        let path = request.url().split('?').next().unwrap_or("/").to_string();
        let verified = verify_signature(Method::Post, &path, &body, &headers, &public).is_ok();
        let reply = json!({"verified": verified, "host": headers.get("Host")});
        let response = Response::from_data(reply.to_string().into_bytes())
            .with_status_code(201)
            .with_header(Header::from_bytes("Content-Type", "application/json").unwrap());
        request.respond(response).expect("respond");
    });

    let url = format!("http://{addr}/organizations/acme/clients?ignored=1");
    let options = RequestOptions::new().payload(json!({"name": "pedant"}));
    let response = live(Duration::from_secs(10)).post(&url, &admin(), &options).unwrap();
    handle.join().unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(response.headers().get("content-type"), Some("application/json"));
    let body = response.json_body().unwrap();
    assert_eq!(body["verified"], true);
    assert_eq!(body["host"], "127.0.0.1");
}

#[test]
fn redirects_are_returned_not_followed() {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let request = server.recv().expect("request");
        let response = Response::empty(301)
            .with_header(Header::from_bytes("Location", "http://127.0.0.1:1/elsewhere").unwrap());
        request.respond(response).expect("respond");
    });

    let response = live(Duration::from_secs(10)).get(&format!("http://{addr}/moved"), &admin(), &RequestOptions::new());
    handle.join().unwrap();
    assert_eq!(response.unwrap().status(), 301);
}

#[test]
fn connection_failure_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = live(Duration::from_secs(5))
        .get(&format!("http://127.0.0.1:{port}/users"), &admin(), &RequestOptions::new())
        .unwrap_err();
    assert!(matches!(err, RequestError::Transport(_)));
}

#[test]
fn slow_server_hits_the_timeout() {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let request = server.recv().expect("request");
        thread::sleep(Duration::from_secs(3));
        drop(request);
    });

    let err = live(Duration::from_secs(1))
        .get(&format!("http://{addr}/slow"), &admin(), &RequestOptions::new())
        .unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, RequestError::Transport(TransportError::Timeout(_) | TransportError::Request(_))));
}
