// crates/pedant-http/src/tests.rs
// ============================================================================
// Module: HTTP Unit Tests
// Description: Unit tests for URL validation, header layering, and parsing.
// Purpose: Pin request preparation rules without a network.
// Dependencies: pedant-http
// ============================================================================

//! ## Overview
//! Exercises [`crate::prepare_request`] directly and the CLI key listing
//! parser.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use pedant_core::DarklaunchFlags;
use pedant_core::HeaderMap;
use pedant_core::Identity;
use pedant_core::IdentityKind;
use pedant_core::Method;
use pedant_core::PrivateKey;
use pedant_core::RequestSigner;
use pedant_core::Requestor;
use pedant_core::Role;
use pedant_core::headers::HOST;
use pedant_core::headers::X_OPS_DARKLAUNCH;
use pedant_core::headers::X_OPS_USERID;
use pedant_core::signing::utc_timestamp;
use serde_json::json;

use crate::RequestDefaults;
use crate::RequestError;
use crate::RequestOptions;
use crate::keys::parse_ctl_listing;
use crate::parse_request_url;
use crate::prepare_request;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const ADMIN_PEM: &str = include_str!("../../pedant-core/tests/fixtures/keys/admin.pem");

fn admin() -> Requestor {
    let key = PrivateKey::from_pem(ADMIN_PEM).unwrap();
    Requestor::new(Identity::new("admin", IdentityKind::User, Role::Admin, key), RequestSigner::default())
}

// ============================================================================
// SECTION: URL Validation
// ============================================================================

#[test]
fn urls_with_spaces_or_braces_are_rejected() {
    assert!(parse_request_url("https://chef.example/clients/bad name").is_err());
    assert!(parse_request_url("https://chef.example/clients/{name}").is_err());
    assert!(parse_request_url("ftp://chef.example/clients").is_err());
    assert!(parse_request_url("/clients").is_err());
    assert!(parse_request_url("https://chef.example/clients?q=name:x").is_ok());
}

#[test]
fn invalid_url_fails_before_signing() {
    let err = prepare_request(
        Method::Get,
        "http://chef example/",
        &admin(),
        &RequestOptions::new(),
        &RequestDefaults::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RequestError::InvalidUrl(_)));
}

// ============================================================================
// SECTION: Header Layering
// ============================================================================

#[test]
fn auth_headers_override_caller_and_host_override_wins() {
    let auth = HeaderMap::from_pairs([(X_OPS_USERID, "from-auth"), ("Accept", "text/plain")]);
    let options = RequestOptions::new()
        .header("x-ops-userid", "from-caller")
        .header("Accept", "application/xml")
        .header(HOST, "caller.example")
        .auth_headers(auth)
        .host("override.example");
    let prepared =
        prepare_request(Method::Get, "https://chef.example/clients", &admin(), &options, &RequestDefaults::default())
            .unwrap();
    assert_eq!(prepared.headers.get(X_OPS_USERID), Some("from-auth"));
    assert_eq!(prepared.headers.get("accept"), Some("text/plain"));
    assert_eq!(prepared.headers.get(HOST), Some("override.example"));
}

#[test]
fn caller_headers_override_standard_headers() {
    let options = RequestOptions::new().header("content-type", "text/plain");
    let prepared =
        prepare_request(Method::Get, "https://chef.example/clients", &admin(), &options, &RequestDefaults::default())
            .unwrap();
    assert_eq!(prepared.headers.get("Content-Type"), Some("text/plain"));
    assert_eq!(prepared.headers.get("Accept"), Some("application/json"));
    assert_eq!(prepared.headers.get("User-Agent"), Some("chef-pedant"));
    assert_eq!(prepared.headers.get(HOST), Some("chef.example"));
}

#[test]
fn host_header_omits_the_port() {
    let prepared = prepare_request(
        Method::Get,
        "http://127.0.0.1:8443/users",
        &admin(),
        &RequestOptions::new(),
        &RequestDefaults::default(),
    )
    .unwrap();
    assert_eq!(prepared.headers.get(HOST), Some("127.0.0.1"));
}

#[test]
fn darklaunch_watermark_is_forced_after_caller_flags() {
    let options = RequestOptions::new()
        .header(X_OPS_DARKLAUNCH, "couchdb_roles=1")
        .darklaunch("pedant_x_darklaunch", false)
        .darklaunch("custom", true);
    let prepared =
        prepare_request(Method::Get, "https://chef.example/roles", &admin(), &options, &RequestDefaults::default())
            .unwrap();
    let value = prepared.headers.get(X_OPS_DARKLAUNCH).unwrap();
    let flags = DarklaunchFlags::parse(value).unwrap();
    assert_eq!(flags.get("pedant_x_darklaunch"), Some(true));
    assert_eq!(flags.get("couchdb_roles"), Some(true));
    assert_eq!(flags.get("couchdb_users"), Some(false));
    assert_eq!(flags.get("custom"), Some(true));
}

#[test]
fn darklaunch_header_present_without_caller_flags() {
    let prepared = prepare_request(
        Method::Delete,
        "https://chef.example/nodes/x",
        &admin(),
        &RequestOptions::new(),
        &RequestDefaults::default(),
    )
    .unwrap();
    assert!(prepared.headers.get(X_OPS_DARKLAUNCH).unwrap().contains("pedant_x_darklaunch=1"));
}

#[test]
fn explicit_timestamp_is_signed() {
    let when = utc_timestamp(2024, 1, 1, 0, 0, 0).unwrap();
    let options = RequestOptions::new().payload(json!({"name": "x"})).timestamp(when);
    let prepared =
        prepare_request(Method::Post, "https://chef.example/clients", &admin(), &options, &RequestDefaults::default())
            .unwrap();
    assert_eq!(prepared.headers.get("X-Ops-Timestamp"), Some("2024-01-01T00:00:00Z"));
    assert_eq!(prepared.body, br#"{"name":"x"}"#);
}

// ============================================================================
// SECTION: Key Listing
// ============================================================================

#[test]
fn ctl_listing_parses_names_expiry_and_keys() {
    let output = "\
2 total key(s) found for user pedant

key_name: default
expires_at: Infinity
public_key:
-----BEGIN PUBLIC KEY-----
MIIBIjAN
-----END PUBLIC KEY-----

key_name: alt
expires_at: 2017-12-24 21:00:00 UTC
";
    let records = parse_ctl_listing(output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "default");
    assert_eq!(records[0].expiration_date.as_deref(), Some("Infinity"));
    assert!(records[0].public_key.as_deref().unwrap().contains("MIIBIjAN"));
    assert_eq!(records[1].name, "alt");
    assert!(records[1].public_key.is_none());
}
