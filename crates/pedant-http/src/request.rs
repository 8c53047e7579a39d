// crates/pedant-http/src/request.rs
// ============================================================================
// Module: Pedant Request Preparation
// Description: URL validation, payload canonicalization, and header layering.
// Purpose: Produce the exact bytes and headers a signed request will carry.
// Dependencies: pedant-core, serde_json, time, url
// ============================================================================

//! ## Overview
//! [`prepare_request`] turns a method, URL text, requestor and
//! [`RequestOptions`] into a [`PreparedRequest`] without touching the network.
//!
//! Invariants:
//! - Headers are layered in a fixed order, each layer overriding same-named
//!   keys from the previous one: standard, caller, auth, darklaunch, `Host`.
//! - The signature is computed over the exact body bytes that are sent.
//! - URL failures are raised before signing and before any network call.
//! - The darklaunch header is always present and always carries the
//!   watermark flag set to `1`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use pedant_core::DarklaunchFlags;
use pedant_core::HeaderMap;
use pedant_core::Method;
use pedant_core::Requestor;
use pedant_core::hashing::canonical_json_bytes;
use pedant_core::headers::ACCEPT;
use pedant_core::headers::CONTENT_TYPE;
use pedant_core::headers::HOST;
use pedant_core::headers::USER_AGENT;
use pedant_core::headers::X_CHEF_VERSION;
use pedant_core::headers::X_OPS_DARKLAUNCH;
use serde_json::Value;
use time::OffsetDateTime;
use url::Url;

use crate::error::InvalidUrlError;
use crate::error::RequestError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Media type used for both `Accept` and `Content-Type`.
pub const JSON_MEDIA_TYPE: &str = "application/json";
/// Default `User-Agent` value.
pub const DEFAULT_USER_AGENT: &str = "chef-pedant";
/// Default `X-Chef-Version` value.
pub const DEFAULT_CHEF_VERSION: &str = "12.0.0";
/// Characters that may not appear anywhere in a request URL.
const FORBIDDEN_URL_CHARS: [char; 10] = ['"', '<', '>', '\\', '^', '`', '{', '|', '}', ' '];

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Request body supplied by a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes sent verbatim, including deliberately malformed JSON.
    Raw(Vec<u8>),
    /// Structured value serialized to canonical JSON text.
    Json(Value),
}

impl Payload {
    /// Returns the exact bytes that will be signed and transmitted.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Payload`] when the JSON value cannot be
    /// canonicalized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RequestError> {
        match self {
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::Json(value) => {
                canonical_json_bytes(value).map_err(|err| RequestError::Payload(err.to_string()))
            }
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Raw(value.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Raw(value.into_bytes())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Raw(value)
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Caller headers; overridden by auth, darklaunch and `Host`.
    pub headers: HeaderMap,
    /// Optional request body.
    pub payload: Option<Payload>,
    /// Explicit signing time for back-dated or future-dated signatures.
    pub timestamp: Option<OffsetDateTime>,
    /// Verbatim auth headers; when set the signer is bypassed.
    pub auth_headers: Option<HeaderMap>,
    /// Darklaunch flags merged over the configured defaults.
    pub x_darklaunch: DarklaunchFlags,
    /// Explicit `Host` override.
    pub host: Option<String>,
}

impl RequestOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a caller header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Signs the request at an explicit time.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sends these auth headers verbatim instead of signing.
    #[must_use]
    pub fn auth_headers(mut self, headers: HeaderMap) -> Self {
        self.auth_headers = Some(headers);
        self
    }

    /// Sets a darklaunch flag for this call.
    #[must_use]
    pub fn darklaunch(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.x_darklaunch.set(name, enabled);
        self
    }

    /// Overrides the `Host` header.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

/// Values applied to every request issued through a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefaults {
    /// `User-Agent` header value.
    pub user_agent: String,
    /// `X-Chef-Version` header value.
    pub chef_version: String,
    /// Built-in darklaunch flags.
    pub darklaunch: DarklaunchFlags,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chef_version: DEFAULT_CHEF_VERSION.to_string(),
            darklaunch: DarklaunchFlags::standard(),
        }
    }
}

impl RequestDefaults {
    /// Returns the standard header layer.
    #[must_use]
    pub fn standard_headers(&self) -> HeaderMap {
        HeaderMap::from_pairs([
            (ACCEPT, JSON_MEDIA_TYPE),
            (CONTENT_TYPE, JSON_MEDIA_TYPE),
            (USER_AGENT, self.user_agent.as_str()),
            (X_CHEF_VERSION, self.chef_version.as_str()),
        ])
    }
}

// ============================================================================
// SECTION: Prepared Request
// ============================================================================

/// Fully resolved request ready for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Final header set.
    pub headers: HeaderMap,
    /// Body bytes, identical to the bytes that were signed.
    pub body: Vec<u8>,
}

/// Parses and validates request URL text.
///
/// # Errors
///
/// Returns [`InvalidUrlError`] when the text contains whitespace or other
/// characters that must be escaped, does not parse, is not http(s), or has no
/// host.
pub fn parse_request_url(raw: &str) -> Result<Url, InvalidUrlError> {
    if let Some(bad) = raw.chars().find(|ch| ch.is_whitespace() || FORBIDDEN_URL_CHARS.contains(ch)) {
        return Err(InvalidUrlError::new(raw, format!("forbidden character {bad:?}")));
    }
    let url = Url::parse(raw).map_err(|err| InvalidUrlError::new(raw, err.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(InvalidUrlError::new(raw, format!("unsupported scheme {other}"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(InvalidUrlError::new(raw, "missing host"));
    }
    Ok(url)
}

/// Resolves a request into its final headers and body.
///
/// # Errors
///
/// Returns [`RequestError::InvalidUrl`] for rejected URLs,
/// [`RequestError::Payload`] for unserializable payloads and
/// [`RequestError::Signing`] when signing fails.
pub fn prepare_request(
    method: Method,
    url: &str,
    requestor: &Requestor,
    options: &RequestOptions,
    defaults: &RequestDefaults,
) -> Result<PreparedRequest, RequestError> {
    let url = parse_request_url(url)?;
    let body = match &options.payload {
        Some(payload) => payload.to_bytes()?,
        None => Vec::new(),
    };

    let auth = match &options.auth_headers {
        Some(headers) => headers.clone(),
        None => match options.timestamp {
            Some(timestamp) => requestor.signing_headers_at(method, &url, &body, timestamp)?,
            None => requestor.signing_headers(method, &url, &body)?,
        },
    };

    let mut headers = defaults.standard_headers();
    headers.merge(&options.headers);
    headers.merge(&auth);
    headers.insert(X_OPS_DARKLAUNCH, darklaunch_value(defaults, options));
    let host = options.host.clone().or_else(|| url.host_str().map(str::to_string)).unwrap_or_default();
    headers.insert(HOST, host);

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Builds the darklaunch header: defaults, then caller flags, then watermark.
fn darklaunch_value(defaults: &RequestDefaults, options: &RequestOptions) -> String {
    let mut flags = defaults.darklaunch.clone();
    if let Some(caller) = options.headers.get(X_OPS_DARKLAUNCH).and_then(DarklaunchFlags::parse) {
        flags = flags.merged(&caller);
    }
    flags.merged(&options.x_darklaunch).encode_with_watermark()
}
