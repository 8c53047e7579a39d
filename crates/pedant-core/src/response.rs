// crates/pedant-core/src/response.rs
// ============================================================================
// Module: Pedant Captured Responses
// Description: Immutable HTTP responses with lazily parsed JSON bodies.
// Purpose: Hand responses to the matcher without forcing a JSON parse.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! A [`CapturedResponse`] owns the status, headers and raw body of one HTTP
//! exchange. The JSON view of the body is parsed at most once, on first use,
//! and a non-JSON body is a normal outcome rather than an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::OnceLock;

use serde_json::Value;

use crate::headers::HeaderMap;

// ============================================================================
// SECTION: Captured Response
// ============================================================================

/// A captured HTTP response.
pub struct CapturedResponse {
    /// HTTP status code.
    status: u16,
    /// Response headers.
    headers: HeaderMap,
    /// Raw response body.
    body: Vec<u8>,
    /// Lazily parsed JSON body; `None` when the body is not JSON.
    parsed: OnceLock<Option<Value>>,
}

impl CapturedResponse {
    /// Creates a captured response.
    #[must_use]
    pub const fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            parsed: OnceLock::new(),
        }
    }

    /// Creates a response whose body is the JSON encoding of `value`.
    #[must_use]
    pub fn json(status: u16, value: &Value) -> Self {
        let body = value.to_string().into_bytes();
        let headers = HeaderMap::from_pairs([(crate::headers::CONTENT_TYPE, "application/json")]);
        Self::new(status, headers, body)
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the parsed JSON body, parsing on first call.
    ///
    /// An empty or non-JSON body yields `None`.
    #[must_use]
    pub fn json_body(&self) -> Option<&Value> {
        self.parsed
            .get_or_init(|| {
                if self.body.iter().all(u8::is_ascii_whitespace) {
                    return None;
                }
                serde_json::from_slice(&self.body).ok()
            })
            .as_ref()
    }
}

impl Clone for CapturedResponse {
    fn clone(&self) -> Self {
        Self::new(self.status, self.headers.clone(), self.body.clone())
    }
}

impl fmt::Debug for CapturedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.text())
            .finish()
    }
}

impl PartialEq for CapturedResponse {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status && self.headers == other.headers && self.body == other.body
    }
}
