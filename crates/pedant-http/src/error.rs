// crates/pedant-http/src/error.rs
// ============================================================================
// Module: Pedant HTTP Errors
// Description: Failure classes for URL parsing, transport, and request execution.
// Purpose: Keep pre-network URL failures distinguishable from network failures.
// Dependencies: pedant-core, thiserror
// ============================================================================

//! ## Overview
//! Scenarios frequently expect a request to fail, so each failure class is a
//! distinct type. [`RequestError`] wraps them for the transport entry points
//! and keeps the original class matchable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use pedant_core::SigningError;
use thiserror::Error;

// ============================================================================
// SECTION: Error Types
// ============================================================================

/// URL rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid url {url:?}: {reason}")]
pub struct InvalidUrlError {
    /// The URL text as supplied.
    pub url: String,
    /// Why the URL was rejected.
    pub reason: String,
}

impl InvalidUrlError {
    /// Builds an invalid URL error.
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Network-level failure while exchanging a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(String),
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The per-call timeout elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The request failed after the connection was established.
    #[error("request failed: {0}")]
    Request(String),
    /// The response body could not be read or exceeded the size limit.
    #[error("response body error: {0}")]
    Body(String),
}

/// Any failure raised while preparing or executing a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The URL was rejected before the network was touched.
    #[error(transparent)]
    InvalidUrl(#[from] InvalidUrlError),
    /// Signature headers could not be produced.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The network exchange failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A structured payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Payload(String),
}

impl RequestError {
    /// Short outcome label used by request logs.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::Signing(_) => "signing_error",
            Self::Transport(_) => "transport_error",
            Self::Payload(_) => "payload_error",
        }
    }
}
