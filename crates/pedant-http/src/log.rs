// crates/pedant-http/src/log.rs
// ============================================================================
// Module: Pedant Request Log
// Description: JSON-lines logging of HTTP exchanges.
// Purpose: Trace every request without exposing credentials or bodies.
// Dependencies: pedant-core, serde, serde_json, time
// ============================================================================

//! ## Overview
//! Each exchange produces one [`RequestLogEvent`] serialized as a JSON line.
//! Header values and bodies are never logged; only sizes and outcomes are.
//!
//! Invariants:
//! - Log failures never fail the request being logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use pedant_core::CapturedResponse;
use pedant_core::Method;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::error::RequestError;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Redaction marker recorded in place of header values.
pub const HEADERS_REDACTED: &str = "headers_omitted";

/// One logged HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestLogEvent {
    /// Event discriminator; always `http_request`.
    pub event: &'static str,
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// HTTP method.
    pub method: Method,
    /// URL text as supplied by the caller.
    pub url: String,
    /// Name of the signing identity.
    pub requestor: String,
    /// Response status when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// `ok` or the failure class.
    pub outcome: &'static str,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Elapsed time in milliseconds.
    pub duration_ms: u64,
    /// Header redaction marker.
    pub headers: &'static str,
}

impl RequestLogEvent {
    /// Event for an exchange that produced a response.
    #[must_use]
    pub fn completed(
        method: Method,
        url: &str,
        requestor: &str,
        request_bytes: usize,
        response: &CapturedResponse,
        elapsed: Duration,
    ) -> Self {
        Self {
            status: Some(response.status()),
            response_bytes: response.body().len(),
            request_bytes,
            ..Self::base(method, url, requestor, elapsed)
        }
    }

    /// Event for an exchange that failed before a response arrived.
    #[must_use]
    pub fn failed(method: Method, url: &str, requestor: &str, error: &RequestError, elapsed: Duration) -> Self {
        Self {
            outcome: error.outcome(),
            error: Some(error.to_string()),
            ..Self::base(method, url, requestor, elapsed)
        }
    }

    /// Shared fields.
    fn base(method: Method, url: &str, requestor: &str, elapsed: Duration) -> Self {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Self {
            event: "http_request",
            timestamp_ms: i64::try_from(millis).unwrap_or(i64::MAX),
            method,
            url: url.to_string(),
            requestor: requestor.to_string(),
            status: None,
            outcome: "ok",
            error: None,
            request_bytes: 0,
            response_bytes: 0,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            headers: HEADERS_REDACTED,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for request log events.
pub trait RequestLog: Send + Sync {
    /// Records an event.
    fn record(&self, event: &RequestLogEvent);
}

/// Errors raised while opening a log sink.
#[derive(Debug, Error)]
pub enum RequestLogError {
    /// The log file could not be opened.
    #[error("request log io error: {0}")]
    Io(String),
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRequestLog;

impl RequestLog for NoopRequestLog {
    fn record(&self, _event: &RequestLogEvent) {}
}

/// Writes events to stderr as JSON lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrRequestLog;

impl RequestLog for StderrRequestLog {
    fn record(&self, event: &RequestLogEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{line}");
        }
    }
}

/// Appends events to a file as JSON lines.
#[derive(Debug)]
pub struct FileRequestLog {
    /// Open file handle.
    file: Mutex<File>,
}

impl FileRequestLog {
    /// Opens or creates the log file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`RequestLogError::Io`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, RequestLogError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| RequestLogError::Io(format!("{}: {err}", path.display())))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RequestLog for FileRequestLog {
    fn record(&self, event: &RequestLogEvent) {
        if let Ok(line) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }
}
