// crates/pedant-http/src/transport.rs
// ============================================================================
// Module: Pedant HTTP Transport
// Description: Blocking HTTP execution of prepared, signed requests.
// Purpose: Issue one request per call and capture status, headers, and body.
// Dependencies: pedant-core, reqwest, url
// ============================================================================

//! ## Overview
//! [`Transport`] prepares a request, hands it to an [`HttpBackend`] and
//! records the exchange in a [`RequestLog`]. [`ReqwestBackend`] performs the
//! live call; [`RecordingBackend`] captures requests in memory for tests.
//!
//! Invariants:
//! - Redirects are never followed; 3xx responses are returned as captured.
//! - Every call is bounded by the configured timeout.
//! - Failures are never retried.
//! - Response bodies are capped at [`MAX_RESPONSE_BYTES`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use pedant_core::CapturedResponse;
use pedant_core::HeaderMap;
use pedant_core::Method;
use pedant_core::Requestor;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::error::RequestError;
use crate::error::TransportError;
use crate::log::NoopRequestLog;
use crate::log::RequestLog;
use crate::log::RequestLogEvent;
use crate::request::PreparedRequest;
use crate::request::RequestDefaults;
use crate::request::RequestOptions;
use crate::request::prepare_request;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum response body size accepted from the server.
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Backend Interface
// ============================================================================

/// Executes prepared requests.
pub trait HttpBackend: Send + Sync {
    /// Sends the request and captures the response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the exchange fails.
    fn send(&self, request: &PreparedRequest) -> Result<CapturedResponse, TransportError>;
}

/// Settings for the live backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendSettings {
    /// Per-call timeout.
    pub timeout: Duration,
    /// Whether TLS certificates are verified.
    pub ssl_verify: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            ssl_verify: true,
        }
    }
}

// ============================================================================
// SECTION: Live Backend
// ============================================================================

/// Backend issuing real HTTP calls with a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    /// Configured HTTP client.
    client: Client,
}

impl ReqwestBackend {
    /// Builds a backend from settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] when the client cannot be built.
    pub fn new(settings: BackendSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(!settings.ssl_verify)
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;
        Ok(Self {
            client,
        })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self {
            client,
        }
    }
}

impl HttpBackend for ReqwestBackend {
    fn send(&self, request: &PreparedRequest) -> Result<CapturedResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if request.method.has_body() || !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        let response = builder.send().map_err(classify)?;

        let status = response.status().as_u16();
        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            headers.insert(name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let limit = u64::try_from(MAX_RESPONSE_BYTES).unwrap_or(u64::MAX).saturating_add(1);
        let mut body = Vec::new();
        response.take(limit).read_to_end(&mut body).map_err(|err| TransportError::Body(err.to_string()))?;
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(TransportError::Body(format!("response exceeds {MAX_RESPONSE_BYTES} bytes")));
        }
        Ok(CapturedResponse::new(status, headers, body))
    }
}

/// Maps reqwest failures onto transport error classes.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

// ============================================================================
// SECTION: Recording Backend
// ============================================================================

/// In-memory backend that records requests and replays queued responses.
///
/// When the queue is empty it answers `200` with an empty JSON object.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    /// Requests in the order they were sent.
    requests: Mutex<Vec<PreparedRequest>>,
    /// Responses handed out in FIFO order.
    responses: Mutex<VecDeque<Result<CapturedResponse, TransportError>>>,
}

impl RecordingBackend {
    /// Creates an empty recording backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: CapturedResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response));
        }
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: TransportError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Returns all recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }

    /// Returns the most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<PreparedRequest> {
        self.requests.lock().ok().and_then(|requests| requests.last().cloned())
    }
}

impl HttpBackend for RecordingBackend {
    fn send(&self, request: &PreparedRequest) -> Result<CapturedResponse, TransportError> {
        self.requests
            .lock()
            .map_err(|_| TransportError::Request("recording lock poisoned".to_string()))?
            .push(request.clone());
        let next = self
            .responses
            .lock()
            .map_err(|_| TransportError::Request("recording lock poisoned".to_string()))?
            .pop_front();
        next.unwrap_or_else(|| Ok(CapturedResponse::new(200, HeaderMap::new(), b"{}".to_vec())))
    }
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Signed request executor shared by scenarios.
///
/// Cloning is cheap; clones share the backend and log but no per-call state.
#[derive(Clone)]
pub struct Transport {
    /// Backend performing the exchange.
    backend: Arc<dyn HttpBackend>,
    /// Values applied to every request.
    defaults: RequestDefaults,
    /// Request log sink.
    log: Arc<dyn RequestLog>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").field("defaults", &self.defaults).finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport over a backend with a no-op log.
    #[must_use]
    pub fn new(backend: Arc<dyn HttpBackend>, defaults: RequestDefaults) -> Self {
        Self {
            backend,
            defaults,
            log: Arc::new(NoopRequestLog),
        }
    }

    /// Replaces the request log.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn RequestLog>) -> Self {
        self.log = log;
        self
    }

    /// Returns the per-request defaults.
    #[must_use]
    pub const fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Executes a request as `requestor`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when the URL is rejected, signing fails, the
    /// payload cannot be serialized, or the network exchange fails.
    pub fn execute(
        &self,
        method: Method,
        url: &str,
        requestor: &Requestor,
        options: &RequestOptions,
    ) -> Result<CapturedResponse, RequestError> {
        let started = Instant::now();
        let outcome = prepare_request(method, url, requestor, options, &self.defaults).and_then(|request| {
            let sent = request.body.len();
            self.backend.send(&request).map(|response| (sent, response)).map_err(RequestError::from)
        });
        let event = match &outcome {
            Ok((sent, response)) => {
                RequestLogEvent::completed(method, url, requestor.name(), *sent, response, started.elapsed())
            }
            Err(err) => RequestLogEvent::failed(method, url, requestor.name(), err, started.elapsed()),
        };
        self.log.record(&event);
        outcome.map(|(_, response)| response)
    }

    /// Executes a GET request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    pub fn get(
        &self,
        url: &str,
        requestor: &Requestor,
        options: &RequestOptions,
    ) -> Result<CapturedResponse, RequestError> {
        self.execute(Method::Get, url, requestor, options)
    }

    /// Executes a PUT request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    pub fn put(
        &self,
        url: &str,
        requestor: &Requestor,
        options: &RequestOptions,
    ) -> Result<CapturedResponse, RequestError> {
        self.execute(Method::Put, url, requestor, options)
    }

    /// Executes a POST request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    pub fn post(
        &self,
        url: &str,
        requestor: &Requestor,
        options: &RequestOptions,
    ) -> Result<CapturedResponse, RequestError> {
        self.execute(Method::Post, url, requestor, options)
    }

    /// Executes a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    pub fn delete(
        &self,
        url: &str,
        requestor: &Requestor,
        options: &RequestOptions,
    ) -> Result<CapturedResponse, RequestError> {
        self.execute(Method::Delete, url, requestor, options)
    }
}
