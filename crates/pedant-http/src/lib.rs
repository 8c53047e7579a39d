// crates/pedant-http/src/lib.rs
// ============================================================================
// Module: Pedant HTTP Library
// Description: Signed request execution and key management.
// Purpose: Carry signed requests to the server under test and back.
// Dependencies: pedant-core, reqwest, serde, serde_json, tempfile, time, url
// ============================================================================

//! ## Overview
//! [`Transport::execute`] validates the URL, serializes the payload, signs
//! the exact body bytes, layers headers and performs one blocking HTTP call.
//! Every exchange is reported to a [`RequestLog`]. The [`KeyManager`] trait
//! abstracts how identity public keys are added, deleted and listed.
//!
//! Invariants:
//! - [`InvalidUrlError`] is raised before any network activity.
//! - Transports share no mutable per-call state.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod keys;
pub mod log;
pub mod request;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::InvalidUrlError;
pub use error::RequestError;
pub use error::TransportError;
pub use keys::ApiKeyManager;
pub use keys::CtlKeyManager;
pub use keys::DEFAULT_CTL_COMMAND;
pub use keys::KeyManagementError;
pub use keys::KeyManager;
pub use keys::KeyOwner;
pub use keys::KeyRecord;
pub use keys::NewKey;
pub use log::FileRequestLog;
pub use log::NoopRequestLog;
pub use log::RequestLog;
pub use log::RequestLogError;
pub use log::RequestLogEvent;
pub use log::StderrRequestLog;
pub use request::DEFAULT_CHEF_VERSION;
pub use request::DEFAULT_USER_AGENT;
pub use request::Payload;
pub use request::PreparedRequest;
pub use request::RequestDefaults;
pub use request::RequestOptions;
pub use request::parse_request_url;
pub use request::prepare_request;
pub use transport::BackendSettings;
pub use transport::HttpBackend;
pub use transport::RecordingBackend;
pub use transport::ReqwestBackend;
pub use transport::Transport;

#[cfg(test)]
mod tests;
