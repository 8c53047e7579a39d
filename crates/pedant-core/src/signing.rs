// crates/pedant-core/src/signing.rs
// ============================================================================
// Module: Pedant Canonical Request Signer
// Description: Deterministic RSA request signing and signature verification.
// Purpose: Produce the bit-exact authentication headers the server expects.
// Dependencies: rsa, sha1, sha2, time, url
// ============================================================================

//! ## Overview
//! The signer builds a canonical request string from the method, canonical
//! path, body digest, timestamp and user id, signs it with the identity's RSA
//! key, and emits the `X-Ops-*` header set. The base64 signature is split
//! into numbered `X-Ops-Authorization-N` headers of at most
//! [`SIGNATURE_CHUNK_LEN`] characters.
//!
//! Protocol versions:
//! - `1.0`: SHA-1 digests, raw user id, RSA private-encrypt of the canonical
//!   string (PKCS#1 v1.5 type 1 padding, no digest prefix).
//! - `1.1`: as `1.0` but the user id is replaced by its base64 SHA-1 digest.
//! - `1.3`: SHA-256 digests and a PKCS#1 v1.5 SHA-256 signature; the canonical
//!   string also covers the sign version and server API version.
//!
//! Invariants:
//! - Signing is a pure function of its inputs once the timestamp is fixed.
//! - Concatenating the authorization chunks in increasing `N` order yields the
//!   unchunked base64 signature.
//! - Query strings never contribute to the canonical path.
//!
//! Security posture: request bodies and URLs are untrusted test data; they are
//! hashed, never interpreted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::Pkcs1v15Sign;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

use crate::hashing::DigestAlgorithm;
use crate::hashing::base64_digest;
use crate::headers::HeaderMap;
use crate::headers::X_OPS_AUTHORIZATION_PREFIX;
use crate::headers::X_OPS_CONTENT_HASH;
use crate::headers::X_OPS_SERVER_API_VERSION;
use crate::headers::X_OPS_SIGN;
use crate::headers::X_OPS_TIMESTAMP;
use crate::headers::X_OPS_USERID;
use crate::keys::PrivateKey;
use crate::keys::PublicKey;
use crate::method::Method;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters per `X-Ops-Authorization-N` header value.
pub const SIGNATURE_CHUNK_LEN: usize = 60;

/// Upper bound on authorization chunks accepted during verification.
const MAX_SIGNATURE_CHUNKS: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while producing signature headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// The private key could not be decoded or loaded.
    #[error("malformed private key: {0}")]
    MalformedKey(String),
    /// The timestamp cannot be rendered in the canonical format.
    #[error("invalid signing timestamp: {0}")]
    Timestamp(String),
    /// The RSA operation failed.
    #[error("rsa signing failed: {0}")]
    Crypto(String),
}

/// Errors raised while verifying a signed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// A required signing header is absent.
    #[error("missing header: {0}")]
    MissingHeader(String),
    /// The `X-Ops-Sign` header names an unknown protocol.
    #[error("unsupported sign description: {0}")]
    UnsupportedVersion(String),
    /// The timestamp header is not a canonical UTC timestamp.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// The body digest does not match the content hash header.
    #[error("content hash mismatch")]
    ContentHashMismatch,
    /// The signature chunks are malformed or do not verify.
    #[error("bad signature: {0}")]
    BadSignature(String),
}

// ============================================================================
// SECTION: Protocol Version
// ============================================================================

/// Signing protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignVersion {
    /// Protocol `1.0`.
    #[default]
    #[serde(rename = "1.0")]
    V1_0,
    /// Protocol `1.1`.
    #[serde(rename = "1.1")]
    V1_1,
    /// Protocol `1.3`.
    #[serde(rename = "1.3")]
    V1_3,
}

impl SignVersion {
    /// Returns the version label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V1_3 => "1.3",
        }
    }

    /// Returns the digest algorithm bound to this version.
    #[must_use]
    pub const fn digest(self) -> DigestAlgorithm {
        match self {
            Self::V1_0 | Self::V1_1 => DigestAlgorithm::Sha1,
            Self::V1_3 => DigestAlgorithm::Sha256,
        }
    }

    /// Returns the `X-Ops-Sign` header value for this version.
    #[must_use]
    pub fn sign_description(self) -> String {
        format!("algorithm={};version={};", self.digest().as_str(), self.as_str())
    }

    /// Parses an `X-Ops-Sign` header value such as `algorithm=sha1;version=1.0;`.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::UnsupportedVersion`] for unknown versions
    /// or when the declared algorithm disagrees with the version.
    pub fn from_sign_description(value: &str) -> Result<Self, VerificationError> {
        let mut algorithm = None;
        let mut version = None;
        for part in value.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            match part.split_once('=') {
                Some(("algorithm", alg)) => algorithm = Some(alg),
                Some(("version", ver)) => version = Some(ver),
                _ => {}
            }
        }
        let parsed = version
            .and_then(|ver| ver.parse::<Self>().ok())
            .ok_or_else(|| VerificationError::UnsupportedVersion(value.to_string()))?;
        if let Some(alg) = algorithm
            && alg != parsed.digest().as_str()
        {
            return Err(VerificationError::UnsupportedVersion(value.to_string()));
        }
        Ok(parsed)
    }
}

impl fmt::Display for SignVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1.0" => Ok(Self::V1_0),
            "1.1" => Ok(Self::V1_1),
            "1.3" => Ok(Self::V1_3),
            other => Err(format!("unsupported signing version: {other}")),
        }
    }
}

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Inputs to a single signing operation.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URL; only its path is signed.
    pub url: &'a Url,
    /// Exact body bytes that will be transmitted.
    pub body: &'a [u8],
    /// Requesting identity name.
    pub user_id: &'a str,
    /// Signing time; `None` uses the current UTC time.
    pub timestamp: Option<OffsetDateTime>,
}

/// Canonical request signer for one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestSigner {
    /// Protocol version.
    version: SignVersion,
    /// Server API version sent with protocol `1.3`.
    server_api_version: u32,
}

impl RequestSigner {
    /// Creates a signer for the given protocol version.
    #[must_use]
    pub const fn new(version: SignVersion) -> Self {
        Self {
            version,
            server_api_version: 0,
        }
    }

    /// Returns a copy that advertises the given server API version.
    #[must_use]
    pub const fn with_server_api_version(mut self, server_api_version: u32) -> Self {
        self.server_api_version = server_api_version;
        self
    }

    /// Returns the protocol version.
    #[must_use]
    pub const fn version(&self) -> SignVersion {
        self.version
    }

    /// Returns the server API version.
    #[must_use]
    pub const fn server_api_version(&self) -> u32 {
        self.server_api_version
    }

    /// Produces the signature headers for a request.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when the timestamp cannot be formatted or the
    /// RSA operation fails.
    pub fn sign(&self, input: &SigningInput<'_>, key: &PrivateKey) -> Result<HeaderMap, SigningError> {
        let timestamp = canonical_time(input.timestamp.unwrap_or_else(OffsetDateTime::now_utc))?;
        let content_hash = base64_digest(self.version.digest(), input.body);
        let canonical = canonical_request(&CanonicalFields {
            version: self.version,
            method: input.method,
            path: input.url.path(),
            content_hash: &content_hash,
            timestamp: &timestamp,
            user_id: input.user_id,
            server_api_version: self.server_api_version,
        });
        let signature = STANDARD.encode(rsa_sign(self.version, key, canonical.as_bytes())?);

        let mut headers = HeaderMap::new();
        headers.insert(X_OPS_SIGN, self.version.sign_description());
        headers.insert(X_OPS_USERID, input.user_id);
        headers.insert(X_OPS_TIMESTAMP, timestamp);
        headers.insert(X_OPS_CONTENT_HASH, content_hash);
        if self.version == SignVersion::V1_3 {
            headers.insert(X_OPS_SERVER_API_VERSION, self.server_api_version.to_string());
        }
        for (index, chunk) in chunk_signature(&signature).into_iter().enumerate() {
            headers.insert(authorization_header(index + 1), chunk);
        }
        Ok(headers)
    }
}

/// Signs a request with the default protocol (`1.0`).
///
/// # Errors
///
/// Returns [`SigningError`] when signing fails.
pub fn sign(
    method: Method,
    url: &Url,
    body: &[u8],
    user_id: &str,
    key: &PrivateKey,
    timestamp: Option<OffsetDateTime>,
) -> Result<HeaderMap, SigningError> {
    RequestSigner::default().sign(
        &SigningInput {
            method,
            url,
            body,
            user_id,
            timestamp,
        },
        key,
    )
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Fields covered by the canonical request string.
struct CanonicalFields<'a> {
    /// Protocol version.
    version: SignVersion,
    /// HTTP method.
    method: Method,
    /// Raw request path (not yet canonicalized).
    path: &'a str,
    /// Base64 body digest.
    content_hash: &'a str,
    /// Canonical timestamp text.
    timestamp: &'a str,
    /// Requesting identity name.
    user_id: &'a str,
    /// Server API version (protocol `1.3` only).
    server_api_version: u32,
}

/// Builds the newline-joined canonical request string.
fn canonical_request(fields: &CanonicalFields<'_>) -> String {
    let path = canonical_path(fields.path);
    let method = fields.method.as_str();
    match fields.version {
        SignVersion::V1_0 | SignVersion::V1_1 => {
            let hashed_path = base64_digest(DigestAlgorithm::Sha1, path.as_bytes());
            let user_id = if fields.version == SignVersion::V1_1 {
                base64_digest(DigestAlgorithm::Sha1, fields.user_id.as_bytes())
            } else {
                fields.user_id.to_string()
            };
            format!(
                "Method:{method}\nHashed Path:{hashed_path}\nX-Ops-Content-Hash:{}\nX-Ops-Timestamp:{}\nX-Ops-UserId:{user_id}",
                fields.content_hash, fields.timestamp
            )
        }
        SignVersion::V1_3 => format!(
            "Method:{method}\nPath:{path}\nX-Ops-Content-Hash:{}\nX-Ops-Sign:version={}\nX-Ops-Timestamp:{}\nX-Ops-UserId:{}\nX-Ops-Server-API-Version:{}",
            fields.content_hash,
            fields.version.as_str(),
            fields.timestamp,
            fields.user_id,
            fields.server_api_version
        ),
    }
}

/// Returns the canonical form of a request path.
///
/// Repeated slashes collapse to one and a trailing slash is dropped unless the
/// path is the root.
#[must_use]
pub fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len().max(1));
    for ch in path.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SSZ` in UTC.
///
/// # Errors
///
/// Returns [`SigningError::Timestamp`] when the year is outside `0..=9999`.
pub fn canonical_time(timestamp: OffsetDateTime) -> Result<String, SigningError> {
    let utc = timestamp.to_offset(time::UtcOffset::UTC);
    let year = utc.year();
    if !(0 ..= 9999).contains(&year) {
        return Err(SigningError::Timestamp(format!("year {year} is outside 0000-9999")));
    }
    Ok(format!(
        "{year:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        u8::from(utc.month()),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second()
    ))
}

/// Parses a canonical timestamp header value.
///
/// # Errors
///
/// Returns [`VerificationError::InvalidTimestamp`] when the value is not a
/// `YYYY-MM-DDTHH:MM:SSZ` timestamp.
pub fn parse_canonical_time(value: &str) -> Result<OffsetDateTime, VerificationError> {
    if value.len() != 20 || !value.ends_with('Z') {
        return Err(VerificationError::InvalidTimestamp(value.to_string()));
    }
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|err| VerificationError::InvalidTimestamp(format!("{value}: {err}")))
}

/// Splits a base64 signature into chunks of at most [`SIGNATURE_CHUNK_LEN`].
#[must_use]
pub fn chunk_signature(signature: &str) -> Vec<String> {
    signature
        .as_bytes()
        .chunks(SIGNATURE_CHUNK_LEN)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Returns the header name for the 1-based authorization chunk index.
#[must_use]
pub fn authorization_header(index: usize) -> String {
    format!("{X_OPS_AUTHORIZATION_PREFIX}{index}")
}

/// Reassembles the signature from numbered authorization headers.
///
/// Chunks are read from `X-Ops-Authorization-1` upward until the first gap.
#[must_use]
pub fn reassemble_signature(headers: &HeaderMap) -> Option<String> {
    let mut signature = String::new();
    for index in 1 ..= MAX_SIGNATURE_CHUNKS {
        match headers.get(&authorization_header(index)) {
            Some(chunk) => signature.push_str(chunk),
            None => break,
        }
    }
    if signature.is_empty() { None } else { Some(signature) }
}

// ============================================================================
// SECTION: RSA Operations
// ============================================================================

/// Signs canonical bytes according to the protocol version.
fn rsa_sign(version: SignVersion, key: &PrivateKey, canonical: &[u8]) -> Result<Vec<u8>, SigningError> {
    let result = match version {
        SignVersion::V1_0 | SignVersion::V1_1 => {
            key.rsa().sign(Pkcs1v15Sign::new_unprefixed(), canonical)
        }
        SignVersion::V1_3 => {
            let digest = DigestAlgorithm::Sha256.digest(canonical);
            key.rsa().sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        }
    };
    result.map_err(|err| SigningError::Crypto(err.to_string()))
}

/// Verifies raw signature bytes according to the protocol version.
fn rsa_verify(
    version: SignVersion,
    key: &PublicKey,
    canonical: &[u8],
    signature: &[u8],
) -> Result<(), VerificationError> {
    let result = match version {
        SignVersion::V1_0 | SignVersion::V1_1 => {
            key.rsa().verify(Pkcs1v15Sign::new_unprefixed(), canonical, signature)
        }
        SignVersion::V1_3 => {
            let digest = DigestAlgorithm::Sha256.digest(canonical);
            key.rsa().verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        }
    };
    result.map_err(|err| VerificationError::BadSignature(err.to_string()))
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Authenticated facts recovered from a verified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    /// Requesting identity name.
    pub user_id: String,
    /// Protocol version used.
    pub version: SignVersion,
    /// Signing time.
    pub timestamp: OffsetDateTime,
}

/// Verifies the signature headers of a received request.
///
/// `path` is the request path as received (query stripped or not; anything
/// after `?` is ignored). Timestamp freshness is left to the caller.
///
/// # Errors
///
/// Returns [`VerificationError`] describing the first failed check.
pub fn verify_signature(
    method: Method,
    path: &str,
    body: &[u8],
    headers: &HeaderMap,
    key: &PublicKey,
) -> Result<VerifiedSignature, VerificationError> {
    let required = |name: &str| {
        headers.get(name).ok_or_else(|| VerificationError::MissingHeader(name.to_string()))
    };
    let version = SignVersion::from_sign_description(required(X_OPS_SIGN)?)?;
    let user_id = required(X_OPS_USERID)?;
    let timestamp_text = required(X_OPS_TIMESTAMP)?;
    let content_hash = required(X_OPS_CONTENT_HASH)?;
    let timestamp = parse_canonical_time(timestamp_text)?;
    if base64_digest(version.digest(), body) != content_hash {
        return Err(VerificationError::ContentHashMismatch);
    }
    let server_api_version = if version == SignVersion::V1_3 {
        required(X_OPS_SERVER_API_VERSION)?
            .parse::<u32>()
            .map_err(|err| VerificationError::MissingHeader(format!("{X_OPS_SERVER_API_VERSION}: {err}")))?
    } else {
        0
    };
    let signature = reassemble_signature(headers)
        .ok_or_else(|| VerificationError::MissingHeader(authorization_header(1)))?;
    let raw = STANDARD
        .decode(signature.as_bytes())
        .map_err(|err| VerificationError::BadSignature(err.to_string()))?;
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    let canonical = canonical_request(&CanonicalFields {
        version,
        method,
        path,
        content_hash,
        timestamp: timestamp_text,
        user_id,
        server_api_version,
    });
    rsa_verify(version, key, canonical.as_bytes(), &raw)?;
    Ok(VerifiedSignature {
        user_id: user_id.to_string(),
        version,
        timestamp,
    })
}

/// Returns the canonical request string for inspection in diagnostics.
///
/// # Errors
///
/// Returns [`SigningError::Timestamp`] when the timestamp cannot be formatted.
pub fn canonical_request_string(
    signer: &RequestSigner,
    input: &SigningInput<'_>,
) -> Result<String, SigningError> {
    let timestamp = canonical_time(input.timestamp.unwrap_or_else(OffsetDateTime::now_utc))?;
    let content_hash = base64_digest(signer.version.digest(), input.body);
    Ok(canonical_request(&CanonicalFields {
        version: signer.version,
        method: input.method,
        path: input.url.path(),
        content_hash: &content_hash,
        timestamp: &timestamp,
        user_id: input.user_id,
        server_api_version: signer.server_api_version,
    }))
}

/// Builds a UTC timestamp from calendar parts; used by fixtures and mutations.
///
/// # Errors
///
/// Returns [`SigningError::Timestamp`] for out-of-range components.
pub fn utc_timestamp(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> Result<OffsetDateTime, SigningError> {
    let month = time::Month::try_from(month).map_err(|err| SigningError::Timestamp(err.to_string()))?;
    let date = time::Date::from_calendar_date(year, month, day)
        .map_err(|err| SigningError::Timestamp(err.to_string()))?;
    let clock = time::Time::from_hms(hour, minute, second)
        .map_err(|err| SigningError::Timestamp(err.to_string()))?;
    Ok(PrimitiveDateTime::new(date, clock).assume_utc())
}
