// crates/pedant-core/src/hashing.rs
// ============================================================================
// Module: Pedant Canonical Hashing
// Description: Canonical JSON serialization and base64 content digests.
// Purpose: Produce the exact payload bytes and digests used in request signing.
// Dependencies: base64, serde, serde_jcs, sha1, sha2
// ============================================================================

//! ## Overview
//! Structured payloads are serialized with RFC 8785 (JCS) so the bytes that are
//! hashed, signed and transmitted are identical across runs. Digests are
//! base64-encoded (standard alphabet, padded, no line breaks) as expected by the
//! `X-Ops-Content-Hash` and `Hashed Path` protocol fields.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use sha1::Sha1;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Digest Algorithm
// ============================================================================

/// Digest algorithms used by the signing protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-1 (protocol versions 1.0 and 1.1).
    Sha1,
    /// SHA-256 (protocol version 1.3).
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the protocol label used in the `X-Ops-Sign` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Returns the raw digest of the provided bytes.
    #[must_use]
    pub fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(bytes).to_vec(),
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when producing canonical payload bytes.
#[derive(Debug, Error)]
pub enum CanonicalJsonError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON text for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`CanonicalJsonError::Canonicalization`] when serialization fails.
pub fn canonical_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalJsonError> {
    serde_jcs::to_string(value).map_err(|err| CanonicalJsonError::Canonicalization(err.to_string()))
}

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`CanonicalJsonError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalJsonError> {
    serde_jcs::to_vec(value).map_err(|err| CanonicalJsonError::Canonicalization(err.to_string()))
}

/// Hashes bytes and returns the base64 encoding of the digest.
#[must_use]
pub fn base64_digest(algorithm: DigestAlgorithm, bytes: &[u8]) -> String {
    STANDARD.encode(algorithm.digest(bytes))
}

/// Base64-encodes raw bytes without line wrapping.
#[must_use]
pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
