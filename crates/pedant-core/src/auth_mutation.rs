// crates/pedant-core/src/auth_mutation.rs
// ============================================================================
// Module: Pedant Authentication Header Mutations
// Description: Negative-authentication header sets derived from valid ones.
// Purpose: Exercise server rejection of missing, stale, or forged signatures.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Each [`AuthMutation`] starts from a correctly signed header set and breaks
//! exactly one aspect of it. The result is meant to be passed to the transport
//! as verbatim `auth_headers`, bypassing the signer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::Duration;
use time::OffsetDateTime;
use url::Url;

use crate::headers::HeaderMap;
use crate::headers::X_OPS_AUTHORIZATION_PREFIX;
use crate::headers::X_OPS_CONTENT_HASH;
use crate::headers::X_OPS_SIGN;
use crate::headers::X_OPS_TIMESTAMP;
use crate::headers::X_OPS_USERID;
use crate::identity::Requestor;
use crate::method::Method;
use crate::signing::SigningError;
use crate::signing::authorization_header;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Clock skew beyond which the server rejects a signature.
pub const EXPIRED_SKEW: Duration = Duration::minutes(20);

/// Status the server returns for every rejected authentication attempt.
pub const REJECTED_STATUS: u16 = 401;

// ============================================================================
// SECTION: Mutations
// ============================================================================

/// A single way of breaking a valid signature header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMutation {
    /// Removes the named header.
    Drop(String),
    /// Sets the named header to an empty string.
    Blank(String),
    /// Flips characters in the first authorization chunk.
    CorruptSignature,
    /// Claims to be a different user id.
    WrongUserId(String),
    /// Replaces the timestamp with a non-canonical format.
    BadTimestampFormat,
    /// Signs the request well in the past.
    ExpiredTimestamp,
    /// Signs the request well in the future.
    FutureTimestamp,
    /// Removes the last authorization chunk.
    TruncatedSignature,
    /// Claims an unknown protocol version.
    UnsupportedVersion,
    /// Changes the content hash so it no longer matches the body.
    WrongContentHash,
}

impl AuthMutation {
    /// Returns the standard mutation catalog.
    #[must_use]
    pub fn catalog() -> Vec<Self> {
        let mut out = Vec::new();
        for header in [X_OPS_USERID, X_OPS_TIMESTAMP, X_OPS_CONTENT_HASH, X_OPS_SIGN] {
            out.push(Self::Drop(header.to_string()));
            out.push(Self::Blank(header.to_string()));
        }
        out.push(Self::Drop(authorization_header(1)));
        out.extend([
            Self::CorruptSignature,
            Self::WrongUserId("pedant-nobody".to_string()),
            Self::BadTimestampFormat,
            Self::ExpiredTimestamp,
            Self::FutureTimestamp,
            Self::TruncatedSignature,
            Self::UnsupportedVersion,
            Self::WrongContentHash,
        ]);
        out
    }

    /// Returns a stable label used in scenario names.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Drop(header) => format!("missing {header}"),
            Self::Blank(header) => format!("blank {header}"),
            Self::CorruptSignature => "corrupt signature".to_string(),
            Self::WrongUserId(user) => format!("user id {user}"),
            Self::BadTimestampFormat => "malformed timestamp".to_string(),
            Self::ExpiredTimestamp => "expired timestamp".to_string(),
            Self::FutureTimestamp => "future timestamp".to_string(),
            Self::TruncatedSignature => "truncated signature".to_string(),
            Self::UnsupportedVersion => "unsupported sign version".to_string(),
            Self::WrongContentHash => "wrong content hash".to_string(),
        }
    }

    /// Returns the status the server must answer with.
    #[must_use]
    pub const fn expected_status(&self) -> u16 {
        REJECTED_STATUS
    }

    /// Produces the mutated header set for a request.
    ///
    /// `now` anchors the expired and future timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when the base signature cannot be produced.
    pub fn headers_for(
        &self,
        requestor: &Requestor,
        method: Method,
        url: &Url,
        body: &[u8],
        now: OffsetDateTime,
    ) -> Result<HeaderMap, SigningError> {
        let signed_at = match self {
            Self::ExpiredTimestamp => now - EXPIRED_SKEW,
            Self::FutureTimestamp => now + EXPIRED_SKEW,
            _ => now,
        };
        let headers = requestor.signing_headers_at(method, url, body, signed_at)?;
        Ok(self.apply(headers))
    }

    /// Applies the mutation to an already signed header set.
    ///
    /// Timestamp-shift mutations need a fresh signature and are returned
    /// unchanged here; use [`AuthMutation::headers_for`] for those.
    #[must_use]
    pub fn apply(&self, mut headers: HeaderMap) -> HeaderMap {
        match self {
            Self::Drop(header) => {
                headers.remove(header);
            }
            Self::Blank(header) => {
                headers.insert(header.clone(), "");
            }
            Self::CorruptSignature => {
                let name = authorization_header(1);
                if let Some(chunk) = headers.get(&name) {
                    let corrupted = corrupt_base64(chunk);
                    headers.insert(name, corrupted);
                }
            }
            Self::WrongUserId(user) => {
                headers.insert(X_OPS_USERID, user.clone());
            }
            Self::BadTimestampFormat => {
                headers.insert(X_OPS_TIMESTAMP, "Thu, 01 Jan 1970 00:00:00 GMT");
            }
            Self::ExpiredTimestamp | Self::FutureTimestamp => {}
            Self::TruncatedSignature => {
                let last = headers
                    .iter()
                    .filter_map(|(name, _)| authorization_index(name))
                    .max();
                if let Some(index) = last {
                    headers.remove(&authorization_header(index));
                }
            }
            Self::UnsupportedVersion => {
                headers.insert(X_OPS_SIGN, "algorithm=sha1;version=9.9;");
            }
            Self::WrongContentHash => {
                headers.insert(X_OPS_CONTENT_HASH, "AAAAAAAAAAAAAAAAAAAAAAAAAAA=");
            }
        }
        headers
    }
}

/// Parses the chunk index from an authorization header name.
fn authorization_index(name: &str) -> Option<usize> {
    let prefix = X_OPS_AUTHORIZATION_PREFIX;
    let head = name.get(.. prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    name.get(prefix.len() ..)?.parse().ok()
}

/// Rotates every base64 letter so the chunk stays well-formed but wrong.
fn corrupt_base64(chunk: &str) -> String {
    chunk
        .chars()
        .map(|ch| match ch {
            'a' ..= 'y' | 'A' ..= 'Y' => char::from_u32(u32::from(ch) + 1).unwrap_or(ch),
            'z' => 'a',
            'Z' => 'A',
            other => other,
        })
        .collect()
}
