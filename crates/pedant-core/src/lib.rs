// crates/pedant-core/src/lib.rs
// ============================================================================
// Module: Pedant Core Library
// Description: Request signing, identities, and response matching.
// Purpose: Provide the network-free core every conformance scenario uses.
// Dependencies: base64, regex, rsa, serde_jcs, serde_json, sha1, sha2, time, url
// ============================================================================

//! ## Overview
//! Pedant Core signs requests on behalf of named identities and judges the
//! responses a server returns. It performs no I/O apart from optional key file
//! loading.
//!
//! - [`RequestSigner`] turns a method, URL, body and key into the `X-Ops-*`
//!   authentication headers.
//! - [`Requestor`] binds an [`Identity`] to a signer.
//! - [`matches`] compares a [`CapturedResponse`] against a
//!   [`ResponseExpectation`] and reports a [`MatchResult`].
//!
//! Invariants:
//! - Signing with an explicit timestamp is deterministic.
//! - Identities, requestors and expectations are immutable and `Send + Sync`.
//! - Matching never fails with an error; mismatches are values.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth_mutation;
pub mod darklaunch;
pub mod expectation;
pub mod hashing;
pub mod headers;
pub mod identity;
pub mod keys;
pub mod matcher;
pub mod method;
pub mod response;
pub mod signing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth_mutation::AuthMutation;
pub use darklaunch::DarklaunchFlags;
pub use expectation::CollectionMode;
pub use expectation::Expect;
pub use expectation::ExpectationError;
pub use expectation::ListOrder;
pub use expectation::ResponseExpectation;
pub use hashing::CanonicalJsonError;
pub use hashing::DigestAlgorithm;
pub use headers::HeaderMap;
pub use identity::Identity;
pub use identity::IdentityKind;
pub use identity::Requestor;
pub use identity::Role;
pub use keys::PrivateKey;
pub use keys::PublicKey;
pub use matcher::MatchResult;
pub use matcher::Mismatch;
pub use matcher::MismatchReason;
pub use matcher::matches;
pub use method::Method;
pub use response::CapturedResponse;
pub use signing::RequestSigner;
pub use signing::SignVersion;
pub use signing::SigningError;
pub use signing::SigningInput;
pub use signing::VerificationError;
