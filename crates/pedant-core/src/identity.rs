// crates/pedant-core/src/identity.rs
// ============================================================================
// Module: Pedant Identities and Requestors
// Description: Named actors bound to key pairs and signing behavior.
// Purpose: Supply immutable, shareable signers for scenarios.
// Dependencies: serde, time, url
// ============================================================================

//! ## Overview
//! An [`Identity`] is a name, a kind (user or client), a bookkeeping role and a
//! private key. A [`Requestor`] binds an identity to a [`RequestSigner`] and
//! produces signature headers for requests made on its behalf.
//!
//! Invariants:
//! - Identities are immutable; a changed key yields a new value.
//! - Requestors are `Send + Sync` and cheap to clone (the key is shared).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use url::Url;

use crate::headers::HeaderMap;
use crate::keys::PrivateKey;
use crate::method::Method;
use crate::signing::RequestSigner;
use crate::signing::SigningError;
use crate::signing::SigningInput;

// ============================================================================
// SECTION: Identity Kind and Role
// ============================================================================

/// Whether an identity is a user or an API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Human user account (`/users`).
    User,
    /// API client (`/clients`).
    Client,
}

impl IdentityKind {
    /// Returns the collection name used by the server for this kind.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Client => "clients",
        }
    }
}

/// Bookkeeping role of an identity. Not enforced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Server superuser (`pivotal`).
    Superuser,
    /// Organization administrator.
    Admin,
    /// Organization member without admin rights.
    Normal,
    /// Validator client: may create non-admin clients only.
    Validator,
    /// User that is not a member of the organization.
    Outside,
}

impl Role {
    /// Returns the role label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Superuser => "superuser",
            Self::Admin => "admin",
            Self::Normal => "normal",
            Self::Validator => "validator",
            Self::Outside => "outside",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "superuser" => Ok(Self::Superuser),
            "admin" => Ok(Self::Admin),
            "normal" => Ok(Self::Normal),
            "validator" => Ok(Self::Validator),
            "outside" => Ok(Self::Outside),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// A named actor with a private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Unique name within a run.
    name: String,
    /// User or client.
    kind: IdentityKind,
    /// Bookkeeping role.
    role: Role,
    /// Whether the identity has admin rights on its organization.
    admin: bool,
    /// Shared signing key.
    key: Arc<PrivateKey>,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: IdentityKind, role: Role, key: PrivateKey) -> Self {
        Self {
            name: name.into(),
            kind,
            role,
            admin: matches!(role, Role::Admin | Role::Superuser),
            key: Arc::new(key),
        }
    }

    /// Returns a copy with the admin flag overridden.
    #[must_use]
    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// Returns a new identity carrying a different key.
    #[must_use]
    pub fn with_key(&self, key: PrivateKey) -> Self {
        Self {
            key: Arc::new(key),
            ..self.clone()
        }
    }

    /// Returns the identity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the identity kind.
    #[must_use]
    pub const fn kind(&self) -> IdentityKind {
        self.kind
    }

    /// Returns the bookkeeping role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns true when the identity is an organization admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.admin
    }

    /// Returns the private key.
    #[must_use]
    pub fn key(&self) -> &PrivateKey {
        &self.key
    }
}

// ============================================================================
// SECTION: Requestor
// ============================================================================

/// An identity bound to a signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requestor {
    /// Signing identity.
    identity: Identity,
    /// Signing protocol.
    signer: RequestSigner,
}

impl Requestor {
    /// Creates a requestor using the given signer.
    #[must_use]
    pub const fn new(identity: Identity, signer: RequestSigner) -> Self {
        Self {
            identity,
            signer,
        }
    }

    /// Returns the identity name, for use in expected response bodies.
    #[must_use]
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Returns the wrapped identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the signer.
    #[must_use]
    pub const fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// Returns a requestor for the same identity using another signer.
    #[must_use]
    pub fn with_signer(&self, signer: RequestSigner) -> Self {
        Self {
            identity: self.identity.clone(),
            signer,
        }
    }

    /// Produces signature headers signed at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when signing fails.
    pub fn signing_headers(&self, method: Method, url: &Url, body: &[u8]) -> Result<HeaderMap, SigningError> {
        self.sign(method, url, body, None)
    }

    /// Produces signature headers signed at an explicit time.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when signing fails.
    pub fn signing_headers_at(
        &self,
        method: Method,
        url: &Url,
        body: &[u8],
        timestamp: OffsetDateTime,
    ) -> Result<HeaderMap, SigningError> {
        self.sign(method, url, body, Some(timestamp))
    }

    /// Delegates to the signer with this identity's key.
    fn sign(
        &self,
        method: Method,
        url: &Url,
        body: &[u8],
        timestamp: Option<OffsetDateTime>,
    ) -> Result<HeaderMap, SigningError> {
        self.signer.sign(
            &SigningInput {
                method,
                url,
                body,
                user_id: self.identity.name(),
                timestamp,
            },
            self.identity.key(),
        )
    }
}
