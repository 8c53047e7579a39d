// crates/pedant-harness/src/platform.rs
// ============================================================================
// Module: Pedant Platform Registry
// Description: Server connection, baseline identities, and their lifecycle.
// Purpose: Provide the one shared fixture context every scenario runs against.
// Dependencies: pedant-config, pedant-core, pedant-http, serde_json, url
// ============================================================================

//! ## Overview
//! A [`Platform`] moves through `Uninitialized -> Configured -> Ready ->
//! TornDown`. [`Platform::configure`] loads keys and builds requestors
//! without touching the network. [`Platform::setup`] checks the server is
//! reachable and provisions baseline identities marked `create = true`.
//! [`Platform::teardown`] deletes exactly the identities setup created.
//!
//! Invariants:
//! - Setup happens before any scenario and teardown after all of them; the
//!   platform is only read while scenarios run.
//! - An identity that already exists on the server (409) counts as success
//!   and is never deleted on teardown.
//! - Any transport failure during setup is a fatal [`PlatformSetupError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pedant_config::KeyManagementMode;
use pedant_config::PedantConfig;
use pedant_config::RequestorConfig;
use pedant_core::CapturedResponse;
use pedant_core::Identity;
use pedant_core::IdentityKind;
use pedant_core::PrivateKey;
use pedant_core::RequestSigner;
use pedant_core::Requestor;
use pedant_core::Role;
use pedant_core::keys::DEFAULT_KEY_BITS;
use pedant_http::ApiKeyManager;
use pedant_http::BackendSettings;
use pedant_http::CtlKeyManager;
use pedant_http::KeyManager;
use pedant_http::RequestDefaults;
use pedant_http::RequestError;
use pedant_http::RequestLog;
use pedant_http::RequestOptions;
use pedant_http::ReqwestBackend;
use pedant_http::Transport;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Password given to users provisioned by the suite.
pub const DEFAULT_USER_PASSWORD: &str = "opensesame123";

/// Email domain for provisioned users.
pub const PROVISIONED_EMAIL_DOMAIN: &str = "pedant.invalid";

// ============================================================================
// SECTION: State
// ============================================================================

/// Lifecycle state of a [`Platform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformState {
    /// Nothing loaded yet.
    Uninitialized,
    /// Keys loaded and transport built; nothing sent.
    Configured,
    /// Server verified and baseline identities provisioned.
    Ready,
    /// Created identities deleted.
    TornDown,
}

impl PlatformState {
    /// Returns the state label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Ready => "ready",
            Self::TornDown => "torn_down",
        }
    }
}

impl fmt::Display for PlatformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal failures while preparing the platform. No scenario runs after one.
#[derive(Debug, Error)]
pub enum PlatformSetupError {
    /// Configuration could not be turned into a platform.
    #[error("platform configuration error: {0}")]
    Config(String),
    /// A private key could not be loaded.
    #[error("cannot load key for {name}: {detail}")]
    Key {
        /// Identity name.
        name: String,
        /// Failure detail.
        detail: String,
    },
    /// The server could not be reached.
    #[error("server unreachable: {0}")]
    Unreachable(String),
    /// The superuser credentials were rejected.
    #[error("superuser {name} was rejected with status {status}")]
    Superuser {
        /// Superuser name.
        name: String,
        /// HTTP status.
        status: u16,
    },
    /// A baseline identity could not be created.
    #[error("cannot provision {name}: status {status}: {body}")]
    Provision {
        /// Identity name.
        name: String,
        /// HTTP status.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// A lifecycle call was made in the wrong state.
    #[error("platform is {actual}, expected {expected}")]
    State {
        /// State the call requires.
        expected: PlatformState,
        /// Current state.
        actual: PlatformState,
    },
}

/// Identity lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Identities are only available once the platform is ready.
    #[error("platform is {0}, identities are unavailable")]
    NotReady(PlatformState),
    /// No identity is configured for the role.
    #[error("no identity configured for role {0}")]
    UnknownRole(Role),
    /// No identity has the name.
    #[error("no identity named {0}")]
    UnknownIdentity(String),
}

// ============================================================================
// SECTION: Teardown Report
// ============================================================================

/// Result of [`Platform::teardown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Identities deleted, as `collection/name`.
    pub deleted: Vec<String>,
    /// Deletions that failed, with detail.
    pub failures: Vec<String>,
}

impl TeardownReport {
    /// Returns true when every deletion succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// SECTION: Platform
// ============================================================================

/// Identity waiting for setup.
#[derive(Debug, Clone)]
struct PendingIdentity {
    /// Configured entry.
    config: RequestorConfig,
    /// Key loaded from `key_path`, if configured.
    key: Option<PrivateKey>,
}

/// Identity created by setup and owed a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CreatedIdentity {
    /// User or client.
    kind: IdentityKind,
    /// Identity name.
    name: String,
}

/// Shared fixture context: server location, requestors, and key manager.
pub struct Platform {
    /// Lifecycle state.
    state: PlatformState,
    /// Server root URL.
    server_url: Url,
    /// Organization for org-scoped endpoints.
    org: Option<String>,
    /// Transport shared by all scenarios.
    transport: Transport,
    /// Signing protocol for every identity.
    signer: RequestSigner,
    /// Superuser requestor.
    superuser: Requestor,
    /// Identities awaiting setup.
    pending: Vec<PendingIdentity>,
    /// Ready identities in configuration order.
    identities: Vec<Requestor>,
    /// Identities setup created.
    created: Vec<CreatedIdentity>,
    /// Key management boundary.
    key_manager: Arc<dyn KeyManager>,
    /// Whether error message bodies are asserted.
    verify_error_messages: bool,
    /// Polling budget for eventually consistent reads.
    maximum_search_time: Duration,
    /// Key size for generated identity keys.
    key_bits: usize,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("state", &self.state)
            .field("server_url", &self.server_url.as_str())
            .field("org", &self.org)
            .field("identities", &self.identities.len())
            .field("created", &self.created.len())
            .finish_non_exhaustive()
    }
}

impl Platform {
    /// Builds a configured platform from configuration and a transport.
    ///
    /// Loads the superuser key and every configured `key_path`. Sends nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformSetupError`] when the server URL or a key is invalid.
    pub fn configure(config: &PedantConfig, transport: Transport) -> Result<Self, PlatformSetupError> {
        let server_url = config.server_url().map_err(|err| PlatformSetupError::Config(err.to_string()))?;
        let signer =
            RequestSigner::new(config.signing.version).with_server_api_version(config.signing.server_api_version);

        let superuser_key = load_key(config, &config.superuser.name, &config.superuser.key_path)?;
        let superuser = Requestor::new(
            Identity::new(config.superuser.name.clone(), IdentityKind::User, Role::Superuser, superuser_key)
                .with_admin(true),
            signer,
        );

        let mut pending = Vec::with_capacity(config.requestors.len());
        for entry in &config.requestors {
            let key = match &entry.key_path {
                Some(path) => Some(load_key(config, &entry.name, path)?),
                None => None,
            };
            pending.push(PendingIdentity {
                config: entry.clone(),
                key,
            });
        }

        let key_manager: Arc<dyn KeyManager> = match config.key_management.mode {
            KeyManagementMode::Api => {
                Arc::new(ApiKeyManager::new(transport.clone(), superuser.clone(), server_url.clone()))
            }
            KeyManagementMode::Ctl => Arc::new(CtlKeyManager::new(config.key_management.ctl_command.clone())),
        };

        Ok(Self {
            state: PlatformState::Configured,
            server_url,
            org: config.org.clone(),
            transport,
            signer,
            superuser,
            pending,
            identities: Vec::new(),
            created: Vec::new(),
            key_manager,
            verify_error_messages: config.verify_error_messages,
            maximum_search_time: config.maximum_search_time(),
            key_bits: DEFAULT_KEY_BITS,
        })
    }

    /// Replaces the key manager.
    #[must_use]
    pub fn with_key_manager(mut self, key_manager: Arc<dyn KeyManager>) -> Self {
        self.key_manager = key_manager;
        self
    }

    /// Sets the key size used when generating identity keys.
    #[must_use]
    pub const fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Verifies the server and provisions baseline identities.
    ///
    /// On failure, identities created by this attempt are deleted again and
    /// the platform stays `Configured`, so `setup` can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformSetupError`] when the server is unreachable, the
    /// superuser is rejected, or an identity cannot be created.
    pub fn setup(&mut self) -> Result<(), PlatformSetupError> {
        self.expect_state(PlatformState::Configured)?;
        self.check_reachable()?;

        match self.provision_all() {
            Ok(identities) => {
                self.pending.clear();
                self.identities = identities;
                self.state = PlatformState::Ready;
                Ok(())
            }
            Err(err) => {
                self.delete_created();
                Err(err)
            }
        }
    }

    /// Deletes identities created during setup, newest first.
    ///
    /// Failures are collected rather than raised so every deletion is tried.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformSetupError::State`] unless the platform is ready.
    pub fn teardown(&mut self) -> Result<TeardownReport, PlatformSetupError> {
        self.expect_state(PlatformState::Ready)?;
        let report = self.delete_created();
        self.state = PlatformState::TornDown;
        Ok(report)
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PlatformState {
        self.state
    }

    /// Returns the first identity configured for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the platform is not ready or the role
    /// has no identity.
    pub fn identity(&self, role: Role) -> Result<&Requestor, PlatformError> {
        self.ensure_ready()?;
        if role == Role::Superuser {
            return Ok(&self.superuser);
        }
        self.identities
            .iter()
            .find(|requestor| requestor.identity().role() == role)
            .ok_or(PlatformError::UnknownRole(role))
    }

    /// Returns the identity with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the platform is not ready or no
    /// identity has the name.
    pub fn identity_named(&self, name: &str) -> Result<&Requestor, PlatformError> {
        self.ensure_ready()?;
        if self.superuser.name() == name {
            return Ok(&self.superuser);
        }
        self.identities
            .iter()
            .find(|requestor| requestor.name() == name)
            .ok_or_else(|| PlatformError::UnknownIdentity(name.to_string()))
    }

    /// Returns true when an identity with `role` is available.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.identity(role).is_ok()
    }

    /// Returns the superuser requestor. Available in every state.
    #[must_use]
    pub const fn superuser(&self) -> &Requestor {
        &self.superuser
    }

    /// Returns the shared transport.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Returns the key management boundary.
    #[must_use]
    pub fn key_manager(&self) -> &dyn KeyManager {
        self.key_manager.as_ref()
    }

    /// Returns the signing protocol used for every identity.
    #[must_use]
    pub const fn signer(&self) -> RequestSigner {
        self.signer
    }

    /// Returns the organization name, if configured.
    #[must_use]
    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    /// Returns whether error message bodies are asserted.
    #[must_use]
    pub const fn verify_error_messages(&self) -> bool {
        self.verify_error_messages
    }

    /// Returns the polling budget for eventually consistent reads.
    #[must_use]
    pub const fn maximum_search_time(&self) -> Duration {
        self.maximum_search_time
    }

    // ------------------------------------------------------------------------
    // URL helpers
    // ------------------------------------------------------------------------

    /// Returns `path` under the server root.
    #[must_use]
    pub fn server_url(&self, path: &str) -> String {
        join_url(&self.server_url, path)
    }

    /// Returns `path` under the organization, or the server root without one.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        match &self.org {
            Some(org) => self.server_url(&format!("/organizations/{org}{}", leading_slash(path))),
            None => self.server_url(path),
        }
    }

    /// Returns the URL of a named member of an org-scoped collection.
    #[must_use]
    pub fn named_url(&self, collection: &str, name: &str) -> String {
        self.api_url(&format!("/{collection}/{name}"))
    }

    /// Returns the URL of a user or client by name.
    #[must_use]
    pub fn identity_url(&self, kind: IdentityKind, name: &str) -> String {
        match kind {
            IdentityKind::User => self.server_url(&format!("/users/{name}")),
            IdentityKind::Client => self.named_url("clients", name),
        }
    }

    // ------------------------------------------------------------------------
    // Setup internals
    // ------------------------------------------------------------------------

    /// Fails unless the platform is in `expected`.
    fn expect_state(&self, expected: PlatformState) -> Result<(), PlatformSetupError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PlatformSetupError::State {
                expected,
                actual: self.state,
            })
        }
    }

    /// Fails unless the platform is ready.
    const fn ensure_ready(&self) -> Result<(), PlatformError> {
        match self.state {
            PlatformState::Ready => Ok(()),
            other => Err(PlatformError::NotReady(other)),
        }
    }

    /// Fetches the superuser's own record to prove reachability and credentials.
    fn check_reachable(&self) -> Result<(), PlatformSetupError> {
        let url = self.identity_url(IdentityKind::User, self.superuser.name());
        let response = self
            .transport
            .get(&url, &self.superuser, &RequestOptions::new())
            .map_err(|err| PlatformSetupError::Unreachable(err.to_string()))?;
        if response.status() == 200 {
            Ok(())
        } else {
            Err(PlatformSetupError::Superuser {
                name: self.superuser.name().to_string(),
                status: response.status(),
            })
        }
    }

    /// Creates one identity, or re-registers its key when it already exists.
    fn provision(&mut self, entry: &PendingIdentity) -> Result<Requestor, PlatformSetupError> {
        let name = entry.config.name.clone();
        let key = match &entry.key {
            Some(key) => key.clone(),
            None => PrivateKey::generate(self.key_bits).map_err(|err| PlatformSetupError::Key {
                name: name.clone(),
                detail: err.to_string(),
            })?,
        };
        let public_key = key.public_key().to_pem().map_err(|err| PlatformSetupError::Key {
            name: name.clone(),
            detail: err.to_string(),
        })?;
        let payload = creation_payload(&entry.config, &public_key);
        let collection_url = match entry.config.kind {
            IdentityKind::User => self.server_url("/users"),
            IdentityKind::Client => self.api_url("/clients"),
        };

        let options = RequestOptions::new().payload(payload.clone());
        let response = self.send(|transport, superuser| transport.post(&collection_url, superuser, &options))?;
        let key = match response.status() {
            201 => {
                self.created.push(CreatedIdentity {
                    kind: entry.config.kind,
                    name: name.clone(),
                });
                returned_private_key(&response).unwrap_or(key)
            }
            409 => {
                let url = self.identity_url(entry.config.kind, &name);
                let options = RequestOptions::new().payload(payload);
                let update = self.send(|transport, superuser| transport.put(&url, superuser, &options))?;
                if !matches!(update.status(), 200 | 201) {
                    return Err(provision_error(&name, &update));
                }
                returned_private_key(&update).unwrap_or(key)
            }
            _ => return Err(provision_error(&name, &response)),
        };
        Ok(self.requestor_for(&entry.config, key))
    }

    /// Builds a requestor for every pending identity without consuming them.
    fn provision_all(&mut self) -> Result<Vec<Requestor>, PlatformSetupError> {
        let pending = self.pending.clone();
        let mut identities = Vec::with_capacity(pending.len());
        for entry in &pending {
            let requestor = if entry.config.create {
                self.provision(entry)?
            } else {
                let key = entry.key.clone().ok_or_else(|| PlatformSetupError::Key {
                    name: entry.config.name.clone(),
                    detail: "key_path is required for identities that are not created".to_string(),
                })?;
                self.requestor_for(&entry.config, key)
            };
            identities.push(requestor);
        }
        Ok(identities)
    }

    /// Deletes every identity in `created`, newest first.
    fn delete_created(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        while let Some(created) = self.created.pop() {
            let label = format!("{}/{}", created.kind.collection(), created.name);
            let url = self.identity_url(created.kind, &created.name);
            match self.transport.delete(&url, &self.superuser, &RequestOptions::new()) {
                Ok(response) if matches!(response.status(), 200 | 404) => report.deleted.push(label),
                Ok(response) => report.failures.push(format!("{label}: status {}", response.status())),
                Err(err) => report.failures.push(format!("{label}: {err}")),
            }
        }
        report
    }

    /// Sends a superuser request, mapping transport failures to setup errors.
    fn send(
        &self,
        call: impl FnOnce(&Transport, &Requestor) -> Result<CapturedResponse, RequestError>,
    ) -> Result<CapturedResponse, PlatformSetupError> {
        call(&self.transport, &self.superuser).map_err(|err| match err {
            RequestError::Transport(err) => PlatformSetupError::Unreachable(err.to_string()),
            other => PlatformSetupError::Config(other.to_string()),
        })
    }

    /// Builds a requestor for a configured identity.
    fn requestor_for(&self, config: &RequestorConfig, key: PrivateKey) -> Requestor {
        let identity = Identity::new(config.name.clone(), config.kind, config.role, key).with_admin(config.admin);
        Requestor::new(identity, self.signer)
    }
}

// ============================================================================
// SECTION: Transport Construction
// ============================================================================

/// Builds the live transport described by configuration.
///
/// # Errors
///
/// Returns [`PlatformSetupError::Config`] when the HTTP client cannot be built.
pub fn build_transport(config: &PedantConfig, log: Arc<dyn RequestLog>) -> Result<Transport, PlatformSetupError> {
    let backend = ReqwestBackend::new(BackendSettings {
        timeout: config.timeout(),
        ssl_verify: config.ssl_verify,
    })
    .map_err(|err| PlatformSetupError::Config(err.to_string()))?;
    let defaults = RequestDefaults {
        user_agent: config.user_agent.clone(),
        chef_version: config.chef_version.clone(),
        darklaunch: config.darklaunch_defaults(),
    };
    Ok(Transport::new(Arc::new(backend), defaults).with_log(log))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a key file resolved against the config directory.
fn load_key(config: &PedantConfig, name: &str, path: &Path) -> Result<PrivateKey, PlatformSetupError> {
    PrivateKey::from_pem_file(&config.resolve_path(path)).map_err(|err| PlatformSetupError::Key {
        name: name.to_string(),
        detail: err.to_string(),
    })
}

/// Request body creating a user or client.
fn creation_payload(config: &RequestorConfig, public_key: &str) -> Value {
    let name = config.name.as_str();
    match config.kind {
        IdentityKind::User => json!({
            "username": name,
            "name": name,
            "display_name": name,
            "first_name": name,
            "last_name": "pedant",
            "email": format!("{name}@{PROVISIONED_EMAIL_DOMAIN}"),
            "password": DEFAULT_USER_PASSWORD,
            "admin": config.admin,
            "public_key": public_key,
        }),
        IdentityKind::Client => json!({
            "name": name,
            "clientname": name,
            "admin": config.admin,
            "validator": config.role == Role::Validator,
            "public_key": public_key,
        }),
    }
}

/// Extracts a server-generated private key from a creation response.
fn returned_private_key(response: &CapturedResponse) -> Option<PrivateKey> {
    let body = response.json_body()?;
    let pem = body
        .get("private_key")
        .or_else(|| body.get("chef_key").and_then(|chef_key| chef_key.get("private_key")))
        .and_then(Value::as_str)?;
    PrivateKey::from_pem(pem).ok()
}

/// Maps an unexpected provisioning response.
fn provision_error(name: &str, response: &CapturedResponse) -> PlatformSetupError {
    PlatformSetupError::Provision {
        name: name.to_string(),
        status: response.status(),
        body: response.text(),
    }
}

/// Joins a path onto the server root without doubling slashes.
fn join_url(base: &Url, path: &str) -> String {
    format!("{}{}", base.as_str().trim_end_matches('/'), leading_slash(path))
}

/// Returns `path` with exactly one leading slash, or empty for an empty path.
fn leading_slash(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("/{}", path.trim_start_matches('/'))
    }
}
