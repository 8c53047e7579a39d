// crates/pedant-http/src/keys.rs
// ============================================================================
// Module: Pedant Key Management
// Description: Add, delete, and list identity public keys.
// Purpose: Hide whether keys are managed over HTTP or a control CLI.
// Dependencies: pedant-core, serde, serde_json, tempfile, url
// ============================================================================

//! ## Overview
//! [`KeyManager`] is the single boundary scenarios use to manage named public
//! keys. [`ApiKeyManager`] talks to the server's keys endpoints;
//! [`CtlKeyManager`] shells out to `chef-server-ctl`.
//!
//! Invariants:
//! - Public key material handed to the CLI lives in a temporary file that is
//!   removed when the call returns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::Command;

use pedant_core::IdentityKind;
use pedant_core::PublicKey;
use pedant_core::Requestor;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tempfile::NamedTempFile;
use thiserror::Error;
use url::Url;

use crate::error::RequestError;
use crate::request::RequestOptions;
use crate::transport::Transport;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Default control command.
pub const DEFAULT_CTL_COMMAND: &str = "chef-server-ctl";

/// Identity whose keys are managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOwner {
    /// Server-wide user.
    User {
        /// User name.
        name: String,
    },
    /// Organization-scoped client.
    Client {
        /// Owning organization.
        org: String,
        /// Client name.
        name: String,
    },
}

impl KeyOwner {
    /// Builds an owner from an identity kind.
    #[must_use]
    pub fn new(kind: IdentityKind, org: &str, name: &str) -> Self {
        match kind {
            IdentityKind::User => Self::User {
                name: name.to_string(),
            },
            IdentityKind::Client => Self::Client {
                org: org.to_string(),
                name: name.to_string(),
            },
        }
    }

    /// Returns the owner's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User {
                name,
            }
            | Self::Client {
                name, ..
            } => name,
        }
    }
}

/// Key to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKey {
    /// Key name, unique per owner.
    pub name: String,
    /// Public key to register.
    pub public_key: PublicKey,
    /// `YYYY-MM-DDTHH:MM:SSZ` expiry, or `None` for `infinity`.
    pub expiration_date: Option<String>,
}

/// Key entry returned by a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Key name.
    pub name: String,
    /// Whether the server reports the key as expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
    /// Expiry as reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    /// Public key PEM when the listing includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Key management failures.
#[derive(Debug, Error)]
pub enum KeyManagementError {
    /// The HTTP request failed.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The server answered with an unexpected status.
    #[error("key endpoint returned {status}: {body}")]
    Status {
        /// HTTP status.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// The control command failed or could not be spawned.
    #[error("key command failed: {0}")]
    Command(String),
    /// Key material could not be written.
    #[error("key io error: {0}")]
    Io(String),
    /// A listing could not be parsed.
    #[error("key listing parse error: {0}")]
    Parse(String),
}

/// Boundary for managing identity public keys.
pub trait KeyManager: Send + Sync {
    /// Registers a new named key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyManagementError`] when the key cannot be added.
    fn add_key(&self, owner: &KeyOwner, key: &NewKey) -> Result<(), KeyManagementError>;

    /// Deletes a named key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyManagementError`] when the key cannot be deleted.
    fn delete_key(&self, owner: &KeyOwner, key_name: &str) -> Result<(), KeyManagementError>;

    /// Lists the owner's keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyManagementError`] when the listing fails.
    fn list_keys(&self, owner: &KeyOwner) -> Result<Vec<KeyRecord>, KeyManagementError>;
}

// ============================================================================
// SECTION: HTTP Keys API
// ============================================================================

/// Manages keys through the server's `/keys` endpoints.
#[derive(Debug, Clone)]
pub struct ApiKeyManager {
    /// Transport used for key calls.
    transport: Transport,
    /// Identity authorized to manage keys.
    requestor: Requestor,
    /// Server root URL.
    server_url: Url,
}

impl ApiKeyManager {
    /// Creates a manager acting as `requestor`.
    #[must_use]
    pub const fn new(transport: Transport, requestor: Requestor, server_url: Url) -> Self {
        Self {
            transport,
            requestor,
            server_url,
        }
    }

    /// Returns the keys collection URL for an owner.
    #[must_use]
    pub fn keys_url(&self, owner: &KeyOwner) -> String {
        let base = self.server_url.as_str().trim_end_matches('/');
        match owner {
            KeyOwner::User {
                name,
            } => format!("{base}/users/{name}/keys"),
            KeyOwner::Client {
                org,
                name,
            } => format!("{base}/organizations/{org}/clients/{name}/keys"),
        }
    }
}

impl KeyManager for ApiKeyManager {
    fn add_key(&self, owner: &KeyOwner, key: &NewKey) -> Result<(), KeyManagementError> {
        let public_key = key.public_key.to_pem().map_err(|err| KeyManagementError::Io(err.to_string()))?;
        let body = json!({
            "name": key.name,
            "public_key": public_key,
            "expiration_date": key.expiration_date.as_deref().unwrap_or("infinity"),
        });
        let options = RequestOptions::new().payload(body);
        let response = self.transport.post(&self.keys_url(owner), &self.requestor, &options)?;
        expect_status(response.status(), &[201], &response.text())
    }

    fn delete_key(&self, owner: &KeyOwner, key_name: &str) -> Result<(), KeyManagementError> {
        let url = format!("{}/{key_name}", self.keys_url(owner));
        let response = self.transport.delete(&url, &self.requestor, &RequestOptions::new())?;
        expect_status(response.status(), &[200], &response.text())
    }

    fn list_keys(&self, owner: &KeyOwner) -> Result<Vec<KeyRecord>, KeyManagementError> {
        let response = self.transport.get(&self.keys_url(owner), &self.requestor, &RequestOptions::new())?;
        expect_status(response.status(), &[200], &response.text())?;
        let Some(Value::Array(entries)) = response.json_body() else {
            return Err(KeyManagementError::Parse("key listing is not a JSON array".to_string()));
        };
        entries
            .iter()
            .map(|entry| {
                serde_json::from_value(entry.clone()).map_err(|err| KeyManagementError::Parse(err.to_string()))
            })
            .collect()
    }
}

/// Maps unexpected statuses onto [`KeyManagementError::Status`].
fn expect_status(status: u16, accepted: &[u16], body: &str) -> Result<(), KeyManagementError> {
    if accepted.contains(&status) {
        Ok(())
    } else {
        Err(KeyManagementError::Status {
            status,
            body: body.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Control CLI
// ============================================================================

/// Manages keys by invoking the server control CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtlKeyManager {
    /// Program name or path.
    command: String,
}

impl Default for CtlKeyManager {
    fn default() -> Self {
        Self::new(DEFAULT_CTL_COMMAND)
    }
}

impl CtlKeyManager {
    /// Creates a manager invoking `command`.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Returns the subcommand and owner arguments, e.g. `add-user-key NAME`.
    fn owner_args(owner: &KeyOwner, action: &str, noun: &str) -> Vec<String> {
        match owner {
            KeyOwner::User {
                name,
            } => vec![format!("{action}-user-{noun}"), name.clone()],
            KeyOwner::Client {
                org,
                name,
            } => vec![format!("{action}-client-{noun}"), org.clone(), name.clone()],
        }
    }

    /// Runs the command and returns stdout.
    fn run(&self, args: &[String]) -> Result<String, KeyManagementError> {
        let output = Command::new(&self.command)
            .args(args)
            .output()
            .map_err(|err| KeyManagementError::Command(format!("{}: {err}", self.command)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KeyManagementError::Command(format!(
                "{} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl KeyManager for CtlKeyManager {
    fn add_key(&self, owner: &KeyOwner, key: &NewKey) -> Result<(), KeyManagementError> {
        let pem = key.public_key.to_pem().map_err(|err| KeyManagementError::Io(err.to_string()))?;
        let mut file = NamedTempFile::new().map_err(|err| KeyManagementError::Io(err.to_string()))?;
        file.write_all(pem.as_bytes()).map_err(|err| KeyManagementError::Io(err.to_string()))?;
        file.flush().map_err(|err| KeyManagementError::Io(err.to_string()))?;

        let mut args = Self::owner_args(owner, "add", "key");
        args.push(file.path().display().to_string());
        args.push("--key-name".to_string());
        args.push(key.name.clone());
        if let Some(expiration) = &key.expiration_date {
            args.push("--expiration-date".to_string());
            args.push(expiration.trim_end_matches('Z').to_string());
        }
        self.run(&args).map(|_| ())
    }

    fn delete_key(&self, owner: &KeyOwner, key_name: &str) -> Result<(), KeyManagementError> {
        let mut args = Self::owner_args(owner, "delete", "key");
        args.push(key_name.to_string());
        self.run(&args).map(|_| ())
    }

    fn list_keys(&self, owner: &KeyOwner) -> Result<Vec<KeyRecord>, KeyManagementError> {
        let mut args = Self::owner_args(owner, "list", "keys");
        args.push("--verbose".to_string());
        let stdout = self.run(&args)?;
        Ok(parse_ctl_listing(&stdout))
    }
}

/// Parses `key_name:` / `expires_at:` / `public_key:` blocks from CLI output.
#[must_use]
pub fn parse_ctl_listing(output: &str) -> Vec<KeyRecord> {
    let mut records: Vec<KeyRecord> = Vec::new();
    let mut pem: Option<String> = None;
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(buffer) = pem.as_mut() {
            buffer.push_str(trimmed);
            buffer.push('\n');
            if trimmed.starts_with("-----END") {
                if let Some(record) = records.last_mut() {
                    record.public_key = pem.take();
                } else {
                    pem = None;
                }
            }
            continue;
        }
        if let Some(name) = trimmed.strip_prefix("key_name:") {
            records.push(KeyRecord {
                name: name.trim().to_string(),
                ..KeyRecord::default()
            });
        } else if let Some(expires) = trimmed.strip_prefix("expires_at:") {
            if let Some(record) = records.last_mut() {
                let expires = expires.trim();
                record.expiration_date = Some(expires.to_string());
            }
        } else if trimmed.starts_with("-----BEGIN") {
            pem = Some(format!("{trimmed}\n"));
        }
    }
    records
}
