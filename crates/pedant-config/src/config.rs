// crates/pedant-config/src/config.rs
// ============================================================================
// Module: Pedant Configuration
// Description: Configuration loading and validation for the conformance suite.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: pedant-core, pedant-http, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file (`pedant.toml` by default) with
//! strict size and path limits, then validated as a whole. Relative key paths
//! resolve against the directory holding the config file.
//!
//! Invariants:
//! - A loaded [`PedantConfig`] has passed [`PedantConfig::validate`].
//! - Requestor names are unique and never collide with the superuser.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use pedant_core::DarklaunchFlags;
use pedant_core::IdentityKind;
use pedant_core::Role;
use pedant_core::SignVersion;
use pedant_http::DEFAULT_CHEF_VERSION;
use pedant_http::DEFAULT_CTL_COMMAND;
use pedant_http::DEFAULT_USER_AGENT;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "pedant.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PEDANT_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured requestors.
pub const MAX_REQUESTORS: usize = 64;
/// Maximum scenario parallelism.
pub const MAX_PARALLELISM: usize = 64;
/// Maximum identity or organization name length.
pub const MAX_NAME_LENGTH: usize = 255;
/// Minimum request timeout in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 1;
/// Maximum request timeout in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 600;
/// Maximum search polling budget in seconds.
pub const MAX_SEARCH_TIME_SECS: u64 = 3600;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default search polling budget in seconds.
const DEFAULT_MAXIMUM_SEARCH_TIME_SECS: u64 = 65;

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Top-level suite configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PedantConfig {
    /// Base URL of the server under test.
    pub chef_server: String,
    /// Organization name; when set, API paths are organization-scoped.
    #[serde(default)]
    pub org: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether to verify TLS certificates.
    #[serde(default = "default_true")]
    pub ssl_verify: bool,
    /// `X-Chef-Version` header value.
    #[serde(default = "default_chef_version")]
    pub chef_version: String,
    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Signing protocol settings.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Superuser credentials.
    pub superuser: SuperuserConfig,
    /// Baseline identities.
    #[serde(default)]
    pub requestors: Vec<RequestorConfig>,
    /// Darklaunch defaults.
    #[serde(default)]
    pub darklaunch: BTreeMap<String, bool>,
    /// Tag filters (`tag` includes, `~tag` excludes).
    #[serde(default)]
    pub tags: Vec<String>,
    /// JUnit XML output path.
    #[serde(default)]
    pub junit_file: Option<PathBuf>,
    /// HTTP request log path.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Whether error message bodies are asserted.
    #[serde(default = "default_true")]
    pub verify_error_messages: bool,
    /// Polling budget for asynchronously indexed state.
    #[serde(default = "default_maximum_search_time_secs")]
    pub maximum_search_time_secs: u64,
    /// Number of scenarios run concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Key management mechanism.
    #[serde(default)]
    pub key_management: KeyManagementConfig,
    /// Directory of the loaded config file, for relative paths.
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

/// Signing protocol settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// Protocol version.
    #[serde(default)]
    pub version: SignVersion,
    /// Server API version (protocol `1.3`).
    #[serde(default)]
    pub server_api_version: u32,
}

/// Superuser credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuperuserConfig {
    /// Superuser name.
    pub name: String,
    /// Private key path.
    pub key_path: PathBuf,
}

/// A baseline identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestorConfig {
    /// Bookkeeping role.
    pub role: Role,
    /// User or client.
    pub kind: IdentityKind,
    /// Identity name.
    pub name: String,
    /// Private key path; required unless the identity is created at setup.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Whether the identity has admin rights.
    #[serde(default)]
    pub admin: bool,
    /// Whether setup creates the identity on the server.
    #[serde(default)]
    pub create: bool,
}

/// Key management mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyManagementMode {
    /// Server keys API.
    #[default]
    Api,
    /// Control command line tool.
    Ctl,
}

/// Key management settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyManagementConfig {
    /// Mechanism.
    #[serde(default)]
    pub mode: KeyManagementMode,
    /// Control command used when `mode = "ctl"`.
    #[serde(default = "default_ctl_command")]
    pub ctl_command: String,
}

impl Default for KeyManagementConfig {
    fn default() -> Self {
        Self {
            mode: KeyManagementMode::Api,
            ctl_command: default_ctl_command(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl PedantConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from the argument, then `PEDANT_CONFIG`, then
    /// `pedant.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.source_dir = resolved.parent().map(Path::to_path_buf);
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates configuration text. Relative paths stay relative.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        validate_server_url(&self.chef_server)?;
        if let Some(org) = &self.org {
            validate_name("org", org)?;
        }
        validate_range("timeout_secs", self.timeout_secs, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)?;
        validate_range("maximum_search_time_secs", self.maximum_search_time_secs, 1, MAX_SEARCH_TIME_SECS)?;
        validate_header_value("chef_version", &self.chef_version)?;
        validate_header_value("user_agent", &self.user_agent)?;
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(ConfigError::Invalid(format!(
                "parallelism must be between 1 and {MAX_PARALLELISM}"
            )));
        }
        self.superuser.validate()?;
        self.validate_requestors()?;
        for flag in self.darklaunch.keys() {
            validate_flag_name(flag)?;
        }
        for tag in &self.tags {
            validate_tag(tag)?;
        }
        if let Some(path) = &self.junit_file {
            validate_path_string("junit_file", &path.to_string_lossy())?;
        }
        if let Some(path) = &self.log_file {
            validate_path_string("log_file", &path.to_string_lossy())?;
        }
        if self.key_management.mode == KeyManagementMode::Ctl
            && self.key_management.ctl_command.trim().is_empty()
        {
            return Err(ConfigError::Invalid("key_management.ctl_command must be non-empty".to_string()));
        }
        Ok(())
    }

    /// Validates the requestor list.
    fn validate_requestors(&self) -> Result<(), ConfigError> {
        if self.requestors.len() > MAX_REQUESTORS {
            return Err(ConfigError::Invalid(format!("requestors exceeds {MAX_REQUESTORS} entries")));
        }
        let mut names = BTreeSet::new();
        names.insert(self.superuser.name.as_str());
        for requestor in &self.requestors {
            requestor.validate()?;
            if !names.insert(requestor.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "requestors.name {} is not unique",
                    requestor.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the parsed server base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL does not parse.
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.chef_server)
            .map_err(|err| ConfigError::Invalid(format!("chef_server: {err}")))
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the search polling budget.
    #[must_use]
    pub const fn maximum_search_time(&self) -> Duration {
        Duration::from_secs(self.maximum_search_time_secs)
    }

    /// Returns the built-in darklaunch flags: standard flags first, then any
    /// additional configured flags.
    #[must_use]
    pub fn darklaunch_defaults(&self) -> DarklaunchFlags {
        self.darklaunch
            .iter()
            .fold(DarklaunchFlags::standard(), |flags, (name, enabled)| flags.with(name.clone(), *enabled))
    }

    /// Resolves a configured path against the config file directory.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.source_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl SuperuserConfig {
    /// Validates the superuser entry.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name("superuser.name", &self.name)?;
        validate_path_string("superuser.key_path", &self.key_path.to_string_lossy())
    }
}

impl RequestorConfig {
    /// Validates a requestor entry.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name("requestors.name", &self.name)?;
        if self.role == Role::Superuser {
            return Err(ConfigError::Invalid(format!(
                "requestors.role superuser is reserved ({})",
                self.name
            )));
        }
        if self.role == Role::Validator && self.kind != IdentityKind::Client {
            return Err(ConfigError::Invalid(format!(
                "requestors.kind must be client for validator {}",
                self.name
            )));
        }
        if self.role == Role::Outside && self.kind != IdentityKind::User {
            return Err(ConfigError::Invalid(format!(
                "requestors.kind must be user for outside {}",
                self.name
            )));
        }
        match &self.key_path {
            Some(path) => validate_path_string("requestors.key_path", &path.to_string_lossy()),
            None if self.create => Ok(()),
            None => Err(ConfigError::Invalid(format!(
                "requestors.key_path is required unless create = true ({})",
                self.name
            ))),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI, env var, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates the server URL: absolute http(s), with a host, no query or fragment.
fn validate_server_url(value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|err| ConfigError::Invalid(format!("chef_server is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid("chef_server must use http or https".to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::Invalid("chef_server must include a host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Invalid("chef_server must not include a query or fragment".to_string()));
    }
    Ok(())
}

/// Validates an identity or organization name.
fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_NAME_LENGTH} characters")));
    }
    if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')) {
        return Err(ConfigError::Invalid(format!("{field} contains invalid characters: {value}")));
    }
    Ok(())
}

/// Validates a header value sourced from config.
fn validate_header_value(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} must not contain control characters")));
    }
    Ok(())
}

/// Validates a darklaunch flag name.
fn validate_flag_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains([';', '=']) || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("darklaunch flag name is invalid: {name:?}")));
    }
    Ok(())
}

/// Validates a tag filter entry.
fn validate_tag(tag: &str) -> Result<(), ConfigError> {
    let name = tag.strip_prefix('~').unwrap_or(tag);
    if name.is_empty() || name.chars().any(|ch| ch.is_whitespace() || ch == ',') {
        return Err(ConfigError::Invalid(format!("tags entry is invalid: {tag:?}")));
    }
    Ok(())
}

/// Validates that a numeric value falls within a range.
fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

/// Default timeout.
const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Default search polling budget.
const fn default_maximum_search_time_secs() -> u64 {
    DEFAULT_MAXIMUM_SEARCH_TIME_SECS
}

/// Default parallelism.
const fn default_parallelism() -> usize {
    1
}

/// Serde default for `true` flags.
const fn default_true() -> bool {
    true
}

/// Default chef version.
fn default_chef_version() -> String {
    DEFAULT_CHEF_VERSION.to_string()
}

/// Default user agent.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Default control command.
fn default_ctl_command() -> String {
    DEFAULT_CTL_COMMAND.to_string()
}
