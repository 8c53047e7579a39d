// crates/pedant-harness/src/catalog/mod.rs
// ============================================================================
// Module: Pedant Scenario Catalog
// Description: Built-in conformance scenarios.
// Purpose: Assemble the suites a default run executes.
// Dependencies: pedant-config, pedant-core, rand
// ============================================================================

//! ## Overview
//! Each submodule builds the scenarios for one endpoint family from a
//! [`CatalogContext`]. The context is derived from configuration alone, so
//! the catalog can be listed without contacting a server. Resource names
//! carry a per-run suffix so concurrent runs against one server do not
//! collide.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth_headers;
pub mod clients;
pub mod environments;
pub mod keys;
pub mod status;

// ============================================================================
// SECTION: Imports
// ============================================================================

use pedant_config::PedantConfig;
use pedant_core::RequestSigner;
use pedant_core::keys::DEFAULT_KEY_BITS;
use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;

use crate::responses::CommonResponses;
use crate::scenario::Scenario;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Length of the per-run name suffix.
pub const RUN_SUFFIX_LEN: usize = 8;

/// Inputs shared by catalog builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogContext {
    /// Organization for org-scoped suites; they are omitted without one.
    pub org: Option<String>,
    /// Response expectation builder.
    pub responses: CommonResponses,
    /// Lowercase suffix appended to generated names.
    pub run_suffix: String,
    /// Key size for scenario-owned identities.
    pub key_bits: usize,
    /// Signing protocol for scenario-owned identities.
    pub signer: RequestSigner,
}

impl CatalogContext {
    /// Creates a context with a random run suffix.
    #[must_use]
    pub fn new(org: Option<String>, verify_error_messages: bool) -> Self {
        let run_suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RUN_SUFFIX_LEN)
            .map(|byte| char::from(byte).to_ascii_lowercase())
            .collect();
        Self {
            org,
            responses: CommonResponses::new(verify_error_messages),
            run_suffix,
            key_bits: DEFAULT_KEY_BITS,
            signer: RequestSigner::default(),
        }
    }

    /// Creates a context from configuration.
    #[must_use]
    pub fn from_config(config: &PedantConfig) -> Self {
        let signer =
            RequestSigner::new(config.signing.version).with_server_api_version(config.signing.server_api_version);
        Self::new(config.org.clone(), config.verify_error_messages).with_signer(signer)
    }

    /// Replaces the run suffix.
    #[must_use]
    pub fn with_run_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.run_suffix = suffix.into();
        self
    }

    /// Sets the key size for scenario-owned identities.
    #[must_use]
    pub const fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Sets the signing protocol for scenario-owned identities.
    #[must_use]
    pub const fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Returns `pedant-<base>-<suffix>`.
    #[must_use]
    pub fn unique_name(&self, base: &str) -> String {
        format!("pedant-{base}-{}", self.run_suffix)
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Returns every built-in scenario in a stable order.
///
/// # Errors
///
/// Returns [`CatalogError`] when scenario fixtures cannot be built.
pub fn builtin_scenarios(context: &CatalogContext) -> Result<Vec<Scenario>, CatalogError> {
    let mut scenarios = status::scenarios(context);
    scenarios.extend(auth_headers::scenarios(context));
    scenarios.extend(clients::scenarios(context)?);
    scenarios.extend(environments::scenarios(context)?);
    scenarios.extend(keys::scenarios(context)?);
    Ok(scenarios)
}

/// Failures building catalog fixtures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A key pair could not be generated or encoded.
    #[error("catalog key error: {0}")]
    Key(String),
    /// A response pattern did not compile.
    #[error("catalog pattern error: {0}")]
    Pattern(String),
}
