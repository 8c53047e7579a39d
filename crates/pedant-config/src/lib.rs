// crates/pedant-config/src/lib.rs
// ============================================================================
// Module: Pedant Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for pedant.toml semantics.
// Dependencies: pedant-core, pedant-http, serde, toml, url
// ============================================================================

//! ## Overview
//! `pedant-config` defines the configuration model for the conformance suite:
//! the server under test, the identities the suite signs for, and the runner
//! options. Validation is strict and fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
