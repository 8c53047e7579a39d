// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for pedant system-tests.
// Purpose: Provide the server stub, CLI runner, fixtures, and artifacts.
// Dependencies: system-tests, pedant-core
// ============================================================================

//! ## Overview
//! Invariants:
//! - Every run talks only to an in-process loopback stub.
//! - Fixture keys come from the core crate's test fixtures.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;
pub mod chef_stub;
pub mod cli;
pub mod fixtures;
