// system-tests/src/lib.rs
// ============================================================================
// Module: Pedant System Tests Library
// Description: Shared configuration for end-to-end pedant runs.
// Purpose: Provide common settings for the system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts configuration shared by the system-test binaries in
//! `system-tests/tests`, which drive the harness and the `pedant` CLI
//! against an in-process signature-verifying server stub.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
