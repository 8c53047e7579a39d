// crates/pedant-harness/src/lib.rs
// ============================================================================
// Module: Pedant Harness Library
// Description: Platform registry, scenarios, runner, and reports.
// Purpose: Run declarative conformance scenarios against a live server.
// Dependencies: pedant-config, pedant-core, pedant-http
// ============================================================================

//! ## Overview
//! A [`Platform`] is configured from [`pedant_config::PedantConfig`], set up
//! once (reachability check and identity provisioning), shared read-only by
//! every scenario, and torn down at the end. [`Scenario`] values describe
//! signed requests and their expected outcomes; [`run_suite`] executes them
//! and returns a [`SuiteReport`].
//!
//! Invariants:
//! - Scenarios never mutate the platform's identities.
//! - A failed platform setup runs no scenarios.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod platform;
pub mod report;
pub mod responses;
pub mod retry;
pub mod runner;
pub mod scenario;
pub mod tags;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::CatalogContext;
pub use catalog::CatalogError;
pub use catalog::builtin_scenarios;
pub use platform::Platform;
pub use platform::PlatformError;
pub use platform::PlatformSetupError;
pub use platform::PlatformState;
pub use platform::TeardownReport;
pub use platform::build_transport;
pub use report::ReportError;
pub use report::ReportFormat;
pub use report::ScenarioResult;
pub use report::ScenarioStatus;
pub use report::SuiteReport;
pub use report::render;
pub use report::write_report;
pub use responses::CommonResponses;
pub use retry::Attempt;
pub use retry::RetryPolicy;
pub use retry::retry_until;
pub use runner::run_scenario;
pub use runner::run_suite;
pub use scenario::Actor;
pub use scenario::KeyAction;
pub use scenario::KeyStep;
pub use scenario::Outcome;
pub use scenario::RequestStep;
pub use scenario::Scenario;
pub use scenario::Step;
pub use scenario::Target;
pub use tags::TagFilter;

#[cfg(test)]
mod tests;
