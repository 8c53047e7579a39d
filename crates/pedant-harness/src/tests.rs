// crates/pedant-harness/src/tests.rs
// ============================================================================
// Module: Harness Unit Tests
// Description: Unit tests for the built-in catalog and report rendering.
// Purpose: Pin catalog shape and report formats without a server.
// Dependencies: pedant-harness
// ============================================================================

//! ## Overview
//! Builds the full catalog with small keys and checks naming, tagging and
//! cleanup conventions, then renders a hand-built report in every format.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::Value;

use crate::CatalogContext;
use crate::Scenario;
use crate::TagFilter;
use crate::builtin_scenarios;
use crate::report::Phase;
use crate::report::ReportFormat;
use crate::report::ScenarioResult;
use crate::report::ScenarioStatus;
use crate::report::StepFailure;
use crate::report::SuiteReport;
use crate::report::render;
use crate::report::render_junit;
use crate::report::render_plain;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const TEST_KEY_BITS: usize = 1024;

fn catalog(org: Option<&str>) -> Vec<Scenario> {
    let context = CatalogContext::new(org.map(ToString::to_string), true)
        .with_run_suffix("t3st")
        .with_key_bits(TEST_KEY_BITS);
    builtin_scenarios(&context).unwrap()
}

fn result(name: &str, status: ScenarioStatus) -> ScenarioResult {
    ScenarioResult {
        name: name.to_string(),
        tags: vec!["clients".to_string()],
        status,
        duration_ms: 12,
        failures: Vec::new(),
        notes: Vec::new(),
    }
}

fn sample_report() -> SuiteReport {
    let mut failed = result("clients: duplicate <conflict>", ScenarioStatus::Failed);
    failed.failures.push(StepFailure {
        phase: Phase::Steps,
        step: "POST /clients as admin".to_string(),
        detail: "status: expected 409, got 201\nbody.error: missing".to_string(),
    });
    let mut skipped = result("clients: outside user", ScenarioStatus::Skipped);
    skipped.notes.push("requires unconfigured role(s): outside".to_string());
    SuiteReport::new(
        vec![result("clients: list", ScenarioStatus::Passed), failed, skipped],
        Duration::from_millis(1_500),
    )
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

#[test]
fn catalog_names_are_unique_and_tagged() {
    let scenarios = catalog(Some("acme"));
    let names: BTreeSet<&str> = scenarios.iter().map(|scenario| scenario.name.as_str()).collect();
    assert_eq!(names.len(), scenarios.len());
    assert!(scenarios.iter().all(|scenario| !scenario.tags.is_empty()));
    assert!(scenarios.iter().all(|scenario| !scenario.steps.is_empty()));
}

#[test]
fn catalog_without_org_keeps_server_scoped_suites() {
    let scenarios = catalog(None);
    let tags: BTreeSet<&str> =
        scenarios.iter().flat_map(|scenario| scenario.tags.iter().map(String::as_str)).collect();
    assert!(tags.contains("status"));
    assert!(tags.contains("authentication"));
    assert!(tags.contains("keys"));
    assert!(!tags.contains("clients"));
    assert!(!tags.contains("environments"));
}

#[test]
fn generated_names_carry_the_run_suffix() {
    let scenarios = catalog(Some("acme"));
    let labels: Vec<String> =
        scenarios.iter().flat_map(|scenario| scenario.cleanup.iter().map(crate::Step::label)).collect();
    assert!(!labels.is_empty());
    assert!(labels.iter().all(|label| label.contains("-t3st")));
}

#[test]
fn smoke_filter_selects_a_subset() {
    let scenarios = catalog(Some("acme"));
    let filter = TagFilter::parse(["smoke"]);
    let smoke = scenarios.iter().filter(|scenario| filter.matches(&scenario.tags)).count();
    assert!(smoke > 0);
    assert!(smoke < scenarios.len());
    let everything = TagFilter::parse(["~smoke"]).run_all(true);
    assert_eq!(scenarios.iter().filter(|scenario| everything.matches(&scenario.tags)).count(), scenarios.len());
}

// ============================================================================
// SECTION: Reports
// ============================================================================

#[test]
fn summary_counts_each_status() {
    let report = sample_report();
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.passed, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.skipped, 1);
    assert!(!report.is_success());
}

#[test]
fn plain_report_indents_failure_detail() {
    let text = render_plain(&sample_report());
    assert!(text.contains("PASS  clients: list (12 ms)"));
    assert!(text.contains("FAIL  clients: duplicate <conflict>"));
    assert!(text.contains("        status: expected 409, got 201\n"));
    assert!(text.contains("      note: requires unconfigured role(s): outside"));
    assert!(text.ends_with("3 scenarios: 1 passed, 1 failed, 0 errored, 1 skipped (1500 ms)\n"));
}

#[test]
fn json_report_is_canonical() {
    let json = render(&sample_report(), ReportFormat::Json).unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["summary"]["failed"], 1);
    assert_eq!(value["results"][1]["status"], "failed");
    assert_eq!(value["results"][1]["failures"][0]["phase"], "steps");
    assert!(json.starts_with("{\"duration_ms\":1500,"));
}

#[test]
fn junit_report_escapes_and_classifies() {
    let xml = render_junit(&sample_report());
    assert!(xml.contains("tests=\"3\" failures=\"1\" errors=\"0\" skipped=\"1\" time=\"1.500\""));
    assert!(xml.contains("name=\"clients: duplicate &lt;conflict&gt;\" classname=\"pedant.clients\""));
    assert!(xml.contains("<failure message=\"POST /clients as admin\">"));
    assert!(xml.contains("<skipped message=\"requires unconfigured role(s): outside\"/>"));
    assert!(xml.ends_with("</testsuite>\n"));
}
