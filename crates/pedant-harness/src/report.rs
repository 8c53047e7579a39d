// crates/pedant-harness/src/report.rs
// ============================================================================
// Module: Pedant Suite Reports
// Description: Scenario results and plain, JSON, and JUnit renderings.
// Purpose: Report pass/fail per scenario with the matcher's diff.
// Dependencies: serde, serde_jcs
// ============================================================================

//! ## Overview
//! [`SuiteReport`] collects one [`ScenarioResult`] per executed scenario.
//! Renderers are pure functions returning text; [`write_report`] persists
//! it. JSON output is canonical (JCS) so reports diff cleanly between runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Final status of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Every step produced its expected outcome.
    Passed,
    /// A step produced a different outcome than expected.
    Failed,
    /// Setup failed or a step hit an unexpected error.
    Errored,
    /// Not run; required identities are missing.
    Skipped,
}

impl ScenarioStatus {
    /// Returns the status label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Skipped => "skipped",
        }
    }
}

/// Scenario phase a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Preparation steps.
    Setup,
    /// Steps under test.
    Steps,
    /// Cleanup steps.
    Cleanup,
}

impl Phase {
    /// Returns the phase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Steps => "steps",
            Self::Cleanup => "cleanup",
        }
    }
}

/// A failing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// Phase of the step.
    pub phase: Phase,
    /// Step label.
    pub step: String,
    /// Matcher diff or error text.
    pub detail: String,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    /// Scenario name.
    pub name: String,
    /// Scenario tags, sorted.
    pub tags: Vec<String>,
    /// Final status.
    pub status: ScenarioStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Failing steps; at most one outside cleanup.
    pub failures: Vec<StepFailure>,
    /// Skip reasons and cleanup problems.
    pub notes: Vec<String>,
}

/// Counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SuiteSummary {
    /// Scenarios executed or skipped.
    pub total: usize,
    /// Passed scenarios.
    pub passed: usize,
    /// Failed scenarios.
    pub failed: usize,
    /// Errored scenarios.
    pub errored: usize,
    /// Skipped scenarios.
    pub skipped: usize,
}

/// Results of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// Counts by status.
    pub summary: SuiteSummary,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Results in scenario order.
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    /// Builds a report and its summary.
    #[must_use]
    pub fn new(results: Vec<ScenarioResult>, elapsed: Duration) -> Self {
        let mut summary = SuiteSummary {
            total: results.len(),
            ..SuiteSummary::default()
        };
        for result in &results {
            match result.status {
                ScenarioStatus::Passed => summary.passed += 1,
                ScenarioStatus::Failed => summary.failed += 1,
                ScenarioStatus::Errored => summary.errored += 1,
                ScenarioStatus::Skipped => summary.skipped += 1,
            }
        }
        Self {
            summary,
            duration_ms: millis(elapsed),
            results,
        }
    }

    /// Returns true when nothing failed or errored.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.summary.failed == 0 && self.summary.errored == 0
    }
}

/// Converts a duration to whole milliseconds, saturating.
#[must_use]
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Renderers
// ============================================================================

/// Output format for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Documentation-style text.
    Plain,
    /// Canonical JSON.
    Json,
    /// JUnit XML.
    Junit,
}

/// Report rendering and writing failures.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report could not be serialized.
    #[error("report serialization failed: {0}")]
    Serialize(String),
    /// The report could not be written.
    #[error("report write failed: {0}")]
    Io(String),
}

/// Renders a report in the requested format.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] when JSON serialization fails.
pub fn render(report: &SuiteReport, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        ReportFormat::Plain => Ok(render_plain(report)),
        ReportFormat::Json => render_json(report),
        ReportFormat::Junit => Ok(render_junit(report)),
    }
}

/// Renders one line per scenario, failure detail indented below it, and a
/// closing summary.
#[must_use]
pub fn render_plain(report: &SuiteReport) -> String {
    let mut out = String::new();
    for result in &report.results {
        let marker = match result.status {
            ScenarioStatus::Passed => "PASS ",
            ScenarioStatus::Failed => "FAIL ",
            ScenarioStatus::Errored => "ERROR",
            ScenarioStatus::Skipped => "SKIP ",
        };
        let _ = writeln!(out, "{marker} {} ({} ms)", result.name, result.duration_ms);
        for failure in &result.failures {
            let _ = writeln!(out, "      {}: {}", failure.phase.as_str(), failure.step);
            for line in failure.detail.lines() {
                let _ = writeln!(out, "        {line}");
            }
        }
        for note in &result.notes {
            let _ = writeln!(out, "      note: {note}");
        }
    }
    let summary = &report.summary;
    let _ = writeln!(
        out,
        "\n{} scenarios: {} passed, {} failed, {} errored, {} skipped ({} ms)",
        summary.total, summary.passed, summary.failed, summary.errored, summary.skipped, report.duration_ms
    );
    out
}

/// Renders the report as canonical JSON.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] when serialization fails.
pub fn render_json(report: &SuiteReport) -> Result<String, ReportError> {
    serde_jcs::to_string(report).map_err(|err| ReportError::Serialize(err.to_string()))
}

/// Renders a single JUnit `testsuite` document.
#[must_use]
pub fn render_junit(report: &SuiteReport) -> String {
    let summary = &report.summary;
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<testsuite name=\"pedant\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{}\">",
        summary.total,
        summary.failed,
        summary.errored,
        summary.skipped,
        seconds(report.duration_ms)
    );
    for result in &report.results {
        let classname = result.tags.first().map_or("pedant", String::as_str);
        let _ = write!(
            out,
            "  <testcase name=\"{}\" classname=\"pedant.{}\" time=\"{}\"",
            escape_xml(&result.name),
            escape_xml(classname),
            seconds(result.duration_ms)
        );
        let detail = failure_text(result);
        match result.status {
            ScenarioStatus::Passed => out.push_str("/>\n"),
            ScenarioStatus::Skipped => {
                let _ = writeln!(out, ">\n    <skipped message=\"{}\"/>\n  </testcase>", escape_xml(&detail));
            }
            ScenarioStatus::Failed | ScenarioStatus::Errored => {
                let element = if result.status == ScenarioStatus::Failed { "failure" } else { "error" };
                let message = result.failures.first().map_or("", |failure| failure.step.as_str());
                let _ = writeln!(
                    out,
                    ">\n    <{element} message=\"{}\">{}</{element}>\n  </testcase>",
                    escape_xml(message),
                    escape_xml(&detail)
                );
            }
        }
    }
    out.push_str("</testsuite>\n");
    out
}

/// Writes rendered report text to a file.
///
/// # Errors
///
/// Returns [`ReportError::Io`] when the file cannot be written.
pub fn write_report(path: &Path, contents: &str) -> Result<(), ReportError> {
    fs::write(path, contents).map_err(|err| ReportError::Io(format!("{}: {err}", path.display())))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins failure details and notes for JUnit bodies.
fn failure_text(result: &ScenarioResult) -> String {
    let mut lines: Vec<String> = result
        .failures
        .iter()
        .map(|failure| format!("{} {}: {}", failure.phase.as_str(), failure.step, failure.detail))
        .collect();
    lines.extend(result.notes.iter().cloned());
    lines.join("\n")
}

/// Formats milliseconds as decimal seconds.
fn seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Escapes text for XML attributes and content.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            ch if ch.is_control() && ch != '\n' && ch != '\t' => {}
            ch => out.push(ch),
        }
    }
    out
}
