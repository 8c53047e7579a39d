// crates/pedant-cli/src/main.rs
// ============================================================================
// Module: Pedant CLI Entry Point
// Description: Loads configuration, selects scenarios, and runs the suite.
// Purpose: Provide the `pedant` command used in CI and by operators.
// Dependencies: clap, pedant-config, pedant-harness, pedant-http, thiserror.
// ============================================================================

//! ## Overview
//! `pedant` loads `pedant.toml`, filters the built-in catalog by tag, sets up
//! the platform, runs the selected scenarios and tears the platform down.
//! Exit status is 0 when every scenario passed or was skipped, 1 when any
//! failed or errored, and 2 when configuration or platform setup failed.
//! `--list` prints the selection without contacting the server.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Parser;
use clap::ValueEnum;
use pedant_config::PedantConfig;
use pedant_harness::CatalogContext;
use pedant_harness::Platform;
use pedant_harness::ReportFormat;
use pedant_harness::Scenario;
use pedant_harness::SuiteReport;
use pedant_harness::TagFilter;
use pedant_harness::build_transport;
use pedant_harness::builtin_scenarios;
use pedant_harness::render;
use pedant_harness::run_suite;
use pedant_harness::write_report;
use pedant_http::FileRequestLog;
use pedant_http::NoopRequestLog;
use pedant_http::RequestLog;
use pedant_http::StderrRequestLog;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit status when any scenario failed or errored.
const EXIT_SCENARIO_FAILURE: u8 = 1;
/// Exit status when the suite could not run at all.
const EXIT_SETUP_FAILURE: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "pedant", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue)]
    show_version: bool,
    /// Configuration file (defaults to `PEDANT_CONFIG`, then `pedant.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Run only scenarios carrying one of these tags; `~tag` excludes.
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,
    /// Skip scenarios carrying this tag.
    #[arg(long = "skip-tag", value_name = "TAG")]
    skip_tags: Vec<String>,
    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = FormatArg::Plain)]
    format: FormatArg,
    /// Also write a JUnit XML report here (overrides `junit_file`).
    #[arg(long, value_name = "PATH")]
    junit: Option<PathBuf>,
    /// Log every HTTP exchange to stderr as JSON lines.
    #[arg(long = "log-stderr", action = ArgAction::SetTrue)]
    log_stderr: bool,
    /// Print the selected scenarios and exit without contacting the server.
    #[arg(long, action = ArgAction::SetTrue)]
    list: bool,
    /// Ignore every tag filter.
    #[arg(long = "run-all", action = ArgAction::SetTrue)]
    run_all: bool,
    /// Number of scenarios run concurrently (overrides `parallelism`).
    #[arg(long, value_name = "N")]
    parallelism: Option<usize>,
}

/// Report formats accepted by `--format`.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum FormatArg {
    /// Documentation-style text.
    Plain,
    /// Canonical JSON.
    Json,
    /// JUnit XML.
    Junit,
}

impl From<FormatArg> for ReportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Plain => Self::Plain,
            FormatArg::Json => Self::Json,
            FormatArg::Junit => Self::Junit,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying the message printed to stderr.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Loads configuration and dispatches to listing or execution.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        write_stdout_line(&format!("pedant {}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = PedantConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("config error: {err}")))?;
    apply_overrides(&mut config, &cli)?;

    let filter = build_filter(&config.tags, &cli);
    let context = CatalogContext::from_config(&config);
    let catalog = builtin_scenarios(&context).map_err(|err| CliError::new(err.to_string()))?;
    let selected = select_scenarios(catalog, &filter);

    if cli.list {
        for line in list_lines(&selected) {
            write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    command_run(&config, &cli, &selected)
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Sets up the platform, runs the selection, tears down, and reports.
fn command_run(config: &PedantConfig, cli: &Cli, scenarios: &[Scenario]) -> CliResult<ExitCode> {
    let log = request_log(config, cli.log_stderr)?;
    let transport = build_transport(config, log).map_err(|err| CliError::new(err.to_string()))?;
    let mut platform = Platform::configure(config, transport).map_err(|err| CliError::new(err.to_string()))?;
    platform.setup().map_err(|err| CliError::new(format!("platform setup failed: {err}")))?;

    let report = run_suite(&platform, scenarios, config.parallelism);

    match platform.teardown() {
        Ok(teardown) => {
            for failure in &teardown.failures {
                write_stderr_line(&format!("teardown: {failure}"))
                    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
            }
        }
        Err(err) => {
            write_stderr_line(&format!("teardown: {err}")).map_err(|err| CliError::new(output_error("stderr", &err)))?;
        }
    }

    let junit_path = cli.junit.clone().or_else(|| config.junit_file.as_deref().map(|path| config.resolve_path(path)));
    for err in publish_report(&report, cli.format.into(), junit_path.as_deref()) {
        write_stderr_line(&format!("report output failed: {err}"))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    Ok(exit_code(&report))
}

/// Emits the report and the optional JUnit file, collecting write failures.
/// Write failures never change the exit status.
fn publish_report(report: &SuiteReport, format: ReportFormat, junit_path: Option<&Path>) -> Vec<CliError> {
    let mut errors = Vec::new();
    if let Err(err) = emit_report(report, format) {
        errors.push(err);
    }
    if let Some(path) = junit_path
        && let Err(err) = write_junit(report, path)
    {
        errors.push(err);
    }
    errors
}

/// Selects the HTTP exchange log sink.
fn request_log(config: &PedantConfig, log_stderr: bool) -> CliResult<Arc<dyn RequestLog>> {
    if log_stderr {
        return Ok(Arc::new(StderrRequestLog));
    }
    match &config.log_file {
        Some(path) => {
            let log = FileRequestLog::open(&config.resolve_path(path))
                .map_err(|err| CliError::new(format!("log file error: {err}")))?;
            Ok(Arc::new(log))
        }
        None => Ok(Arc::new(NoopRequestLog)),
    }
}

/// Writes the rendered report to stdout.
fn emit_report(report: &SuiteReport, format: ReportFormat) -> CliResult<()> {
    let output = render(report, format).map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(output.trim_end()).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes the JUnit report file.
fn write_junit(report: &SuiteReport, path: &Path) -> CliResult<()> {
    let xml = render(report, ReportFormat::Junit).map_err(|err| CliError::new(err.to_string()))?;
    write_report(path, &xml).map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Applies command line overrides and revalidates the configuration.
fn apply_overrides(config: &mut PedantConfig, cli: &Cli) -> CliResult<()> {
    if let Some(parallelism) = cli.parallelism {
        config.parallelism = parallelism;
        config.validate().map_err(|err| CliError::new(format!("config error: {err}")))?;
    }
    Ok(())
}

/// Combines configured tags with `--tag`, `--skip-tag` and `--run-all`.
fn build_filter(config_tags: &[String], cli: &Cli) -> TagFilter {
    let mut filter = TagFilter::parse(config_tags.iter().chain(&cli.tags));
    for tag in &cli.skip_tags {
        filter.exclude(tag);
    }
    filter.run_all(cli.run_all)
}

/// Keeps the scenarios the filter selects, in catalog order.
fn select_scenarios(scenarios: Vec<Scenario>, filter: &TagFilter) -> Vec<Scenario> {
    scenarios.into_iter().filter(|scenario| filter.matches(&scenario.tags)).collect()
}

/// One `name [tag, tag]` line per scenario.
fn list_lines(scenarios: &[Scenario]) -> Vec<String> {
    scenarios
        .iter()
        .map(|scenario| {
            let tags: Vec<&str> = scenario.tags.iter().map(String::as_str).collect();
            format!("{} [{}]", scenario.name, tags.join(", "))
        })
        .collect()
}

/// Maps a suite report onto the process exit status.
fn exit_code(report: &SuiteReport) -> ExitCode {
    if report.is_success() { ExitCode::SUCCESS } else { ExitCode::from(EXIT_SCENARIO_FAILURE) }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns the setup failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::from(EXIT_SETUP_FAILURE)
}
