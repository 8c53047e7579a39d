// system-tests/tests/suites/cli_runs.rs
// ============================================================================
// Module: CLI Run Tests
// Description: End-to-end `pedant` invocations against the stub server.
// Purpose: Pin exit codes, report output, and JUnit files as CI sees them.
// Dependencies: system-tests helpers, serde_json, tempfile
// ============================================================================

//! CLI workflow coverage for pedant system-tests.

use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::path::PathBuf;

use helpers::artifacts::TestReporter;
use helpers::chef_stub::ChefStub;
use helpers::cli::CliRun;
use helpers::cli::cli_binary;
use helpers::cli::run_cli;
use helpers::fixtures::ORG;
use helpers::fixtures::SUPERUSER;
use helpers::fixtures::config_toml;
use helpers::fixtures::public_key;
use serde_json::Value;
use tempfile::TempDir;

use crate::helpers;

/// Writes `pedant.toml` into `dir` and returns its path.
fn write_config(dir: &Path, server_url: &str, extra: &str) -> std::io::Result<PathBuf> {
    let path = dir.join("pedant.toml");
    fs::write(&path, config_toml(server_url, extra))?;
    Ok(path)
}

/// A loopback URL nothing is listening on.
fn closed_port_url() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(format!("http://127.0.0.1:{port}"))
}

/// Runs the CLI with `--config <config>` followed by `args`.
fn pedant(binary: &Path, dir: &Path, config: &Path, args: &[&str]) -> Result<CliRun, String> {
    let config = config.to_string_lossy().into_owned();
    let mut argv = vec!["--config", config.as_str()];
    argv.extend_from_slice(args);
    run_cli(binary, dir, &argv)
}

/// Records a skip when the binary cannot be located.
fn skip(reporter: &mut TestReporter) -> Result<(), Box<dyn std::error::Error>> {
    reporter.finish("skip", vec!["pedant CLI binary unavailable".to_string()], vec!["summary.json".to_string()])?;
    Ok(())
}

#[test]
fn list_prints_selection_without_contacting_the_server() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("list_prints_selection_without_contacting_the_server")?;
    let Some(cli) = cli_binary() else {
        return skip(&mut reporter);
    };
    let dir = TempDir::new()?;
    let config = write_config(dir.path(), &closed_port_url()?, "")?;

    let run = pedant(&cli, dir.path(), &config, &["--list", "--tag", "status"])?;
    assert_eq!(run.code, Some(0), "stderr: {}", run.stderr);
    let lines: Vec<&str> = run.stdout.lines().collect();
    assert_eq!(lines, vec!["status: GET /_status reports pong [smoke, status]", "status: unknown endpoint is not found [status]"]);

    reporter.finish("pass", Vec::new(), vec!["summary.json".to_string()])?;
    Ok(())
}

#[test]
fn passing_run_exits_zero_and_writes_junit() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("passing_run_exits_zero_and_writes_junit")?;
    let Some(cli) = cli_binary() else {
        return skip(&mut reporter);
    };
    let stub = ChefStub::start(ORG, SUPERUSER, public_key("admin")?)?;
    let dir = TempDir::new()?;
    let config = write_config(dir.path(), stub.base_url(), "junit_file = 'junit.xml'")?;

    let run = pedant(&cli, dir.path(), &config, &["--tag", "status", "--tag", "authentication", "--format", "json"])?;
    reporter.artifacts().write_text("stdout.json", &run.stdout)?;
    reporter.artifacts().write_text("stderr.log", &run.stderr)?;
    assert_eq!(run.code, Some(0), "stderr: {}", run.stderr);

    let report: Value = serde_json::from_str(&run.stdout)?;
    assert_eq!(report["summary"]["failed"], 0);
    assert_eq!(report["summary"]["errored"], 0);
    assert!(report["summary"]["passed"].as_u64().unwrap_or_default() > 10);

    let junit = fs::read_to_string(dir.path().join("junit.xml"))?;
    assert!(junit.contains("failures=\"0\" errors=\"0\""));
    assert!(!run.stderr.contains("teardown:"));

    reporter.finish(
        "pass",
        Vec::new(),
        vec!["summary.json".to_string(), "stdout.json".to_string(), "stderr.log".to_string()],
    )?;
    Ok(())
}

#[test]
fn failing_scenario_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("failing_scenario_exits_one")?;
    let Some(cli) = cli_binary() else {
        return skip(&mut reporter);
    };
    let stub = ChefStub::start(ORG, SUPERUSER, public_key("admin")?)?;
    stub.set_status("fail");
    let dir = TempDir::new()?;
    let config = write_config(dir.path(), stub.base_url(), "")?;

    let run = pedant(&cli, dir.path(), &config, &["--tag", "status"])?;
    assert_eq!(run.code, Some(1), "stderr: {}", run.stderr);
    assert!(run.stdout.contains("FAIL  status: GET /_status reports pong"));
    assert!(run.stdout.contains("PASS  status: unknown endpoint is not found"));

    reporter.finish("pass", Vec::new(), vec!["summary.json".to_string()])?;
    Ok(())
}

#[test]
fn unreachable_server_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("unreachable_server_exits_two")?;
    let Some(cli) = cli_binary() else {
        return skip(&mut reporter);
    };
    let dir = TempDir::new()?;
    let config = write_config(dir.path(), &closed_port_url()?, "")?;

    let run = pedant(&cli, dir.path(), &config, &["--tag", "status"])?;
    assert_eq!(run.code, Some(2));
    assert!(run.stderr.contains("platform setup failed"), "stderr: {}", run.stderr);
    assert!(run.stdout.is_empty());

    reporter.finish("pass", Vec::new(), vec!["summary.json".to_string()])?;
    Ok(())
}

#[test]
fn invalid_parallelism_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("invalid_parallelism_exits_two")?;
    let Some(cli) = cli_binary() else {
        return skip(&mut reporter);
    };
    let dir = TempDir::new()?;
    let config = write_config(dir.path(), &closed_port_url()?, "")?;

    let run = pedant(&cli, dir.path(), &config, &["--list", "--parallelism", "0"])?;
    assert_eq!(run.code, Some(2));
    assert!(run.stderr.contains("parallelism must be between 1 and"), "stderr: {}", run.stderr);

    reporter.finish("pass", Vec::new(), vec!["summary.json".to_string()])?;
    Ok(())
}
