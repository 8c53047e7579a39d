// system-tests/tests/helpers/cli.rs
// ============================================================================
// Module: CLI Helpers
// Description: Locates and invokes the `pedant` binary.
// Purpose: Share binary resolution and process capture across suites.
// Dependencies: system-tests, std::process
// ============================================================================

//! Helpers for invoking the `pedant` CLI in system-tests.

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use system_tests::config::SystemTestConfig;

/// Binary name produced by the `pedant-cli` package.
const BINARY: &str = "pedant";

/// Captured result of one CLI invocation.
#[derive(Debug)]
pub struct CliRun {
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Locates the CLI: the env override, the profile directory, then a build.
pub fn cli_binary() -> Option<PathBuf> {
    if let Some(path) = SystemTestConfig::load().ok().and_then(|config| config.cli_binary) {
        return path.exists().then_some(path);
    }
    if let Some(path) = option_env!("CARGO_BIN_EXE_pedant").map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
    }
    let sibling = profile_dir().map(|dir| dir.join(binary_file_name()));
    if let Some(path) = sibling.filter(|path| path.exists()) {
        return Some(path);
    }
    build_cli_binary().ok()
}

/// Runs the CLI with `args` from `cwd` and captures its output.
pub fn run_cli(binary: &Path, cwd: &Path, args: &[&str]) -> Result<CliRun, String> {
    let output = Command::new(binary)
        .args(args)
        .current_dir(cwd)
        .env_remove("PEDANT_CONFIG")
        .output()
        .map_err(|err| format!("run pedant failed: {err}"))?;
    Ok(CliRun {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// `target/<profile>` derived from the running test executable.
fn profile_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent()?.parent().map(Path::to_path_buf)
}

/// Builds the CLI once per test process into the current target directory.
fn build_cli_binary() -> Result<PathBuf, String> {
    static BUILD: OnceLock<Result<PathBuf, String>> = OnceLock::new();
    BUILD
        .get_or_init(|| {
            let profile = profile_dir().ok_or_else(|| "unable to resolve profile dir".to_string())?;
            let target = profile.parent().ok_or_else(|| "unable to resolve target dir".to_string())?;
            let output = Command::new("cargo")
                .args(["build", "-p", "pedant-cli", "--bin", BINARY, "--target-dir"])
                .arg(target)
                .output()
                .map_err(|err| format!("spawn cargo build failed: {err}"))?;
            if !output.status.success() {
                return Err(format!("cargo build pedant-cli failed: {}", String::from_utf8_lossy(&output.stderr)));
            }
            let candidate = target.join("debug").join(binary_file_name());
            if candidate.exists() { Ok(candidate) } else { Err("pedant binary not found after build".to_string()) }
        })
        .clone()
}

/// Platform-specific file name of the binary.
fn binary_file_name() -> String {
    format!("{BINARY}{}", std::env::consts::EXE_SUFFIX)
}
