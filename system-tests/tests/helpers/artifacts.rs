// system-tests/tests/helpers/artifacts.rs
// ============================================================================
// Module: Test Artifacts
// Description: Artifact helpers for system-tests.
// Purpose: Keep per-test reports and summaries for CI inspection.
// Dependencies: system-tests, serde, serde_jcs
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use system_tests::config::SystemTestConfig;

/// Summary written when a test finishes.
#[derive(Debug, Serialize)]
struct TestSummary {
    /// Test function name.
    test_name: String,
    /// `pass`, `skip`, `panic` or `unknown`.
    status: String,
    /// Wall clock duration.
    duration_ms: u128,
    /// Free-form notes.
    notes: Vec<String>,
    /// Files written next to the summary.
    artifacts: Vec<String>,
}

/// Milliseconds since the epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Artifact directory for one test.
#[derive(Debug, Clone)]
pub struct TestArtifacts {
    /// Directory holding this test's files.
    root: PathBuf,
}

impl TestArtifacts {
    /// Creates the artifact directory, refusing to reuse one unless allowed.
    pub fn new(test_name: &str) -> io::Result<Self> {
        let config = SystemTestConfig::load().map_err(io::Error::other)?;
        let root = match config.run_root {
            Some(run_root) => run_root.join(test_name),
            None => PathBuf::from("target/system-tests").join(format!("run_{}", now_millis())).join(test_name),
        };
        if root.exists() && !config.allow_overwrite {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists; set PEDANT_SYSTEM_TEST_ALLOW_OVERWRITE=1 to reuse it", root.display()),
            ));
        }
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
        })
    }

    /// Returns the artifact directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a JSON artifact using canonical JCS serialization.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> io::Result<PathBuf> {
        let bytes = serde_jcs::to_vec(value).map_err(|err| io::Error::other(err.to_string()))?;
        let path = self.root.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Writes a text artifact.
    pub fn write_text(&self, name: &str, value: &str) -> io::Result<PathBuf> {
        let path = self.root.join(name);
        fs::write(&path, value.as_bytes())?;
        Ok(path)
    }
}

/// Writes `summary.json` when finished, or on drop if the test panicked.
pub struct TestReporter {
    /// Artifact directory.
    artifacts: TestArtifacts,
    /// Test function name.
    test_name: String,
    /// Start time.
    started_at_ms: u128,
    /// Whether [`TestReporter::finish`] ran.
    finalized: bool,
}

impl TestReporter {
    /// Creates a reporter for the named test.
    pub fn new(test_name: &str) -> io::Result<Self> {
        Ok(Self {
            artifacts: TestArtifacts::new(test_name)?,
            test_name: test_name.to_string(),
            started_at_ms: now_millis(),
            finalized: false,
        })
    }

    /// Returns the artifact manager.
    pub fn artifacts(&self) -> &TestArtifacts {
        &self.artifacts
    }

    /// Writes the final summary.
    pub fn finish(&mut self, status: &str, notes: Vec<String>, artifacts: Vec<String>) -> io::Result<()> {
        let summary = TestSummary {
            test_name: self.test_name.clone(),
            status: status.to_string(),
            duration_ms: now_millis().saturating_sub(self.started_at_ms),
            notes,
            artifacts,
        };
        self.artifacts.write_json("summary.json", &summary)?;
        self.finalized = true;
        Ok(())
    }
}

impl Drop for TestReporter {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        let status = if std::thread::panicking() { "panic" } else { "unknown" };
        let _ = self.finish(status, vec!["test ended without a summary".to_string()], Vec::new());
    }
}
