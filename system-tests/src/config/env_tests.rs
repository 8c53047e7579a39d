// system-tests/src/config/env_tests.rs
// ============================================================================
// Module: System Test Env Unit Tests
// Description: Unit coverage for strict environment parsing in system-tests.
// Purpose: Ensure configuration parsing fails closed on invalid inputs.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Invariants:
//! - Environment parsing rejects invalid or empty values.
//! - Tests restore environment state after each run.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use super::SystemTestConfig;
use super::SystemTestEnv;

mod env_mut {
    #![allow(unsafe_code, reason = "Tests mutate process env vars in a controlled scope.")]

    /// Sets an environment variable for the current process.
    pub fn set_var(key: &str, value: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    /// Removes an environment variable from the current process.
    pub fn remove_var(key: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::remove_var(key);
        }
    }
}

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock poisoned")
}

/// Snapshots every system-test variable, clears them, and restores on drop.
struct EnvGuard {
    entries: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn cleared() -> Self {
        let entries = SystemTestEnv::all()
            .iter()
            .map(|key| (key.as_str(), std::env::var(key.as_str()).ok()))
            .collect();
        for key in SystemTestEnv::all() {
            env_mut::remove_var(key.as_str());
        }
        Self {
            entries,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in self.entries.drain(..) {
            match value {
                Some(value) => env_mut::set_var(name, &value),
                None => env_mut::remove_var(name),
            }
        }
    }
}

#[test]
fn unset_environment_yields_defaults() {
    let _lock = env_lock();
    let _guard = EnvGuard::cleared();

    assert_eq!(SystemTestConfig::load().unwrap(), SystemTestConfig::default());
}

#[test]
fn timeout_rejects_invalid_values() {
    let _lock = env_lock();
    let _guard = EnvGuard::cleared();

    env_mut::set_var(SystemTestEnv::TimeoutSeconds.as_str(), "0");
    assert!(SystemTestConfig::load().is_err());

    env_mut::set_var(SystemTestEnv::TimeoutSeconds.as_str(), "not-a-number");
    assert!(SystemTestConfig::load().is_err());

    env_mut::set_var(SystemTestEnv::TimeoutSeconds.as_str(), "   ");
    assert!(SystemTestConfig::load().is_err());
}

#[test]
fn timeout_override_only_lengthens() {
    let _lock = env_lock();
    let _guard = EnvGuard::cleared();

    env_mut::set_var(SystemTestEnv::TimeoutSeconds.as_str(), "5");
    let config = SystemTestConfig::load().expect("config should load");
    assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    assert_eq!(config.effective_timeout(Duration::from_secs(2)), Duration::from_secs(5));
    assert_eq!(config.effective_timeout(Duration::from_secs(30)), Duration::from_secs(30));
}

#[test]
fn cli_binary_is_read_as_a_path() {
    let _lock = env_lock();
    let _guard = EnvGuard::cleared();

    env_mut::set_var(SystemTestEnv::CliBinary.as_str(), "/opt/pedant/bin/pedant");
    let config = SystemTestConfig::load().unwrap();
    assert_eq!(config.cli_binary, Some(PathBuf::from("/opt/pedant/bin/pedant")));
}

#[test]
fn allow_overwrite_parses_bool_values() {
    let _lock = env_lock();
    let _guard = EnvGuard::cleared();

    env_mut::set_var(SystemTestEnv::AllowOverwrite.as_str(), "1");
    assert!(SystemTestConfig::load().unwrap().allow_overwrite);

    env_mut::set_var(SystemTestEnv::AllowOverwrite.as_str(), "FALSE");
    assert!(!SystemTestConfig::load().unwrap().allow_overwrite);

    env_mut::set_var(SystemTestEnv::AllowOverwrite.as_str(), "maybe");
    assert!(SystemTestConfig::load().is_err());
}

#[test]
fn empty_values_fail_closed() {
    let _lock = env_lock();
    let _guard = EnvGuard::cleared();

    env_mut::set_var(SystemTestEnv::RunRoot.as_str(), "");
    assert!(SystemTestConfig::load().is_err());
}
