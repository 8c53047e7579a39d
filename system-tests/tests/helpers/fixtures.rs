// system-tests/tests/helpers/fixtures.rs
// ============================================================================
// Module: Run Fixtures
// Description: Keys, identities, and `pedant.toml` text for stub runs.
// Purpose: Keep every suite pointed at the same identities and key files.
// Dependencies: pedant-core, system-tests
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use pedant_core::PrivateKey;
use pedant_core::PublicKey;
use system_tests::config::SystemTestConfig;

/// Organization served by the stub.
pub const ORG: &str = "acme";
/// Superuser known to the stub from the start.
pub const SUPERUSER: &str = "pivotal";
/// Admin user the platform provisions during setup.
pub const ADMIN_USER: &str = "pedant-admin";
/// Request timeout before the env override is applied.
const BASE_TIMEOUT: Duration = Duration::from_secs(10);

/// Absolute path of a fixture key (`admin` or `alt`).
pub fn key_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../crates/pedant-core/tests/fixtures/keys")
        .join(format!("{name}.pem"))
}

/// Public half of a fixture key.
pub fn public_key(name: &str) -> Result<PublicKey, String> {
    PrivateKey::from_pem_file(&key_path(name))
        .map(|key| key.public_key())
        .map_err(|err| format!("fixture key {name}: {err}"))
}

/// Configuration for a run against `server_url`.
///
/// The superuser signs with the `admin` key; the provisioned admin user is
/// registered with the `alt` key. `extra` holds additional top-level keys.
pub fn config_toml(server_url: &str, extra: &str) -> String {
    let timeout = SystemTestConfig::load()
        .map(|config| config.effective_timeout(BASE_TIMEOUT))
        .unwrap_or(BASE_TIMEOUT)
        .as_secs();
    format!(
        r#"
chef_server = '{server_url}'
org = '{ORG}'
timeout_secs = {timeout}
maximum_search_time_secs = 5
parallelism = 4
superuser = {{ name = '{SUPERUSER}', key_path = '{superuser_key}' }}
{extra}

[[requestors]]
role = "admin"
kind = "user"
name = '{ADMIN_USER}'
key_path = '{admin_key}'
admin = true
create = true
"#,
        superuser_key = key_path("admin").display(),
        admin_key = key_path("alt").display(),
    )
}
