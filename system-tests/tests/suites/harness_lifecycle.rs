// system-tests/tests/suites/harness_lifecycle.rs
// ============================================================================
// Module: Harness Lifecycle Tests
// Description: Setup, run, and teardown against the signature-checking stub.
// Purpose: Prove the live transport signs what a real server verifies.
// Dependencies: system-tests helpers, pedant-config, pedant-harness, pedant-http
// ============================================================================

//! End-to-end platform lifecycle coverage for pedant system-tests.

use std::sync::Arc;

use helpers::artifacts::TestReporter;
use helpers::chef_stub::ChefStub;
use helpers::fixtures::ADMIN_USER;
use helpers::fixtures::ORG;
use helpers::fixtures::SUPERUSER;
use helpers::fixtures::config_toml;
use helpers::fixtures::public_key;
use pedant_config::PedantConfig;
use pedant_harness::CatalogContext;
use pedant_harness::Platform;
use pedant_harness::PlatformSetupError;
use pedant_harness::PlatformState;
use pedant_harness::ReportFormat;
use pedant_harness::TagFilter;
use pedant_harness::build_transport;
use pedant_harness::builtin_scenarios;
use pedant_harness::render;
use pedant_harness::run_suite;
use pedant_http::NoopRequestLog;

use crate::helpers;

/// Key size for scenario-owned identities in these runs.
const TEST_KEY_BITS: usize = 1024;

fn platform_for(stub: &ChefStub) -> Result<(PedantConfig, Platform), Box<dyn std::error::Error>> {
    let config = PedantConfig::from_toml_str(&config_toml(stub.base_url(), ""))?;
    let transport = build_transport(&config, Arc::new(NoopRequestLog))?;
    let platform = Platform::configure(&config, transport)?;
    Ok((config, platform))
}

#[test]
fn status_and_authentication_suites_pass_against_stub() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("status_and_authentication_suites_pass_against_stub")?;
    let stub = ChefStub::start(ORG, SUPERUSER, public_key("admin")?)?;
    let (config, mut platform) = platform_for(&stub)?;

    platform.setup()?;
    assert_eq!(platform.state(), PlatformState::Ready);
    assert!(stub.has_user(ADMIN_USER));

    let context = CatalogContext::from_config(&config).with_key_bits(TEST_KEY_BITS);
    let filter = TagFilter::parse(["status", "authentication"]);
    let selected: Vec<_> =
        builtin_scenarios(&context)?.into_iter().filter(|scenario| filter.matches(&scenario.tags)).collect();
    assert!(selected.len() > 10);

    let report = run_suite(&platform, &selected, config.parallelism);
    reporter.artifacts().write_text("report.json", &render(&report, ReportFormat::Json)?)?;
    let failures: Vec<String> = report
        .results
        .iter()
        .filter(|result| !result.failures.is_empty())
        .map(|result| format!("{}: {:?}", result.name, result.failures))
        .collect();
    assert!(failures.is_empty(), "unexpected failures: {failures:#?}");
    assert_eq!(report.summary.passed, selected.len());

    let rejected = stub.seen().iter().filter(|seen| seen.status == 401).count();
    assert_eq!(rejected, selected.iter().filter(|scenario| scenario.name.starts_with("auth headers:")).count() - 1);

    let teardown = platform.teardown()?;
    assert!(teardown.is_clean(), "teardown failures: {:?}", teardown.failures);
    assert_eq!(teardown.deleted, vec![format!("users/{ADMIN_USER}")]);
    assert!(!stub.has_user(ADMIN_USER));
    assert!(stub.has_user(SUPERUSER));

    reporter.finish("pass", Vec::new(), vec!["summary.json".to_string(), "report.json".to_string()])?;
    Ok(())
}

#[test]
fn existing_identity_is_re_registered_and_kept() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("existing_identity_is_re_registered_and_kept")?;
    let stub = ChefStub::start(ORG, SUPERUSER, public_key("admin")?)?;

    let (_, mut first) = platform_for(&stub)?;
    first.setup()?;
    let (_, mut second) = platform_for(&stub)?;
    second.setup()?;

    let puts = stub
        .seen()
        .iter()
        .filter(|seen| seen.method == "PUT" && seen.path == format!("/users/{ADMIN_USER}"))
        .count();
    assert_eq!(puts, 1);

    let second_teardown = second.teardown()?;
    assert!(second_teardown.deleted.is_empty());
    assert!(stub.has_user(ADMIN_USER));

    let first_teardown = first.teardown()?;
    assert_eq!(first_teardown.deleted.len(), 1);
    assert!(!stub.has_user(ADMIN_USER));

    reporter.finish("pass", Vec::new(), vec!["summary.json".to_string()])?;
    Ok(())
}

#[test]
fn setup_fails_when_superuser_key_is_not_registered() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("setup_fails_when_superuser_key_is_not_registered")?;
    let stub = ChefStub::start(ORG, SUPERUSER, public_key("alt")?)?;
    let (_, mut platform) = platform_for(&stub)?;

    match platform.setup() {
        Err(PlatformSetupError::Superuser {
            name,
            status,
        }) => {
            assert_eq!(name, SUPERUSER);
            assert_eq!(status, 401);
        }
        other => panic!("expected superuser rejection, got {other:?}"),
    }
    assert!(!stub.has_user(ADMIN_USER));
    assert_eq!(platform.state(), PlatformState::Configured);

    reporter.finish("pass", Vec::new(), vec!["summary.json".to_string()])?;
    Ok(())
}
