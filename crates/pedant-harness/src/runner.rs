// crates/pedant-harness/src/runner.rs
// ============================================================================
// Module: Pedant Scenario Runner
// Description: Executes scenario values against a ready platform.
// Purpose: Turn declarative steps into signed requests and judged results.
// Dependencies: pedant-core, pedant-http, time
// ============================================================================

//! ## Overview
//! [`run_scenario`] is the single entry point for executing a [`Scenario`].
//! Setup failures error the scenario, the first failing main step stops it,
//! and cleanup always runs with its failures recorded as notes.
//! [`run_suite`] fans scenarios out over scoped worker threads that share the
//! platform read-only.
//!
//! Invariants:
//! - A request error is only a pass when the step expects that failure class.
//! - Results are reported in scenario order regardless of parallelism.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;

use pedant_core::CapturedResponse;
use pedant_core::Requestor;
use pedant_core::Role;
use pedant_core::matches;
use pedant_http::KeyManagementError;
use pedant_http::RequestError;
use pedant_http::RequestOptions;
use pedant_http::parse_request_url;
use time::OffsetDateTime;

use crate::platform::Platform;
use crate::report::Phase;
use crate::report::ScenarioResult;
use crate::report::ScenarioStatus;
use crate::report::StepFailure;
use crate::report::SuiteReport;
use crate::report::millis;
use crate::retry::Attempt;
use crate::retry::RetryPolicy;
use crate::retry::retry_until;
use crate::scenario::Actor;
use crate::scenario::KeyAction;
use crate::scenario::KeyStep;
use crate::scenario::Outcome;
use crate::scenario::RequestStep;
use crate::scenario::Scenario;
use crate::scenario::Step;

// ============================================================================
// SECTION: Step Errors
// ============================================================================

/// Why a step did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepError {
    /// The outcome differed from the expectation.
    Mismatch(String),
    /// The step could not be carried out.
    Broken(String),
}

impl StepError {
    /// Returns the detail text.
    fn detail(&self) -> &str {
        match self {
            Self::Mismatch(detail) | Self::Broken(detail) => detail,
        }
    }
}

// ============================================================================
// SECTION: Suite
// ============================================================================

/// Runs scenarios with up to `parallelism` workers.
#[must_use]
pub fn run_suite(platform: &Platform, scenarios: &[Scenario], parallelism: usize) -> SuiteReport {
    let started = Instant::now();
    let workers = parallelism.clamp(1, scenarios.len().max(1));
    let results = if workers == 1 {
        scenarios.iter().map(|scenario| run_scenario(platform, scenario)).collect()
    } else {
        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<ScenarioResult>>> = Mutex::new(vec![None; scenarios.len()]);
        thread::scope(|scope| {
            for _ in 0 .. workers {
                scope.spawn(|| {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(scenario) = scenarios.get(index) else {
                            break;
                        };
                        let result = run_scenario(platform, scenario);
                        let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
                        if let Some(slot) = slots.get_mut(index) {
                            *slot = Some(result);
                        }
                    }
                });
            }
        });
        slots.into_inner().unwrap_or_else(PoisonError::into_inner).into_iter().flatten().collect()
    };
    SuiteReport::new(results, started.elapsed())
}

// ============================================================================
// SECTION: Scenario
// ============================================================================

/// Runs one scenario: setup, main steps, then cleanup.
#[must_use]
pub fn run_scenario(platform: &Platform, scenario: &Scenario) -> ScenarioResult {
    let started = Instant::now();
    let mut result = ScenarioResult {
        name: scenario.name.clone(),
        tags: scenario.tags.iter().cloned().collect(),
        status: ScenarioStatus::Passed,
        duration_ms: 0,
        failures: Vec::new(),
        notes: Vec::new(),
    };

    let missing = missing_roles(platform, scenario);
    if !missing.is_empty() {
        let roles: Vec<&str> = missing.iter().map(|role| role.as_str()).collect();
        result.status = ScenarioStatus::Skipped;
        result.notes.push(format!("requires unconfigured role(s): {}", roles.join(", ")));
        result.duration_ms = millis(started.elapsed());
        return result;
    }

    for step in &scenario.setup {
        if let Err(err) = run_step(platform, step) {
            result.status = ScenarioStatus::Errored;
            result.failures.push(failure(Phase::Setup, step, &err));
            break;
        }
    }

    if result.status == ScenarioStatus::Passed {
        for step in &scenario.steps {
            if let Err(err) = run_step(platform, step) {
                result.status = match err {
                    StepError::Mismatch(_) => ScenarioStatus::Failed,
                    StepError::Broken(_) => ScenarioStatus::Errored,
                };
                result.failures.push(failure(Phase::Steps, step, &err));
                break;
            }
        }
    }

    for step in &scenario.cleanup {
        if let Err(err) = run_step(platform, step) {
            result.notes.push(format!("cleanup {}: {}", step.label(), err.detail()));
        }
    }

    result.duration_ms = millis(started.elapsed());
    result
}

/// Roles the scenario needs that the platform lacks.
fn missing_roles(platform: &Platform, scenario: &Scenario) -> BTreeSet<Role> {
    scenario.required_roles().into_iter().filter(|role| !platform.has_role(*role)).collect()
}

/// Builds a failure record.
fn failure(phase: Phase, step: &Step, err: &StepError) -> StepFailure {
    StepFailure {
        phase,
        step: step.label(),
        detail: err.detail().trim_end().to_string(),
    }
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Runs one step, polling when the step asks for it.
fn run_step(platform: &Platform, step: &Step) -> Result<(), StepError> {
    match step {
        Step::Request(request) if request.retry => {
            let policy = RetryPolicy::for_search(platform.maximum_search_time());
            retry_until(&policy, |_| match run_request(platform, request) {
                Err(StepError::Mismatch(detail)) => Attempt::Retry(Err(StepError::Mismatch(detail))),
                other => Attempt::Done(other),
            })
        }
        Step::Request(request) => run_request(platform, request),
        Step::Keys(keys) => run_key_step(platform, keys),
    }
}

/// Sends one request and judges the outcome.
fn run_request(platform: &Platform, step: &RequestStep) -> Result<(), StepError> {
    let requestor = resolve_actor(platform, &step.actor)?;
    let url = step.target.resolve(platform);
    let result = request_options(step, requestor, &url)
        .and_then(|options| platform.transport().execute(step.method, &url, requestor, &options));
    judge(&step.outcome, result)
}

/// Finds the requestor for an actor.
fn resolve_actor<'a>(platform: &'a Platform, actor: &'a Actor) -> Result<&'a Requestor, StepError> {
    let found = match actor {
        Actor::Role(role) => platform.identity(*role),
        Actor::Named(name) => platform.identity_named(name),
        Actor::Requestor(requestor) => Ok(requestor.as_ref()),
    };
    found.map_err(|err| StepError::Broken(err.to_string()))
}

/// Returns the step's options, with mutated auth headers when requested.
fn request_options(step: &RequestStep, requestor: &Requestor, url: &str) -> Result<RequestOptions, RequestError> {
    let mut options = step.options.clone();
    if let Some(mutation) = &step.mutation {
        let parsed = parse_request_url(url)?;
        let body = match &options.payload {
            Some(payload) => payload.to_bytes()?,
            None => Vec::new(),
        };
        let now = options.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        options.auth_headers = Some(mutation.headers_for(requestor, step.method, &parsed, &body, now)?);
    }
    Ok(options)
}

/// Compares a request result with the expected outcome.
fn judge(outcome: &Outcome, result: Result<CapturedResponse, RequestError>) -> Result<(), StepError> {
    match (outcome, result) {
        (Outcome::Response(expectation), Ok(response)) => {
            let verdict = matches(&response, expectation);
            if verdict.is_ok() { Ok(()) } else { Err(StepError::Mismatch(verdict.diff())) }
        }
        (Outcome::Completed, Ok(_))
        | (Outcome::InvalidUrl, Err(RequestError::InvalidUrl(_)))
        | (Outcome::TransportFailure, Err(RequestError::Transport(_))) => Ok(()),
        (Outcome::InvalidUrl, Ok(response)) => Err(StepError::Mismatch(format!(
            "expected an invalid url error, got status {}",
            response.status()
        ))),
        (Outcome::TransportFailure, Ok(response)) => Err(StepError::Mismatch(format!(
            "expected a transport failure, got status {}",
            response.status()
        ))),
        (Outcome::InvalidUrl, Err(err)) => {
            Err(StepError::Mismatch(format!("expected an invalid url error, got {}: {err}", err.outcome())))
        }
        (Outcome::TransportFailure, Err(err)) => {
            Err(StepError::Mismatch(format!("expected a transport failure, got {}: {err}", err.outcome())))
        }
        (Outcome::Response(_) | Outcome::Completed, Err(err)) => Err(StepError::Broken(err.to_string())),
    }
}

/// Performs one key management call.
fn run_key_step(platform: &Platform, step: &KeyStep) -> Result<(), StepError> {
    let manager = platform.key_manager();
    match &step.action {
        KeyAction::Add(key) => manager.add_key(&step.owner, key).map_err(key_error),
        KeyAction::Delete(name) => manager.delete_key(&step.owner, name).map_err(key_error),
        KeyAction::List {
            present,
            missing,
        } => {
            let keys = manager.list_keys(&step.owner).map_err(key_error)?;
            let names: BTreeSet<&str> = keys.iter().map(|key| key.name.as_str()).collect();
            let mut problems = Vec::new();
            for name in present.iter().filter(|name| !names.contains(name.as_str())) {
                problems.push(format!("key {name} is not listed"));
            }
            for name in missing.iter().filter(|name| names.contains(name.as_str())) {
                problems.push(format!("key {name} is still listed"));
            }
            if problems.is_empty() { Ok(()) } else { Err(StepError::Mismatch(problems.join("\n"))) }
        }
    }
}

/// Unexpected statuses are mismatches; anything else is broken.
fn key_error(err: KeyManagementError) -> StepError {
    match err {
        KeyManagementError::Status {
            ..
        } => StepError::Mismatch(err.to_string()),
        other => StepError::Broken(other.to_string()),
    }
}
