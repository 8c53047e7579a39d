// crates/pedant-harness/src/catalog/auth_headers.rs
// ============================================================================
// Module: Authentication Header Scenarios
// Description: Requests with one signature header broken in each way.
// Purpose: Verify the server rejects every malformed signature with 401.
// Dependencies: pedant-core
// ============================================================================

//! ## Overview
//! A positive control proves the endpoint answers a valid signature; each
//! [`AuthMutation`] in the standard catalog then gets its own scenario so a
//! report names the exact header the server failed to check.

use pedant_core::AuthMutation;
use pedant_core::ResponseExpectation;
use pedant_core::Role;

use super::CatalogContext;
use crate::scenario::RequestStep;
use crate::scenario::Scenario;

/// Tag shared by every scenario in this module.
const TAG: &str = "authentication";

/// Builds the positive control and one scenario per mutation.
#[must_use]
pub fn scenarios(context: &CatalogContext) -> Vec<Scenario> {
    let mut out = vec![
        Scenario::new(format!("auth headers: {} is accepted", probe(context).label()))
            .tags([TAG, "smoke"])
            .step(probe(context).expect(context.responses.ok())),
    ];
    for mutation in AuthMutation::catalog() {
        let expectation = ResponseExpectation::status_only(mutation.expected_status());
        let step = probe(context).mutate(mutation).expect(expectation);
        out.push(Scenario::new(format!("auth headers: {}", step.label())).tag(TAG).step(step));
    }
    out
}

/// Request every mutation is applied to.
fn probe(context: &CatalogContext) -> RequestStep {
    if context.org.is_some() {
        RequestStep::get("/clients").by(Role::Admin)
    } else {
        RequestStep::get("/users").at_server().by(Role::Superuser)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use super::*;
    use crate::scenario::Outcome;
    use crate::scenario::Step;

    #[test]
    fn one_scenario_per_mutation_plus_control() {
        let context = CatalogContext::new(Some("acme".to_string()), true);
        let scenarios = scenarios(&context);
        assert_eq!(scenarios.len(), AuthMutation::catalog().len() + 1);
        for scenario in scenarios.iter().skip(1) {
            let Some(Step::Request(step)) = scenario.steps.first() else {
                panic!("expected a request step");
            };
            assert!(step.mutation.is_some());
            let Outcome::Response(expectation) = &step.outcome else {
                panic!("expected a response outcome");
            };
            assert_eq!(expectation.expected_status(), Some(401));
        }
    }

    #[test]
    fn without_org_probes_users_as_superuser() {
        let context = CatalogContext::new(None, true);
        let scenarios = scenarios(&context);
        assert!(scenarios.iter().all(|scenario| scenario.required_roles().contains(&Role::Superuser)));
    }
}
