// crates/pedant-harness/src/catalog/status.rs
// ============================================================================
// Module: Status Scenarios
// Description: Server health and superuser sanity checks.
// Purpose: Fail fast when the server is up but not serving the API.
// Dependencies: pedant-core
// ============================================================================

//! Server health and superuser sanity scenarios.

use pedant_core::Expect;
use pedant_core::Role;

use super::CatalogContext;
use crate::scenario::RequestStep;
use crate::scenario::Scenario;

/// Builds the status scenarios.
#[must_use]
pub fn scenarios(context: &CatalogContext) -> Vec<Scenario> {
    let responses = &context.responses;
    vec![
        Scenario::new("status: GET /_status reports pong").tags(["status", "smoke"]).step(
            RequestStep::get("/_status")
                .at_server()
                .by(Role::Superuser)
                .expect(responses.ok().body(Expect::subset_map([("status", Expect::from("pong"))]))),
        ),
        Scenario::new("status: unknown endpoint is not found").tag("status").step(
            RequestStep::get(format!("/{}", context.unique_name("no-such-endpoint")))
                .at_server()
                .by(Role::Superuser)
                .expect(responses.not_found(None)),
        ),
    ]
}
