// crates/pedant-harness/src/catalog/environments.rs
// ============================================================================
// Module: Environment Endpoint Scenarios
// Description: Create, delete and search checks for `/environments`.
// Purpose: Cover the protected default environment and search indexing.
// Dependencies: pedant-core, serde_json
// ============================================================================

//! ## Overview
//! Environments are created under per-run names and removed in cleanup. The
//! search scenario polls because indexing is asynchronous; it is bounded by
//! the configured maximum search time.

use pedant_core::Expect;
use pedant_core::Role;
use serde_json::Value;
use serde_json::json;

use super::CatalogContext;
use super::CatalogError;
use crate::scenario::RequestStep;
use crate::scenario::Scenario;

/// Tag shared by every scenario in this module.
const TAG: &str = "environments";

/// Name of the environment every organization starts with.
pub const DEFAULT_ENVIRONMENT: &str = "_default";

/// Builds the environment scenarios; empty without an organization.
///
/// # Errors
///
/// Returns [`CatalogError::Pattern`] when a URL pattern does not compile.
pub fn scenarios(context: &CatalogContext) -> Result<Vec<Scenario>, CatalogError> {
    if context.org.is_none() {
        return Ok(Vec::new());
    }
    let responses = &context.responses;
    let mut out = Vec::new();

    let created = context.unique_name("env-create");
    let uri = Expect::pattern(&format!("/environments/{created}$"))
        .map_err(|err| CatalogError::Pattern(err.to_string()))?;
    out.push(
        Scenario::new("environments: admin creates an environment")
            .tags([TAG, "smoke"])
            .step(create(&created).expect(responses.created().body(Expect::subset_map([("uri", uri)]))))
            .cleanup(delete(&created)),
    );

    out.push(
        Scenario::new("environments: collection cannot be deleted")
            .tag(TAG)
            .step(RequestStep::delete("/environments").by(Role::Admin).expect(responses.method_not_allowed(None))),
    );

    out.push(
        Scenario::new("environments: default environment cannot be deleted")
            .tag(TAG)
            .step(
                delete(DEFAULT_ENVIRONMENT)
                    .expect(responses.method_not_allowed(Some("The '_default' environment cannot be modified."))),
            ),
    );

    let missing = context.unique_name("env-missing");
    out.push(
        Scenario::new("environments: deleting a missing environment is not found")
            .tag(TAG)
            .step(delete(&missing).expect(responses.not_found(Some(&format!("Cannot load environment {missing}"))))),
    );

    let deleted = context.unique_name("env-delete");
    out.push(
        Scenario::new("environments: delete returns the environment and removes it")
            .tag(TAG)
            .setup(create(&deleted).expect(responses.created()))
            .step(delete(&deleted).expect(
                responses.ok().body(Expect::subset_map([("name", Expect::from(deleted.as_str()))])),
            ))
            .step(RequestStep::get(environment_path(&deleted)).by(Role::Admin).expect(responses.not_found(None))),
    );

    let protected = context.unique_name("env-outside");
    out.push(
        Scenario::new("environments: outside user cannot delete an environment")
            .tags([TAG, "authorization"])
            .setup(create(&protected).expect(responses.created()))
            .step(delete(&protected).by(Role::Outside).expect(responses.forbidden(None)))
            .cleanup(delete(&protected)),
    );

    let searched = context.unique_name("env-search");
    out.push(
        Scenario::new("environments: created environment becomes searchable")
            .tags([TAG, "search"])
            .setup(create(&searched).expect(responses.created()))
            .step(
                RequestStep::get(format!("/search/environment?q=name:{searched}"))
                    .by(Role::Admin)
                    .expect(responses.ok().body(Expect::subset_map([(
                        "rows",
                        Expect::subset_list([Expect::subset_map([("name", Expect::from(searched.as_str()))])]),
                    )])))
                    .retrying(),
            )
            .cleanup(delete(&searched)),
    );

    Ok(out)
}

/// Minimal environment document.
fn environment_payload(name: &str) -> Value {
    json!({
        "name": name,
        "description": "created by pedant",
        "cookbook_versions": {},
        "default_attributes": {},
        "override_attributes": {},
        "json_class": "Chef::Environment",
        "chef_type": "environment"
    })
}

/// `POST /environments` as the admin.
fn create(name: &str) -> RequestStep {
    RequestStep::post("/environments").by(Role::Admin).payload(environment_payload(name))
}

/// `DELETE /environments/<name>` as the admin, any response accepted.
fn delete(name: &str) -> RequestStep {
    RequestStep::delete(environment_path(name)).by(Role::Admin)
}

/// Path of a named environment.
fn environment_path(name: &str) -> String {
    format!("/environments/{name}")
}
