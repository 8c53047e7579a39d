// crates/pedant-harness/src/catalog/clients.rs
// ============================================================================
// Module: Client Endpoint Scenarios
// Description: Create, read, list and delete checks for `/clients`.
// Purpose: Exercise client validation and role-based access rules.
// Dependencies: pedant-core, serde_json
// ============================================================================

//! ## Overview
//! Every scenario that creates a client owns it: it is created in setup or
//! the main steps under a per-run name and deleted in cleanup. Nothing here
//! runs without an organization.

use pedant_core::Expect;
use pedant_core::Role;
use serde_json::Value;
use serde_json::json;

use super::CatalogContext;
use super::CatalogError;
use crate::scenario::RequestStep;
use crate::scenario::Scenario;

/// Tag shared by every scenario in this module.
const TAG: &str = "clients";

/// Builds the client scenarios; empty without an organization.
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

    out.push(
        Scenario::new("clients: admin lists clients")
            .tags([TAG, "smoke"])
            .step(RequestStep::get("/clients").by(Role::Admin).expect(responses.ok())),
    );

    let listed = context.unique_name("client-listed");
    let url_pattern = Expect::pattern(&format!("/clients/{listed}$"))
        .map_err(|err| CatalogError::Pattern(err.to_string()))?;
    out.push(
        Scenario::new("clients: created client appears in the listing with its url")
            .tag(TAG)
            .setup(create(&listed, false, false).expect(responses.created()))
            .step(
                RequestStep::get("/clients")
                    .by(Role::Admin)
                    .expect(responses.ok().body(Expect::subset_map([(listed.clone(), url_pattern)]))),
            )
            .cleanup(delete(&listed)),
    );

    let created = context.unique_name("client-create");
    out.push(
        Scenario::new("clients: admin creates a client and reads it back")
            .tags([TAG, "smoke"])
            .step(create(&created, false, false).expect(responses.created()))
            .step(RequestStep::get(client_path(&created)).by(Role::Admin).expect(responses.ok().body(
                Expect::subset_map([("name", Expect::from(created.as_str())), ("validator", Expect::from(false))]),
            )))
            .cleanup(delete(&created)),
    );

    let duplicate = context.unique_name("client-duplicate");
    out.push(
        Scenario::new("clients: creating an existing client conflicts")
            .tag(TAG)
            .setup(create(&duplicate, false, false).expect(responses.created()))
            .step(create(&duplicate, false, false).expect(responses.conflict(Some("Client already exists"))))
            .cleanup(delete(&duplicate)),
    );

    out.push(
        Scenario::new("clients: invalid client name is rejected")
            .tags([TAG, "validation"])
            .step(create("pedant invalid name!", false, false).expect(responses.bad_request(Some("Field 'name' invalid")))),
    );

    let non_boolean = context.unique_name("client-admin-string");
    out.push(
        Scenario::new("clients: non-boolean admin flag is rejected")
            .tags([TAG, "validation"])
            .step(
                RequestStep::post("/clients")
                    .by(Role::Admin)
                    .payload(json!({"name": non_boolean, "admin": "sure", "validator": false}))
                    .expect(responses.bad_request(Some("Field 'admin' invalid"))),
            )
            .cleanup(delete(&non_boolean)),
    );

    let both = context.unique_name("client-admin-validator");
    out.push(
        Scenario::new("clients: a client cannot be both admin and validator")
            .tags([TAG, "validation"])
            .step(create(&both, true, true).expect(
                responses.bad_request(Some("Client can be either an admin or a validator, but not both.")),
            ))
            .cleanup(delete(&both)),
    );

    let by_validator = context.unique_name("client-by-validator");
    out.push(
        Scenario::new("clients: validator creates a non-admin client")
            .tag(TAG)
            .step(create(&by_validator, false, false).by(Role::Validator).expect(responses.created()))
            .cleanup(delete(&by_validator)),
    );

    let admin_by_validator = context.unique_name("client-admin-by-validator");
    out.push(
        Scenario::new("clients: validator cannot create an admin client")
            .tags([TAG, "authorization"])
            .step(create(&admin_by_validator, true, false).by(Role::Validator).expect(responses.forbidden(None)))
            .cleanup(delete(&admin_by_validator)),
    );

    out.push(
        Scenario::new("clients: outside user cannot list clients")
            .tags([TAG, "authorization"])
            .step(RequestStep::get("/clients").by(Role::Outside).expect(responses.forbidden(None))),
    );

    let missing = context.unique_name("client-missing");
    out.push(
        Scenario::new("clients: reading a missing client is not found")
            .tag(TAG)
            .step(RequestStep::get(client_path(&missing)).by(Role::Admin).expect(responses.not_found(None))),
    );

    let deleted = context.unique_name("client-delete");
    out.push(
        Scenario::new("clients: deleted client is gone")
            .tag(TAG)
            .setup(create(&deleted, false, false).expect(responses.created()))
            .step(RequestStep::delete(client_path(&deleted)).by(Role::Admin).expect(responses.ok()))
            .step(RequestStep::get(client_path(&deleted)).by(Role::Admin).expect(responses.not_found(None))),
    );

    out.push(
        Scenario::new("clients: collection cannot be deleted")
            .tag(TAG)
            .step(RequestStep::delete("/clients").by(Role::Admin).expect(responses.method_not_allowed(None))),
    );

    out.push(
        Scenario::new("clients: unescaped name is rejected before sending")
            .tags([TAG, "urls"])
            .step(RequestStep::get("/clients/pedant bad name").by(Role::Admin).expect_invalid_url()),
    );

    Ok(out)
}

/// Client creation body.
fn client_payload(name: &str, admin: bool, validator: bool) -> Value {
    json!({"name": name, "admin": admin, "validator": validator})
}

/// `POST /clients` as the admin.
fn create(name: &str, admin: bool, validator: bool) -> RequestStep {
    RequestStep::post("/clients").by(Role::Admin).payload(client_payload(name, admin, validator))
}

/// `DELETE /clients/<name>` as the admin, any response accepted.
fn delete(name: &str) -> RequestStep {
    RequestStep::delete(client_path(name)).by(Role::Admin)
}

/// Path of a named client.
fn client_path(name: &str) -> String {
    format!("/clients/{name}")
}
