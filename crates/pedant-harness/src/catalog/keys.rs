// crates/pedant-harness/src/catalog/keys.rs
// ============================================================================
// Module: Key Management Scenarios
// Description: Add, replace, list, expire and delete identity keys.
// Purpose: Prove the server authenticates with exactly the registered keys.
// Dependencies: pedant-core, pedant-http, serde_json
// ============================================================================

//! ## Overview
//! Each scenario provisions its own user (or client) with a freshly
//! generated key, changes its keys through the platform's key manager, and
//! then signs requests as the scenario-owned identity to observe which keys
//! the server accepts. Two key pairs are generated per catalog build and
//! shared across scenarios; every scenario owns a distinct identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use pedant_core::Identity;
use pedant_core::IdentityKind;
use pedant_core::PrivateKey;
use pedant_core::Requestor;
use pedant_core::Role;
use pedant_http::KeyOwner;
use pedant_http::NewKey;
use serde_json::Value;
use serde_json::json;

use super::CatalogContext;
use super::CatalogError;
use crate::platform::DEFAULT_USER_PASSWORD;
use crate::platform::PROVISIONED_EMAIL_DOMAIN;
use crate::scenario::KeyAction;
use crate::scenario::KeyStep;
use crate::scenario::RequestStep;
use crate::scenario::Scenario;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Tag shared by every scenario in this module.
const TAG: &str = "keys";

/// Name of the key registered at creation.
pub const DEFAULT_KEY_NAME: &str = "default";

/// Expiry long in the past.
pub const EXPIRED_DATE: &str = "2012-12-24T21:00:00Z";

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Builds the key scenarios.
///
/// # Errors
///
/// Returns [`CatalogError::Key`] when a key pair cannot be generated or
/// encoded.
pub fn scenarios(context: &CatalogContext) -> Result<Vec<Scenario>, CatalogError> {
    let original = generate(context.key_bits)?;
    let replacement = generate(context.key_bits)?;
    let original_pem = public_pem(&original)?;

    let mut out = Vec::new();
    let owned = |base: &str| OwnedUser::new(context, base, &original_pem);

    let user = owned("key-user");
    out.push(
        user.scenario("keys: user signs with the key registered at creation")
            .tag("smoke")
            .step(user.read_self(&original).expect(context.responses.ok())),
    );

    let user = owned("key-replace");
    out.push(
        user.scenario("keys: replacing the default key revokes the old one")
            .step(user.keys(KeyAction::Delete(DEFAULT_KEY_NAME.to_string())))
            .step(user.keys(KeyAction::Add(new_key(DEFAULT_KEY_NAME, &replacement, None))))
            .step(user.read_self(&replacement).expect(context.responses.ok()))
            .step(user.read_self(&original).expect(context.responses.unauthorized())),
    );

    let user = owned("key-alt");
    out.push(
        user.scenario("keys: added key is listed and usable until deleted")
            .step(user.keys(KeyAction::Add(new_key("alt", &replacement, None))))
            .step(user.keys(KeyAction::List {
                present: vec![DEFAULT_KEY_NAME.to_string(), "alt".to_string()],
                missing: Vec::new(),
            }))
            .step(user.read_self(&replacement).expect(context.responses.ok()))
            .step(user.keys(KeyAction::Delete("alt".to_string())))
            .step(user.keys(KeyAction::List {
                present: vec![DEFAULT_KEY_NAME.to_string()],
                missing: vec!["alt".to_string()],
            }))
            .step(user.read_self(&replacement).expect(context.responses.unauthorized())),
    );

    let user = owned("key-expired");
    out.push(
        user.scenario("keys: expired key is rejected")
            .step(user.keys(KeyAction::Add(new_key("expired", &replacement, Some(EXPIRED_DATE)))))
            .step(user.read_self(&replacement).expect(context.responses.unauthorized()))
            .step(user.read_self(&original).expect(context.responses.ok())),
    );

    if let Some(org) = &context.org {
        let name = context.unique_name("key-client");
        let owner = KeyOwner::new(IdentityKind::Client, org, &name);
        let as_client = |key: &PrivateKey| {
            RequestStep::get(format!("/clients/{name}"))
                .by_requestor(requestor(context, &name, IdentityKind::Client, key))
        };
        out.push(
            Scenario::new("keys: client signs with an added key")
                .tags([TAG, "clients"])
                .setup(
                    RequestStep::post("/clients")
                        .by(Role::Admin)
                        .payload(json!({
                            "name": name,
                            "admin": false,
                            "validator": false,
                            "public_key": original_pem,
                        }))
                        .expect(context.responses.created()),
                )
                .step(as_client(&original).expect(context.responses.ok()))
                .step(KeyStep {
                    owner,
                    action: KeyAction::Add(new_key("alt", &replacement, None)),
                })
                .step(as_client(&replacement).expect(context.responses.ok()))
                .cleanup(RequestStep::delete(format!("/clients/{name}")).by(Role::Admin)),
        );
    }

    Ok(out)
}

// ============================================================================
// SECTION: Owned Users
// ============================================================================

/// A user created and deleted by one scenario.
struct OwnedUser<'a> {
    /// Catalog inputs.
    context: &'a CatalogContext,
    /// Unique user name.
    name: String,
    /// Creation body.
    payload: Value,
}

impl<'a> OwnedUser<'a> {
    /// Describes a user registered with `public_pem`.
    fn new(context: &'a CatalogContext, base: &str, public_pem: &str) -> Self {
        let name = context.unique_name(base);
        let payload = json!({
            "username": name,
            "name": name,
            "display_name": name,
            "first_name": name,
            "last_name": "pedant",
            "email": format!("{name}@{PROVISIONED_EMAIL_DOMAIN}"),
            "password": DEFAULT_USER_PASSWORD,
            "public_key": public_pem,
        });
        Self {
            context,
            name,
            payload,
        }
    }

    /// Scenario with user creation in setup and deletion in cleanup.
    fn scenario(&self, name: &str) -> Scenario {
        Scenario::new(name)
            .tags([TAG, "users"])
            .setup(
                RequestStep::post("/users")
                    .at_server()
                    .by(Role::Superuser)
                    .payload(self.payload.clone())
                    .expect(self.context.responses.created()),
            )
            .cleanup(RequestStep::delete(self.path()).at_server().by(Role::Superuser))
    }

    /// `GET /users/<name>` signed by the user with `key`.
    fn read_self(&self, key: &PrivateKey) -> RequestStep {
        RequestStep::get(self.path())
            .at_server()
            .by_requestor(requestor(self.context, &self.name, IdentityKind::User, key))
    }

    /// Key management call for this user.
    fn keys(&self, action: KeyAction) -> KeyStep {
        KeyStep {
            owner: KeyOwner::User {
                name: self.name.clone(),
            },
            action,
        }
    }

    /// Server-root path of the user.
    fn path(&self) -> String {
        format!("/users/{}", self.name)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Scenario-owned requestor signing with `key`.
fn requestor(context: &CatalogContext, name: &str, kind: IdentityKind, key: &PrivateKey) -> Requestor {
    Requestor::new(Identity::new(name, kind, Role::Normal, key.clone()), context.signer)
}

/// Key registration request.
fn new_key(name: &str, key: &PrivateKey, expiration_date: Option<&str>) -> NewKey {
    NewKey {
        name: name.to_string(),
        public_key: key.public_key(),
        expiration_date: expiration_date.map(ToString::to_string),
    }
}

/// Generates a key pair.
fn generate(bits: usize) -> Result<PrivateKey, CatalogError> {
    PrivateKey::generate(bits).map_err(|err| CatalogError::Key(err.to_string()))
}

/// Encodes the public half as PEM.
fn public_pem(key: &PrivateKey) -> Result<String, CatalogError> {
    key.public_key().to_pem().map_err(|err| CatalogError::Key(err.to_string()))
}
