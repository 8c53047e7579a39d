// crates/pedant-harness/src/scenario.rs
// ============================================================================
// Module: Pedant Scenarios
// Description: Declarative scenario and step values.
// Purpose: Describe conformance checks as plain data consumed by the runner.
// Dependencies: pedant-core, pedant-http
// ============================================================================

//! ## Overview
//! A [`Scenario`] is a named, tagged list of [`Step`]s split into setup,
//! main and cleanup phases. Each step either performs one signed request and
//! states the [`Outcome`] it expects, or performs one key management call.
//! Scenarios hold no references to the platform; targets and actors are
//! resolved when the runner executes them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use pedant_core::AuthMutation;
use pedant_core::Method;
use pedant_core::Requestor;
use pedant_core::ResponseExpectation;
use pedant_core::Role;
use pedant_http::KeyOwner;
use pedant_http::NewKey;
use pedant_http::Payload;
use pedant_http::RequestOptions;

use crate::platform::Platform;

// ============================================================================
// SECTION: Targets and Actors
// ============================================================================

/// Where a request is sent, resolved against the platform at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Path under the server root (`/users`, `/_status`).
    Server(String),
    /// Path under the organization (`/clients`).
    Api(String),
    /// Complete URL used verbatim.
    Absolute(String),
}

impl Target {
    /// Resolves the target to a URL string.
    #[must_use]
    pub fn resolve(&self, platform: &Platform) -> String {
        match self {
            Self::Server(path) => platform.server_url(path),
            Self::Api(path) => platform.api_url(path),
            Self::Absolute(url) => url.clone(),
        }
    }
}

/// Who signs a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The platform identity configured for a role.
    Role(Role),
    /// A platform identity by name.
    Named(String),
    /// An identity built by the scenario itself.
    Requestor(Box<Requestor>),
}

impl Actor {
    /// Returns a short label for reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Role(role) => role.as_str().to_string(),
            Self::Named(name) => name.clone(),
            Self::Requestor(requestor) => requestor.name().to_string(),
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// What a request step must produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A response matching the expectation.
    Response(ResponseExpectation),
    /// Failure to build the URL, before any network call.
    InvalidUrl,
    /// A connection or timeout failure.
    TransportFailure,
    /// Any response at all; used for cleanup.
    Completed,
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// One signed request and its expected outcome.
#[derive(Debug, Clone)]
pub struct RequestStep {
    /// HTTP method.
    pub method: Method,
    /// Request target.
    pub target: Target,
    /// Signing identity.
    pub actor: Actor,
    /// Headers, payload and signing overrides.
    pub options: RequestOptions,
    /// Optional auth header mutation applied to a valid signature.
    pub mutation: Option<AuthMutation>,
    /// Expected outcome.
    pub outcome: Outcome,
    /// Whether to poll until the outcome holds or the search budget expires.
    pub retry: bool,
}

impl RequestStep {
    /// Creates a step sent by the admin identity expecting any response.
    #[must_use]
    pub fn new(method: Method, target: Target) -> Self {
        Self {
            method,
            target,
            actor: Actor::Role(Role::Admin),
            options: RequestOptions::new(),
            mutation: None,
            outcome: Outcome::Completed,
            retry: false,
        }
    }

    /// `GET` against an org-scoped path.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, Target::Api(path.into()))
    }

    /// `POST` against an org-scoped path.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, Target::Api(path.into()))
    }

    /// `PUT` against an org-scoped path.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, Target::Api(path.into()))
    }

    /// `DELETE` against an org-scoped path.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, Target::Api(path.into()))
    }

    /// Sends to a server-root path instead.
    #[must_use]
    pub fn at_server(mut self) -> Self {
        if let Target::Api(path) = self.target {
            self.target = Target::Server(path);
        }
        self
    }

    /// Signs as the identity configured for `role`.
    #[must_use]
    pub fn by(mut self, role: Role) -> Self {
        self.actor = Actor::Role(role);
        self
    }

    /// Signs as a scenario-owned requestor.
    #[must_use]
    pub fn by_requestor(mut self, requestor: Requestor) -> Self {
        self.actor = Actor::Requestor(Box::new(requestor));
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.options = self.options.payload(payload);
        self
    }

    /// Adds a caller header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    /// Breaks the signature in one way.
    #[must_use]
    pub fn mutate(mut self, mutation: AuthMutation) -> Self {
        self.mutation = Some(mutation);
        self
    }

    /// Expects a matching response.
    #[must_use]
    pub fn expect(mut self, expectation: ResponseExpectation) -> Self {
        self.outcome = Outcome::Response(expectation);
        self
    }

    /// Expects URL construction to fail before the network.
    #[must_use]
    pub fn expect_invalid_url(mut self) -> Self {
        self.outcome = Outcome::InvalidUrl;
        self
    }

    /// Expects a transport failure.
    #[must_use]
    pub fn expect_transport_failure(mut self) -> Self {
        self.outcome = Outcome::TransportFailure;
        self
    }

    /// Polls until the expectation holds.
    #[must_use]
    pub const fn retrying(mut self) -> Self {
        self.retry = true;
        self
    }

    /// Returns a label such as `GET /clients as admin`.
    #[must_use]
    pub fn label(&self) -> String {
        let path = match &self.target {
            Target::Server(path) | Target::Api(path) | Target::Absolute(path) => path.as_str(),
        };
        let mut label = format!("{} {path} as {}", self.method, self.actor.label());
        if let Some(mutation) = &self.mutation {
            label.push_str(" with ");
            label.push_str(&mutation.label());
        }
        label
    }
}

/// Key management call made through the platform's key manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Register a key.
    Add(NewKey),
    /// Delete a key by name.
    Delete(String),
    /// List keys and check names are present or missing.
    List {
        /// Names that must be listed.
        present: Vec<String>,
        /// Names that must not be listed.
        missing: Vec<String>,
    },
}

/// One key management call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStep {
    /// Key owner.
    pub owner: KeyOwner,
    /// Call to make.
    pub action: KeyAction,
}

impl KeyStep {
    /// Returns a label such as `add key alt for web01`.
    #[must_use]
    pub fn label(&self) -> String {
        let owner = self.owner.name();
        match &self.action {
            KeyAction::Add(key) => format!("add key {} for {owner}", key.name),
            KeyAction::Delete(name) => format!("delete key {name} for {owner}"),
            KeyAction::List {
                ..
            } => format!("list keys for {owner}"),
        }
    }
}

/// A scenario step.
#[derive(Debug, Clone)]
pub enum Step {
    /// Signed request.
    Request(RequestStep),
    /// Key management call.
    Keys(KeyStep),
}

impl Step {
    /// Returns the step label.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Request(step) => step.label(),
            Self::Keys(step) => step.label(),
        }
    }
}

impl From<RequestStep> for Step {
    fn from(step: RequestStep) -> Self {
        Self::Request(step)
    }
}

impl From<KeyStep> for Step {
    fn from(step: KeyStep) -> Self {
        Self::Keys(step)
    }
}

// ============================================================================
// SECTION: Scenario
// ============================================================================

/// A named conformance check.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Unique display name.
    pub name: String,
    /// Tags used for filtering.
    pub tags: BTreeSet<String>,
    /// Roles that must be configured; the scenario is skipped otherwise.
    pub requires: BTreeSet<Role>,
    /// Steps preparing state; any failure errors the scenario.
    pub setup: Vec<Step>,
    /// Steps under test; the first failure stops the phase.
    pub steps: Vec<Step>,
    /// Steps always run afterwards; failures become notes.
    pub cleanup: Vec<Step>,
}

impl Scenario {
    /// Creates an empty scenario.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            requires: BTreeSet::new(),
            setup: Vec::new(),
            steps: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds several tags.
    #[must_use]
    pub fn tags<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Requires a role to be configured.
    #[must_use]
    pub fn requires(mut self, role: Role) -> Self {
        self.requires.insert(role);
        self
    }

    /// Appends a setup step.
    #[must_use]
    pub fn setup(mut self, step: impl Into<Step>) -> Self {
        self.setup.push(step.into());
        self
    }

    /// Appends a main step.
    #[must_use]
    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Appends a cleanup step.
    #[must_use]
    pub fn cleanup(mut self, step: impl Into<Step>) -> Self {
        self.cleanup.push(step.into());
        self
    }

    /// Returns roles used by request steps or listed as required.
    #[must_use]
    pub fn required_roles(&self) -> BTreeSet<Role> {
        let mut roles = self.requires.clone();
        let steps = self.setup.iter().chain(&self.steps).chain(&self.cleanup);
        for step in steps {
            if let Step::Request(RequestStep {
                actor: Actor::Role(role),
                ..
            }) = step
            {
                roles.insert(*role);
            }
        }
        roles
    }
}
