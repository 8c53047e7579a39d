// system-tests/tests/helpers/chef_stub.rs
// ============================================================================
// Module: Chef Server Stub
// Description: In-process HTTP server that authenticates signed requests.
// Purpose: Give end-to-end runs a server with real signature verification.
// Dependencies: pedant-core, serde_json, time, tiny_http
// ============================================================================

//! ## Overview
//! [`ChefStub`] serves `/_status`, server-scoped `/users` and org-scoped
//! `/clients` from memory. Every other request must carry a valid
//! `X-Ops-*` signature from a known user or client, signed within
//! [`MAX_CLOCK_SKEW`] of now; anything else is answered with 401.
//! Unknown paths are 404 after authentication.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::thread::JoinHandle;

use pedant_core::HeaderMap;
use pedant_core::Method;
use pedant_core::PublicKey;
use pedant_core::headers::X_OPS_USERID;
use pedant_core::signing::verify_signature;
use serde_json::Value;
use serde_json::json;
use time::Duration;
use time::OffsetDateTime;
use tiny_http::Header;
use tiny_http::Request;
use tiny_http::Response;
use tiny_http::Server;

/// Largest accepted distance between the signed timestamp and now.
pub const MAX_CLOCK_SKEW: Duration = Duration::minutes(15);

/// One request as the stub saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    /// HTTP method.
    pub method: String,
    /// Path without query.
    pub path: String,
    /// Status the stub answered with.
    pub status: u16,
}

/// Mutable stub state shared with the server thread.
#[derive(Default)]
struct StubState {
    /// Users by name.
    users: BTreeMap<String, PublicKey>,
    /// Clients of the organization by name.
    clients: BTreeMap<String, PublicKey>,
    /// Value reported by `/_status`.
    status: String,
    /// Every handled request.
    seen: Vec<SeenRequest>,
}

/// Running stub server; stops when dropped.
pub struct ChefStub {
    /// `http://127.0.0.1:<port>`.
    base_url: String,
    /// Shared state.
    state: Arc<Mutex<StubState>>,
    /// Server handle used to unblock the accept loop.
    server: Arc<Server>,
    /// Accept loop thread.
    handle: Option<JoinHandle<()>>,
}

impl ChefStub {
    /// Starts a stub for `org` that knows only the superuser.
    pub fn start(org: &str, superuser: &str, superuser_key: PublicKey) -> Result<Self, String> {
        let server = Arc::new(Server::http("127.0.0.1:0").map_err(|err| format!("stub bind failed: {err}"))?);
        let addr = server.server_addr().to_ip().ok_or_else(|| "stub has no ip address".to_string())?;
        let mut initial = StubState {
            status: "pong".to_string(),
            ..StubState::default()
        };
        initial.users.insert(superuser.to_string(), superuser_key);
        let state = Arc::new(Mutex::new(initial));

        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            let org = org.to_string();
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    handle_request(&state, &org, request);
                }
            })
        };

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            server,
            handle: Some(handle),
        })
    }

    /// Returns the server root URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Changes the value `/_status` reports.
    pub fn set_status(&self, status: &str) {
        self.lock().status = status.to_string();
    }

    /// Returns true when a user with `name` exists.
    pub fn has_user(&self, name: &str) -> bool {
        self.lock().users.contains_key(name)
    }

    /// Returns true when a client with `name` exists.
    pub fn has_client(&self, name: &str) -> bool {
        self.lock().clients.contains_key(name)
    }

    /// Returns every request handled so far.
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.lock().seen.clone()
    }

    /// Locks the shared state, tolerating a poisoned lock.
    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChefStub {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// SECTION: Request Handling
// ============================================================================

/// Reads, routes, records, and answers one request.
fn handle_request(state: &Mutex<StubState>, org: &str, mut request: Request) {
    let mut body = Vec::new();
    let _ = request.as_reader().read_to_end(&mut body);
    let mut headers = HeaderMap::new();
    for header in request.headers() {
        headers.insert(header.field.as_str().as_str(), header.value.as_str());
    }
    let path = request.url().split('?').next().unwrap_or("/").to_string();
    let method_name = request.method().as_str().to_ascii_uppercase();

    let (status, reply) = {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        let (status, reply) = match method_name.parse::<Method>() {
            Ok(method) => route(&mut guard, org, method, &path, &body, &headers),
            Err(_) => error(405, "Method not allowed"),
        };
        guard.seen.push(SeenRequest {
            method: method_name,
            path,
            status,
        });
        (status, reply)
    };

    let mut response = Response::from_data(reply.to_string().into_bytes()).with_status_code(status);
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response = response.with_header(header);
    }
    let _ = request.respond(response);
}

/// Dispatches an authenticated request to its endpoint.
fn route(
    state: &mut StubState,
    org: &str,
    method: Method,
    path: &str,
    body: &[u8],
    headers: &HeaderMap,
) -> (u16, Value) {
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    if segments == ["_status"] {
        return (200, json!({"status": state.status, "upstreams": {"stub": "pong"}}));
    }
    if let Err(reason) = authenticate(state, method, path, body, headers) {
        return error(401, &reason);
    }
    match segments.as_slice() {
        ["users"] => collection(&mut state.users, "users", "username", method, body),
        ["users", name] => member(&mut state.users, "user", name, method, body),
        ["organizations", owner, "clients"] if *owner == org => {
            collection(&mut state.clients, "clients", "name", method, body)
        }
        ["organizations", owner, "clients", name] if *owner == org => {
            member(&mut state.clients, "client", name, method, body)
        }
        _ => error(404, "Not Found"),
    }
}

/// Verifies the signature against the claimed identity's key and the clock.
fn authenticate(
    state: &StubState,
    method: Method,
    path: &str,
    body: &[u8],
    headers: &HeaderMap,
) -> Result<(), String> {
    let user_id = headers.get(X_OPS_USERID).ok_or_else(|| format!("missing {X_OPS_USERID}"))?;
    let key = state
        .users
        .get(user_id)
        .or_else(|| state.clients.get(user_id))
        .ok_or_else(|| format!("unknown requestor '{user_id}'"))?;
    let verified = verify_signature(method, path, body, headers, key).map_err(|err| err.to_string())?;
    let skew = (OffsetDateTime::now_utc() - verified.timestamp).abs();
    if skew > MAX_CLOCK_SKEW {
        return Err("request timestamp outside the allowed window".to_string());
    }
    Ok(())
}

/// `GET` lists members; `POST` creates one from a `public_key` payload.
fn collection(
    members: &mut BTreeMap<String, PublicKey>,
    collection: &str,
    name_field: &str,
    method: Method,
    body: &[u8],
) -> (u16, Value) {
    match method {
        Method::Get => {
            let listing: serde_json::Map<String, Value> = members
                .keys()
                .map(|name| (name.clone(), Value::String(format!("/{collection}/{name}"))))
                .collect();
            (200, Value::Object(listing))
        }
        Method::Post => {
            let (name, key) = match parse_member(body, name_field) {
                Ok(parsed) => parsed,
                Err(message) => return error(400, &message),
            };
            if members.contains_key(&name) {
                return error(409, "Conflict");
            }
            members.insert(name.clone(), key);
            (201, json!({"uri": format!("/{collection}/{name}")}))
        }
        Method::Put | Method::Delete => error(405, "Method not allowed"),
    }
}

/// `GET`, `PUT` (key replacement) and `DELETE` on one member.
fn member(
    members: &mut BTreeMap<String, PublicKey>,
    kind: &str,
    name: &str,
    method: Method,
    body: &[u8],
) -> (u16, Value) {
    if !members.contains_key(name) {
        return error(404, &format!("Cannot load {kind} {name}"));
    }
    match method {
        Method::Get => (200, json!({"name": name})),
        Method::Put => match public_key_field(body) {
            Ok(key) => {
                members.insert(name.to_string(), key);
                (200, json!({"name": name}))
            }
            Err(message) => error(400, &message),
        },
        Method::Delete => {
            members.remove(name);
            (200, json!({"name": name}))
        }
        Method::Post => error(405, "Method not allowed"),
    }
}

/// Extracts the member name and public key from a creation payload.
fn parse_member(body: &[u8], name_field: &str) -> Result<(String, PublicKey), String> {
    let payload: Value = serde_json::from_slice(body).map_err(|err| format!("invalid JSON: {err}"))?;
    let name = payload
        .get(name_field)
        .or_else(|| payload.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Field '{name_field}' missing"))?;
    Ok((name.to_string(), public_key_field(body)?))
}

/// Parses the `public_key` field of a JSON body.
fn public_key_field(body: &[u8]) -> Result<PublicKey, String> {
    let payload: Value = serde_json::from_slice(body).map_err(|err| format!("invalid JSON: {err}"))?;
    let pem = payload.get("public_key").and_then(Value::as_str).ok_or("Field 'public_key' missing")?;
    PublicKey::from_pem(pem).map_err(|err| format!("Field 'public_key' invalid: {err}"))
}

/// Error reply in the server's `{"error": [...]}` shape.
fn error(status: u16, message: &str) -> (u16, Value) {
    (status, json!({"error": [message]}))
}
