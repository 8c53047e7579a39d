// crates/pedant-harness/src/responses.rs
// ============================================================================
// Module: Pedant Common Responses
// Description: Reusable response expectations for standard statuses.
// Purpose: Keep error-body assertions consistent and switchable.
// Dependencies: pedant-core
// ============================================================================

//! ## Overview
//! Error responses from the server carry `{"error": [message]}`. Messages are
//! only asserted when `verify_error_messages` is on, since wording varies
//! between server implementations.

use pedant_core::Expect;
use pedant_core::ResponseExpectation;

/// Builds standard expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonResponses {
    /// Whether error messages are asserted.
    verify_error_messages: bool,
}

impl Default for CommonResponses {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CommonResponses {
    /// Creates a builder.
    #[must_use]
    pub const fn new(verify_error_messages: bool) -> Self {
        Self {
            verify_error_messages,
        }
    }

    /// 200 with any body.
    #[must_use]
    pub fn ok(&self) -> ResponseExpectation {
        ResponseExpectation::status_only(200)
    }

    /// 201 with any body.
    #[must_use]
    pub fn created(&self) -> ResponseExpectation {
        ResponseExpectation::status_only(201)
    }

    /// 400, optionally with an error message.
    #[must_use]
    pub fn bad_request(&self, message: Option<&str>) -> ResponseExpectation {
        self.error(400, message)
    }

    /// 401.
    #[must_use]
    pub fn unauthorized(&self) -> ResponseExpectation {
        ResponseExpectation::status_only(401)
    }

    /// 403, optionally with an error message.
    #[must_use]
    pub fn forbidden(&self, message: Option<&str>) -> ResponseExpectation {
        self.error(403, message)
    }

    /// 404, optionally with an error message.
    #[must_use]
    pub fn not_found(&self, message: Option<&str>) -> ResponseExpectation {
        self.error(404, message)
    }

    /// 405, optionally with an error message.
    #[must_use]
    pub fn method_not_allowed(&self, message: Option<&str>) -> ResponseExpectation {
        self.error(405, message)
    }

    /// 409, optionally with an error message.
    #[must_use]
    pub fn conflict(&self, message: Option<&str>) -> ResponseExpectation {
        self.error(409, message)
    }

    /// Status with an `{"error": [message]}` body when messages are verified.
    fn error(&self, status: u16, message: Option<&str>) -> ResponseExpectation {
        let expectation = ResponseExpectation::status_only(status);
        match message {
            Some(message) if self.verify_error_messages => expectation.body_exact(Expect::exact_map([(
                "error",
                Expect::exact_list([Expect::from(message)]),
            )])),
            _ => expectation,
        }
    }
}

#[cfg(test)]
mod tests {
    use pedant_core::CapturedResponse;
    use pedant_core::matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn message_checked_only_when_verifying() {
        let response = CapturedResponse::json(404, &json!({"error": ["something else"]}));
        let strict = CommonResponses::new(true).not_found(Some("Cannot load client x"));
        let lax = CommonResponses::new(false).not_found(Some("Cannot load client x"));
        assert!(!matches(&response, &strict).is_ok());
        assert!(matches(&response, &lax).is_ok());
    }

    #[test]
    fn exact_error_body_matches() {
        let response = CapturedResponse::json(409, &json!({"error": ["Client already exists"]}));
        let expectation = CommonResponses::default().conflict(Some("Client already exists"));
        assert!(matches(&response, &expectation).is_ok());
        assert_eq!(expectation.expected_status(), Some(409));
        assert!(expectation.expected_body().is_some());
    }
}
