// crates/pedant-core/src/matcher.rs
// ============================================================================
// Module: Pedant Response Matcher
// Description: Structural comparison of responses against expectation trees.
// Purpose: Produce pass/fail results with path-addressed mismatch diffs.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`matches`] evaluates a [`CapturedResponse`] against a
//! [`ResponseExpectation`]. A status mismatch fails immediately. Otherwise the
//! body and headers are compared and every mismatch is collected with the path
//! at which it occurred.
//!
//! The actual body is the parsed JSON value; a non-JSON body is compared as a
//! single string and an empty body is treated as absent.
//!
//! Invariants:
//! - Matching is pure and deterministic; mismatches are reported in tree order.
//! - Unordered lists use multiset semantics: each expected element consumes a
//!   distinct actual element (maximum bipartite matching).
//! - Patterns only match strings; any other type is a type mismatch.
//! - Numbers compare by numeric value, so `1` and `1.0` are equal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::expectation::CollectionMode;
use crate::expectation::Expect;
use crate::expectation::ListOrder;
use crate::expectation::ResponseExpectation;
use crate::expectation::describe_value;
use crate::response::CapturedResponse;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Category of a single mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchReason {
    /// Status code differs.
    Status,
    /// Literal value differs.
    Value,
    /// JSON types differ.
    Type,
    /// Expected key or header is missing.
    Missing,
    /// A key required to be absent is present.
    Present,
    /// Exact map has a key the expectation does not name.
    UnexpectedKey,
    /// Pattern did not match.
    Pattern,
    /// Predicate returned false.
    Predicate,
    /// Ordered exact list length differs.
    Length,
    /// No actual element matched an expected element.
    UnmatchedElement,
    /// Exact list has an element no expectation consumed.
    UnexpectedElement,
}

impl MismatchReason {
    /// Returns a short label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status mismatch",
            Self::Value => "value mismatch",
            Self::Type => "type mismatch",
            Self::Missing => "missing",
            Self::Present => "unexpectedly present",
            Self::UnexpectedKey => "unexpected key",
            Self::Pattern => "pattern mismatch",
            Self::Predicate => "predicate failed",
            Self::Length => "length mismatch",
            Self::UnmatchedElement => "no matching element",
            Self::UnexpectedElement => "unexpected element",
        }
    }
}

/// One mismatch at a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Path such as `status`, `body.name` or `body.items[2]`.
    pub path: String,
    /// Mismatch category.
    pub reason: MismatchReason,
    /// Description of the expectation.
    pub expected: String,
    /// Description of the actual value.
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: expected {}, got {}",
            self.path,
            self.reason.as_str(),
            self.expected,
            self.actual
        )
    }
}

/// Outcome of a match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MatchResult {
    /// Mismatches in tree order; empty on success.
    mismatches: Vec<Mismatch>,
}

impl MatchResult {
    /// Successful result.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            mismatches: Vec::new(),
        }
    }

    /// Returns true when nothing mismatched.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Returns the mismatches.
    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Renders the mismatches one per line; empty on success.
    #[must_use]
    pub fn diff(&self) -> String {
        let mut out = String::new();
        for mismatch in &self.mismatches {
            let _ = writeln!(out, "{mismatch}");
        }
        out
    }
}

// ============================================================================
// SECTION: Entry Points
// ============================================================================

/// Matches a captured response against an expectation.
#[must_use]
pub fn matches(response: &CapturedResponse, expectation: &ResponseExpectation) -> MatchResult {
    if let Some(status) = expectation.status
        && status != response.status()
    {
        return MatchResult {
            mismatches: vec![Mismatch {
                path: "status".to_string(),
                reason: MismatchReason::Status,
                expected: status.to_string(),
                actual: response.status().to_string(),
            }],
        };
    }

    let mut mismatches = Vec::new();
    if let Some(body) = &expectation.body {
        let actual = actual_body(response);
        check(body, actual.as_ref(), expectation.root_mode(), "body", &mut mismatches);
    }
    for (name, expect) in &expectation.headers {
        let actual = response.headers().get(name).map(|value| Value::String(value.to_string()));
        check(expect, actual.as_ref(), CollectionMode::Exact, &format!("headers.{name}"), &mut mismatches);
    }
    MatchResult {
        mismatches,
    }
}

/// Matches a single value against an expectation node.
///
/// `actual` is `None` when the value is absent. `mode` is the collection mode
/// inherited by nodes that leave theirs unset.
#[must_use]
pub fn match_value(expect: &Expect, actual: Option<&Value>, mode: CollectionMode) -> MatchResult {
    let mut mismatches = Vec::new();
    check(expect, actual, mode, "$", &mut mismatches);
    MatchResult {
        mismatches,
    }
}

/// Returns the body as seen by the matcher.
fn actual_body(response: &CapturedResponse) -> Option<Value> {
    if let Some(value) = response.json_body() {
        return Some(value.clone());
    }
    if response.body().iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(Value::String(response.text()))
    }
}

// ============================================================================
// SECTION: Tree Comparison
// ============================================================================

/// Recursively compares, appending mismatches.
fn check(expect: &Expect, actual: Option<&Value>, mode: CollectionMode, path: &str, out: &mut Vec<Mismatch>) {
    if let Expect::Absent = expect {
        if let Some(value) = actual {
            out.push(mismatch(path, MismatchReason::Present, expect, describe_value(value)));
        }
        return;
    }
    let Some(actual) = actual else {
        out.push(mismatch(path, MismatchReason::Missing, expect, "<absent>".to_string()));
        return;
    };

    match expect {
        Expect::Absent | Expect::Any => {}
        Expect::Literal(expected) => {
            if !json_equal(expected, actual) {
                let reason = if type_name(expected) == type_name(actual) {
                    MismatchReason::Value
                } else {
                    MismatchReason::Type
                };
                out.push(mismatch(path, reason, expect, describe_value(actual)));
            }
        }
        Expect::Pattern(pattern) => match actual {
            Value::String(text) => {
                if !pattern.is_match(text) {
                    out.push(mismatch(path, MismatchReason::Pattern, expect, describe_value(actual)));
                }
            }
            other => {
                out.push(mismatch(path, MismatchReason::Type, expect, describe_value(other)));
            }
        },
        Expect::Predicate(predicate) => {
            if !predicate.test(actual) {
                out.push(mismatch(path, MismatchReason::Predicate, expect, describe_value(actual)));
            }
        }
        Expect::Map {
            mode: own,
            entries,
        } => {
            let Value::Object(object) = actual else {
                out.push(mismatch(path, MismatchReason::Type, expect, describe_value(actual)));
                return;
            };
            let effective = own.unwrap_or(mode);
            check_map(entries, object, effective, path, out);
        }
        Expect::List {
            mode: own,
            order,
            items,
        } => {
            let Value::Array(elements) = actual else {
                out.push(mismatch(path, MismatchReason::Type, expect, describe_value(actual)));
                return;
            };
            let effective = own.unwrap_or(mode);
            match order {
                ListOrder::Ordered => check_ordered(expect, items, elements, effective, path, out),
                ListOrder::Unordered => check_unordered(items, elements, effective, path, out),
            }
        }
    }
}

/// Compares object entries.
fn check_map(
    entries: &BTreeMap<String, Expect>,
    object: &Map<String, Value>,
    mode: CollectionMode,
    path: &str,
    out: &mut Vec<Mismatch>,
) {
    for (key, expected) in entries {
        check(expected, object.get(key), mode, &format!("{path}.{key}"), out);
    }
    if mode == CollectionMode::Exact {
        for (key, value) in object {
            if !entries.contains_key(key) {
                out.push(Mismatch {
                    path: format!("{path}.{key}"),
                    reason: MismatchReason::UnexpectedKey,
                    expected: "<absent>".to_string(),
                    actual: describe_value(value),
                });
            }
        }
    }
}

/// Compares positional lists.
fn check_ordered(
    expect: &Expect,
    items: &[Expect],
    elements: &[Value],
    mode: CollectionMode,
    path: &str,
    out: &mut Vec<Mismatch>,
) {
    match mode {
        CollectionMode::Exact => {
            if items.len() != elements.len() {
                out.push(Mismatch {
                    path: path.to_string(),
                    reason: MismatchReason::Length,
                    expected: expect.describe(),
                    actual: format!("list of {} element(s)", elements.len()),
                });
                return;
            }
            for (index, (item, element)) in items.iter().zip(elements).enumerate() {
                check(item, Some(element), mode, &format!("{path}[{index}]"), out);
            }
        }
        CollectionMode::Subset => {
            let mut cursor = 0;
            for (index, item) in items.iter().enumerate() {
                let found = elements[cursor ..].iter().position(|element| fits(item, element, mode));
                match found {
                    Some(offset) => cursor += offset + 1,
                    None => {
                        out.push(mismatch(
                            &format!("{path}[{index}]"),
                            MismatchReason::UnmatchedElement,
                            item,
                            "<no element in order>".to_string(),
                        ));
                    }
                }
            }
        }
    }
}

/// Compares lists as multisets.
fn check_unordered(
    items: &[Expect],
    elements: &[Value],
    mode: CollectionMode,
    path: &str,
    out: &mut Vec<Mismatch>,
) {
    let compatible: Vec<Vec<bool>> =
        items.iter().map(|item| elements.iter().map(|element| fits(item, element, mode)).collect()).collect();
    let assignment = maximum_matching(&compatible, elements.len());

    let mut consumed = vec![false; elements.len()];
    for (index, assigned) in assignment.iter().enumerate() {
        match assigned {
            Some(element) => consumed[*element] = true,
            None => out.push(mismatch(
                &format!("{path}[{index}]"),
                MismatchReason::UnmatchedElement,
                &items[index],
                "<no matching element>".to_string(),
            )),
        }
    }
    if mode == CollectionMode::Exact {
        for (index, element) in elements.iter().enumerate() {
            if !consumed[index] {
                out.push(Mismatch {
                    path: format!("{path}[{index}]"),
                    reason: MismatchReason::UnexpectedElement,
                    expected: "<no element>".to_string(),
                    actual: describe_value(element),
                });
            }
        }
    }
}

/// Returns true when an element satisfies an expectation with no mismatches.
fn fits(item: &Expect, element: &Value, mode: CollectionMode) -> bool {
    let mut scratch = Vec::new();
    check(item, Some(element), mode, "", &mut scratch);
    scratch.is_empty()
}

/// Kuhn's augmenting-path bipartite matching.
///
/// Returns, for each expected item, the index of the actual element assigned.
fn maximum_matching(compatible: &[Vec<bool>], right_len: usize) -> Vec<Option<usize>> {
    let mut owner: Vec<Option<usize>> = vec![None; right_len];
    for left in 0 .. compatible.len() {
        let mut visited = vec![false; right_len];
        augment(left, compatible, &mut owner, &mut visited);
    }
    let mut assignment = vec![None; compatible.len()];
    for (right, left) in owner.iter().enumerate() {
        if let Some(left) = left {
            assignment[*left] = Some(right);
        }
    }
    assignment
}

/// Tries to find an augmenting path from `left`.
fn augment(left: usize, compatible: &[Vec<bool>], owner: &mut [Option<usize>], visited: &mut [bool]) -> bool {
    for right in 0 .. owner.len() {
        if !compatible[left][right] || visited[right] {
            continue;
        }
        visited[right] = true;
        let free = match owner[right] {
            None => true,
            Some(current) => augment(current, compatible, owner, visited),
        };
        if free {
            owner[right] = Some(left);
            return true;
        }
    }
    false
}

// ============================================================================
// SECTION: Value Helpers
// ============================================================================

/// Builds a mismatch record.
fn mismatch(path: &str, reason: MismatchReason, expect: &Expect, actual: String) -> Mismatch {
    Mismatch {
        path: path.to_string(),
        reason,
        expected: expect.describe(),
        actual,
    }
}

/// JSON equality with numeric comparison by value.
#[must_use]
pub fn json_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(left), Value::Number(right)) => {
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                return left == right;
            }
            if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
                return left == right;
            }
            match (left.as_f64(), right.as_f64()) {
                (Some(left), Some(right)) => (left - right).abs() <= f64::EPSILON * left.abs().max(1.0),
                _ => false,
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(left, right)| json_equal(left, right))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| right.get(key).is_some_and(|other| json_equal(value, other)))
        }
        _ => expected == actual,
    }
}

/// Returns the JSON type name of a value.
const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
