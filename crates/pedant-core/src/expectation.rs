// crates/pedant-core/src/expectation.rs
// ============================================================================
// Module: Pedant Expectation Trees
// Description: Partially specified response expectations with match modes.
// Purpose: Describe what a response must look like without over-constraining it.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! An [`Expect`] tree mirrors the shape of an expected JSON body. Each node is
//! a literal, a regular expression, a map or list with an optional collection
//! mode, an explicit absence marker, a presence wildcard or a named predicate.
//!
//! Collection modes:
//! - `Exact`: no extra keys or elements are tolerated.
//! - `Subset`: every expected key or element must match; extras are ignored.
//! - unset: inherit the parent's mode. The root inherits the default chosen by
//!   [`ResponseExpectation::body`] (subset) or
//!   [`ResponseExpectation::body_exact`] (exact).
//!
//! Invariants:
//! - [`Expect::Absent`] (key must not exist) and `Literal(Value::Null)` (key
//!   must exist and be `null`) are distinct.
//! - Builders never mutate their receiver; they return a new tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::response::CapturedResponse;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building expectations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpectationError {
    /// The regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

// ============================================================================
// SECTION: Modes
// ============================================================================

/// Collection matching mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// Identical membership; no extras.
    Exact,
    /// Expected members must be present; extras ignored.
    Subset,
}

/// List ordering requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Multiset comparison; any order.
    #[default]
    Unordered,
    /// Positional comparison.
    Ordered,
}

// ============================================================================
// SECTION: Pattern and Predicate
// ============================================================================

/// Compiled regular expression matched against string values.
#[derive(Clone)]
pub struct Pattern {
    /// Compiled regex.
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidPattern`] when compilation fails.
    pub fn new(source: &str) -> Result<Self, ExpectationError> {
        Regex::new(source)
            .map(|regex| Self {
                regex,
            })
            .map_err(|err| ExpectationError::InvalidPattern(err.to_string()))
    }

    /// Returns true when the text matches.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Returns the pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.regex.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self {
            regex,
        }
    }
}

/// Predicate check function.
type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Named predicate over a present value.
#[derive(Clone)]
pub struct Predicate {
    /// Label shown in diffs.
    label: String,
    /// Check function.
    check: Arc<PredicateFn>,
}

impl Predicate {
    /// Creates a labelled predicate.
    pub fn new(label: impl Into<String>, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn test(&self, value: &Value) -> bool {
        (self.check)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.label)
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && Arc::ptr_eq(&self.check, &other.check)
    }
}

// ============================================================================
// SECTION: Expectation Tree
// ============================================================================

/// Expectation node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    /// Exact JSON equality (numbers compared by value).
    Literal(Value),
    /// The value must be a string matching the pattern.
    Pattern(Pattern),
    /// The value must be an object.
    Map {
        /// Mode; `None` inherits from the parent.
        mode: Option<CollectionMode>,
        /// Expected entries.
        entries: BTreeMap<String, Self>,
    },
    /// The value must be an array.
    List {
        /// Mode; `None` inherits from the parent.
        mode: Option<CollectionMode>,
        /// Ordering requirement.
        order: ListOrder,
        /// Expected elements.
        items: Vec<Self>,
    },
    /// The key must not exist.
    Absent,
    /// The key must exist with any value.
    Any,
    /// The value must satisfy the predicate.
    Predicate(Predicate),
}

impl Expect {
    /// Literal expectation.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Present-and-null expectation.
    #[must_use]
    pub const fn null() -> Self {
        Self::Literal(Value::Null)
    }

    /// Regex expectation.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidPattern`] when compilation fails.
    pub fn pattern(source: &str) -> Result<Self, ExpectationError> {
        Pattern::new(source).map(Self::Pattern)
    }

    /// Predicate expectation.
    pub fn predicate(label: impl Into<String>, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Predicate::new(label, check))
    }

    /// Map that inherits its mode.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::Map {
            mode: None,
            entries: entries.into_iter().map(|(key, value)| (key.into(), value)).collect(),
        }
    }

    /// Exact map.
    pub fn exact_map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::map(entries).with_mode(CollectionMode::Exact)
    }

    /// Subset map.
    pub fn subset_map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::map(entries).with_mode(CollectionMode::Subset)
    }

    /// Unordered list that inherits its mode.
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List {
            mode: None,
            order: ListOrder::Unordered,
            items: items.into_iter().collect(),
        }
    }

    /// Unordered exact list (multiset equality).
    pub fn exact_list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::list(items).with_mode(CollectionMode::Exact)
    }

    /// Unordered subset list (every expected element present).
    pub fn subset_list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::list(items).with_mode(CollectionMode::Subset)
    }

    /// Ordered list that inherits its mode.
    pub fn ordered_list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List {
            mode: None,
            order: ListOrder::Ordered,
            items: items.into_iter().collect(),
        }
    }

    /// Returns a copy with the collection mode set; scalars are unchanged.
    #[must_use]
    pub fn with_mode(self, new_mode: CollectionMode) -> Self {
        match self {
            Self::Map {
                entries, ..
            } => Self::Map {
                mode: Some(new_mode),
                entries,
            },
            Self::List {
                order,
                items,
                ..
            } => Self::List {
                mode: Some(new_mode),
                order,
                items,
            },
            other => other,
        }
    }

    /// Returns a new tree with `key` set to `value`.
    ///
    /// A non-map receiver is replaced by a mode-inheriting map holding only
    /// the new field.
    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Self>) -> Self {
        match self {
            Self::Map {
                mode,
                entries,
            } => {
                let mut entries = entries.clone();
                entries.insert(key.into(), value.into());
                Self::Map {
                    mode: *mode,
                    entries,
                }
            }
            _ => Self::map([(key.into(), value.into())]),
        }
    }

    /// Returns a new tree without any constraint on `key`.
    #[must_use]
    pub fn without_field(&self, key: &str) -> Self {
        match self {
            Self::Map {
                mode,
                entries,
            } => {
                let mut entries = entries.clone();
                entries.remove(key);
                Self::Map {
                    mode: *mode,
                    entries,
                }
            }
            other => other.clone(),
        }
    }

    /// Returns a new tree requiring `key` to be absent.
    #[must_use]
    pub fn with_absent(&self, key: impl Into<String>) -> Self {
        self.with_field(key, Self::Absent)
    }

    /// Builds an exact, order-insensitive expectation from a concrete value.
    #[must_use]
    pub fn exact_from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Map {
                mode: Some(CollectionMode::Exact),
                entries: map.iter().map(|(key, value)| (key.clone(), Self::exact_from_value(value))).collect(),
            },
            Value::Array(items) => Self::List {
                mode: Some(CollectionMode::Exact),
                order: ListOrder::Unordered,
                items: items.iter().map(Self::exact_from_value).collect(),
            },
            scalar => Self::Literal(scalar.clone()),
        }
    }

    /// Short description used in diffs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(value) => describe_value(value),
            Self::Pattern(pattern) => format!("/{}/", pattern.as_str()),
            Self::Map {
                mode,
                entries,
            } => format!("{} object with {} key(s)", mode_label(*mode), entries.len()),
            Self::List {
                mode,
                order,
                items,
            } => {
                let order = match order {
                    ListOrder::Ordered => "ordered",
                    ListOrder::Unordered => "unordered",
                };
                format!("{} {order} list of {} element(s)", mode_label(*mode), items.len())
            }
            Self::Absent => "<absent>".to_string(),
            Self::Any => "<any value>".to_string(),
            Self::Predicate(predicate) => format!("<{}>", predicate.label()),
        }
    }
}

/// Converts a JSON value into a mode-inheriting tree: objects become maps,
/// arrays become unordered lists and scalars become literals.
impl From<Value> for Expect {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map {
                mode: None,
                entries: map.into_iter().map(|(key, value)| (key, Self::from(value))).collect(),
            },
            Value::Array(items) => Self::list(items.into_iter().map(Self::from)),
            scalar => Self::Literal(scalar),
        }
    }
}

impl From<&str> for Expect {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Expect {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<bool> for Expect {
    fn from(value: bool) -> Self {
        Self::Literal(Value::Bool(value))
    }
}

impl From<i64> for Expect {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<Regex> for Expect {
    fn from(regex: Regex) -> Self {
        Self::Pattern(Pattern::from(regex))
    }
}

/// Label for an optional mode.
const fn mode_label(mode: Option<CollectionMode>) -> &'static str {
    match mode {
        Some(CollectionMode::Exact) => "exact",
        Some(CollectionMode::Subset) => "subset",
        None => "inherited",
    }
}

/// Maximum characters of a JSON value rendered into a diff line.
const MAX_DESCRIBED_CHARS: usize = 200;

/// Renders a JSON value for diffs, truncating long values.
#[must_use]
pub fn describe_value(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= MAX_DESCRIBED_CHARS {
        return text;
    }
    let truncated: String = text.chars().take(MAX_DESCRIBED_CHARS).collect();
    format!("{truncated}...")
}

// ============================================================================
// SECTION: Response Expectation
// ============================================================================

/// Expectation over a whole response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseExpectation {
    /// Required status code.
    pub(crate) status: Option<u16>,
    /// Body expectation.
    pub(crate) body: Option<Expect>,
    /// Root collection mode for the body.
    pub(crate) body_mode: Option<CollectionMode>,
    /// Header expectations by case-insensitive name.
    pub(crate) headers: Vec<(String, Expect)>,
}

impl ResponseExpectation {
    /// Creates an empty expectation that any response satisfies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expectation requiring only a status code.
    #[must_use]
    pub fn status_only(status: u16) -> Self {
        Self::new().status(status)
    }

    /// Requires the status code.
    #[must_use]
    pub const fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Requires the body to contain the expectation; root mode is subset.
    #[must_use]
    pub fn body(mut self, body: impl Into<Expect>) -> Self {
        self.body = Some(body.into());
        self.body_mode = Some(CollectionMode::Subset);
        self
    }

    /// Requires the body to match the expectation exactly; root mode is exact.
    #[must_use]
    pub fn body_exact(mut self, body: impl Into<Expect>) -> Self {
        self.body = Some(body.into());
        self.body_mode = Some(CollectionMode::Exact);
        self
    }

    /// Requires a header to match; `Expect::Absent` requires it to be missing.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Expect>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Returns a copy with a body field set.
    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Expect>) -> Self {
        let mut out = self.clone();
        let body = out.body.take().unwrap_or_else(|| Expect::map(Vec::<(String, Expect)>::new()));
        out.body = Some(body.with_field(key, value));
        if out.body_mode.is_none() {
            out.body_mode = Some(CollectionMode::Subset);
        }
        out
    }

    /// Returns a copy with no constraint on a body field.
    #[must_use]
    pub fn without_field(&self, key: &str) -> Self {
        let mut out = self.clone();
        out.body = out.body.map(|body| body.without_field(key));
        out
    }

    /// Builds an exact expectation describing a captured response.
    #[must_use]
    pub fn from_response(response: &CapturedResponse) -> Self {
        let expectation = Self::status_only(response.status());
        match response.json_body() {
            Some(value) => expectation.body_exact(Expect::exact_from_value(value)),
            None if response.body().iter().all(u8::is_ascii_whitespace) => {
                expectation.body_exact(Expect::Absent)
            }
            None => expectation.body_exact(Expect::Literal(Value::String(response.text()))),
        }
    }

    /// Returns the required status, if any.
    #[must_use]
    pub const fn expected_status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the body expectation, if any.
    #[must_use]
    pub const fn expected_body(&self) -> Option<&Expect> {
        self.body.as_ref()
    }

    /// Returns the root body mode (subset when unset).
    #[must_use]
    pub fn root_mode(&self) -> CollectionMode {
        self.body_mode.unwrap_or(CollectionMode::Subset)
    }
}
