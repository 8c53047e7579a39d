// crates/pedant-core/src/headers.rs
// ============================================================================
// Module: Pedant Header Maps
// Description: Ordered, case-preserving HTTP header maps with layered merges.
// Purpose: Model request and response headers with HTTP name semantics.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`HeaderMap`] stores header names exactly as supplied while matching them
//! case-insensitively, as HTTP requires. Request headers are assembled from
//! ordered layers with [`HeaderMap::merge`]; a later layer replaces any
//! same-named entry from an earlier one.
//!
//! Invariants:
//! - At most one entry exists per case-insensitive name.
//! - Insertion order is preserved; replacing a value keeps the original slot
//!   but adopts the new spelling of the name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde::ser::SerializeMap;

// ============================================================================
// SECTION: Header Names
// ============================================================================

/// `Accept` header.
pub const ACCEPT: &str = "Accept";
/// `Content-Type` header.
pub const CONTENT_TYPE: &str = "Content-Type";
/// `User-Agent` header.
pub const USER_AGENT: &str = "User-Agent";
/// `Host` header.
pub const HOST: &str = "Host";
/// Client version header consumed by the server under test.
pub const X_CHEF_VERSION: &str = "X-Chef-Version";
/// Feature-flag watermark header.
pub const X_OPS_DARKLAUNCH: &str = "X-Ops-Darklaunch";
/// Signing algorithm and protocol version header.
pub const X_OPS_SIGN: &str = "X-Ops-Sign";
/// Requesting identity header.
pub const X_OPS_USERID: &str = "X-Ops-Userid";
/// Signing timestamp header.
pub const X_OPS_TIMESTAMP: &str = "X-Ops-Timestamp";
/// Body digest header.
pub const X_OPS_CONTENT_HASH: &str = "X-Ops-Content-Hash";
/// Prefix of the numbered signature chunk headers.
pub const X_OPS_AUTHORIZATION_PREFIX: &str = "X-Ops-Authorization-";
/// Server API version header (protocol 1.3).
pub const X_OPS_SERVER_API_VERSION: &str = "X-Ops-Server-API-Version";

// ============================================================================
// SECTION: Header Map
// ============================================================================

/// Ordered header map with case-insensitive names and case-preserving storage.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    /// Header entries in insertion order.
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Creates an empty header map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds a header map from name/value pairs, later pairs overriding earlier ones.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.insert(name, value);
        }
        map
    }

    /// Inserts a header, replacing any entry with the same case-insensitive name.
    ///
    /// Returns the previous value when one was replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.position(&name) {
            let (_, old_value) = std::mem::replace(&mut self.entries[slot], (name, value));
            return Some(old_value);
        }
        self.entries.push((name, value));
        None
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|slot| self.entries[slot].1.as_str())
    }

    /// Returns true when a header with the given name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes a header by case-insensitive name, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|slot| self.entries.remove(slot).1)
    }

    /// Merges another layer on top of this map; the layer wins on name collisions.
    pub fn merge(&mut self, layer: &Self) {
        for (name, value) in &layer.entries {
            self.insert(name.clone(), value.clone());
        }
    }

    /// Returns a new map with `layer` merged on top of `self`.
    #[must_use]
    pub fn merged(&self, layer: &Self) -> Self {
        let mut out = self.clone();
        out.merge(layer);
        out
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no headers are present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the slot index for a case-insensitive header name.
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(name, value)| (name, value))).finish()
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}
