// crates/pedant-core/src/darklaunch.rs
// ============================================================================
// Module: Pedant Darklaunch Flags
// Description: Ordered feature-flag sets encoded into the darklaunch header.
// Purpose: Guarantee the suite watermark is present on every request.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The `X-Ops-Darklaunch` header carries `key=value` pairs joined by `;`, with
//! values `1` or `0`. Flags are merged in three layers: built-in defaults,
//! caller flags, and finally the [`WATERMARK_FLAG`] forced to `1`.
//!
//! Invariants:
//! - [`DarklaunchFlags::encode_with_watermark`] always contains
//!   `pedant_x_darklaunch=1`, whatever the caller supplied for that key.
//! - Merging keeps the first-seen position of a key.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Flag forced on as the final merge step; used as a request-log watermark.
pub const WATERMARK_FLAG: &str = "pedant_x_darklaunch";

/// Flags always emitted, each defaulted from configuration.
pub const STANDARD_FLAGS: [&str; 7] = [
    "couchdb_environments",
    "couchdb_checksums",
    "couchdb_data",
    "couchdb_roles",
    "couchdb_cookbooks",
    "couchdb_clients",
    "couchdb_users",
];

// ============================================================================
// SECTION: Flag Set
// ============================================================================

/// Ordered darklaunch flag set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DarklaunchFlags {
    /// Flags in first-seen order.
    flags: Vec<(String, bool)>,
}

impl DarklaunchFlags {
    /// Creates an empty flag set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flags: Vec::new(),
        }
    }

    /// Builds the standard flag set, all flags set to `false`.
    #[must_use]
    pub fn standard() -> Self {
        STANDARD_FLAGS.iter().fold(Self::new(), |flags, name| flags.with(*name, false))
    }

    /// Returns a copy with the flag set to `enabled`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.set(name, enabled);
        self
    }

    /// Sets a flag, keeping its original position when already present.
    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        let name = name.into();
        if let Some(slot) = self.flags.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = enabled;
        } else {
            self.flags.push((name, enabled));
        }
    }

    /// Returns the value of a flag when present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.iter().find(|(existing, _)| existing == name).map(|(_, enabled)| *enabled)
    }

    /// Returns a new set with `layer` merged on top of `self`.
    #[must_use]
    pub fn merged(&self, layer: &Self) -> Self {
        let mut out = self.clone();
        for (name, enabled) in &layer.flags {
            out.set(name.clone(), *enabled);
        }
        out
    }

    /// Encodes the flags as `k=v;k=v` without the watermark.
    #[must_use]
    pub fn encode(&self) -> String {
        self.flags
            .iter()
            .map(|(name, enabled)| format!("{name}={}", u8::from(*enabled)))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Encodes the flags after forcing the watermark flag to `1`.
    #[must_use]
    pub fn encode_with_watermark(&self) -> String {
        self.clone().with(WATERMARK_FLAG, true).encode()
    }

    /// Parses an encoded darklaunch header value. Unknown values are rejected.
    #[must_use]
    pub fn parse(encoded: &str) -> Option<Self> {
        let mut flags = Self::new();
        for pair in encoded.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=')?;
            let enabled = match value.trim() {
                "1" => true,
                "0" => false,
                _ => return None,
            };
            flags.set(name.trim(), enabled);
        }
        Some(flags)
    }

    /// Iterates over flags in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }
}
