// crates/pedant-harness/src/tags.rs
// ============================================================================
// Module: Pedant Tag Filters
// Description: Inclusion and exclusion filters over scenario tags.
// Purpose: Select which scenarios a run executes.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Tags prefixed with `~` exclude, all others include. A scenario runs when
//! none of its tags are excluded and, if any inclusions exist, at least one
//! of its tags is included. `run_all` disables filtering entirely.

use std::collections::BTreeSet;

/// Prefix marking an exclusion tag.
pub const EXCLUDE_PREFIX: char = '~';

/// Tag selection for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    /// Tags a scenario must carry one of.
    include: BTreeSet<String>,
    /// Tags that exclude a scenario.
    exclude: BTreeSet<String>,
    /// Whether filtering is disabled.
    run_all: bool,
}

impl TagFilter {
    /// Builds a filter from `tag` / `~tag` entries.
    #[must_use]
    pub fn parse<T: AsRef<str>>(tags: impl IntoIterator<Item = T>) -> Self {
        let mut filter = Self::default();
        for tag in tags {
            filter.add(tag.as_ref());
        }
        filter
    }

    /// Adds one `tag` or `~tag` entry. Blank entries are ignored.
    pub fn add(&mut self, tag: &str) {
        let tag = tag.trim();
        if let Some(excluded) = tag.strip_prefix(EXCLUDE_PREFIX) {
            if !excluded.is_empty() {
                self.exclude.insert(excluded.to_string());
            }
        } else if !tag.is_empty() {
            self.include.insert(tag.to_string());
        }
    }

    /// Adds an exclusion by bare tag name.
    pub fn exclude(&mut self, tag: &str) {
        let tag = tag.trim().trim_start_matches(EXCLUDE_PREFIX);
        if !tag.is_empty() {
            self.exclude.insert(tag.to_string());
        }
    }

    /// Disables filtering.
    #[must_use]
    pub const fn run_all(mut self, run_all: bool) -> Self {
        self.run_all = run_all;
        self
    }

    /// Returns true when a scenario with `tags` should run.
    #[must_use]
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        if self.run_all {
            return true;
        }
        if tags.iter().any(|tag| self.exclude.contains(tag)) {
            return false;
        }
        self.include.is_empty() || tags.iter().any(|tag| self.include.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_filter_runs_everything() {
        assert!(TagFilter::default().matches(&tags(&["clients"])));
        assert!(TagFilter::default().matches(&tags(&[])));
    }

    #[test]
    fn exclusion_beats_inclusion() {
        let filter = TagFilter::parse(["clients", "~slow"]);
        assert!(filter.matches(&tags(&["clients"])));
        assert!(!filter.matches(&tags(&["clients", "slow"])));
        assert!(!filter.matches(&tags(&["environments"])));
    }

    #[test]
    fn run_all_ignores_filters() {
        let filter = TagFilter::parse(["~clients"]).run_all(true);
        assert!(filter.matches(&tags(&["clients"])));
    }

    #[test]
    fn exclude_accepts_bare_or_prefixed_names() {
        let mut filter = TagFilter::default();
        filter.exclude("keys");
        filter.exclude("~search");
        assert!(!filter.matches(&tags(&["keys"])));
        assert!(!filter.matches(&tags(&["search"])));
        assert!(filter.matches(&tags(&["clients"])));
    }
}
