//! Entry filtering for settings transfers.
//!
//! This module decides which entries of a configuration root are left out
//! of the archive:
//! - Fixed component names (caches, session logs, language-pack storage)
//! - Socket and database-journal files anywhere in the tree
//! - Optional user-supplied glob patterns
//!
//! Per-workspace state directories are retained even though they resemble
//! the storage the fixed rules skip.

use codesync_core::{Result, SyncError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};

/// Path components that are ALWAYS excluded from transfers.
/// These are large, host-specific or regenerable.
pub const EXCLUDED_COMPONENTS: &[&str] = &[
    "Cache",
    "CachedData",
    "CachedExtensions",
    "CachedExtensionVSIXs",
    "CachedProfilesData",
    "Code Cache",
    "GPUCache",
    "logs",
    "clp",
];

/// Top-level directories that are always transferred, even when a component
/// below them matches [`EXCLUDED_COMPONENTS`].
pub const RETAINED_DIRECTORIES: &[&str] = &["workspaceStorage", "globalStorage"];

/// File name suffixes that are never transferred (sockets, SQLite journals).
pub const EXCLUDED_SUFFIXES: &[&str] = &[".sock", "-journal"];

/// Outcome of filtering a single walk entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Transfer the entry
    Include,
    /// Leave the file out
    Exclude,
    /// Leave the directory out and do not descend into it
    SkipSubtree,
}

/// Filter applied to every entry of a configuration root.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    /// Compiled user patterns, matched against the root-relative path
    patterns: Option<GlobSet>,
}

impl EntryFilter {
    /// Creates a filter with only the fixed exclusion rules.
    pub fn new() -> Self {
        Self { patterns: None }
    }

    /// Creates a filter with the fixed rules plus additional glob patterns.
    pub fn with_patterns(additional_patterns: &[String]) -> Result<Self> {
        if additional_patterns.is_empty() {
            return Ok(Self::new());
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in additional_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                SyncError::invalid_config(format!("Invalid exclusion pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }

        let globset = builder.build().map_err(|e| {
            SyncError::invalid_config(format!("Failed to build exclusion globset: {}", e))
        })?;

        Ok(Self {
            patterns: Some(globset),
        })
    }

    /// Decides inclusion for a path relative to its configuration root.
    pub fn decide(&self, relative: &Path, is_dir: bool) -> FilterDecision {
        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        // The root itself is always walked
        let Some(last) = components.last() else {
            return FilterDecision::Include;
        };

        if self.is_excluded(&components, last, relative) {
            if is_dir {
                FilterDecision::SkipSubtree
            } else {
                FilterDecision::Exclude
            }
        } else {
            FilterDecision::Include
        }
    }

    /// Checks if a path should be left out of the archive.
    pub fn should_exclude(&self, relative: &Path, is_dir: bool) -> bool {
        self.decide(relative, is_dir) != FilterDecision::Include
    }

    fn is_excluded(&self, components: &[String], last: &str, relative: &Path) -> bool {
        if let Some(patterns) = &self.patterns {
            if patterns.is_match(relative) {
                return true;
            }
        }

        if EXCLUDED_SUFFIXES.iter().any(|suffix| last.ends_with(suffix)) {
            return true;
        }

        let retained = RETAINED_DIRECTORIES.contains(&components[0].as_str());
        !retained
            && components
                .iter()
                .any(|c| EXCLUDED_COMPONENTS.contains(&c.as_str()))
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::new()
    }
}
