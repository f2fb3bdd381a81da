//! Session-level behavior switches.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How entities and collections are represented in memory.
///
/// The mode is part of every collection key: the same role and owner under
/// two modes are two distinct collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationMode {
    /// Statically-typed entity structs.
    #[default]
    Typed,
    /// Dynamic maps keyed by property name.
    Dynamic,
    /// Document trees.
    Document,
}

impl RepresentationMode {
    /// Whether rows for a collection whose owner is already settled in the
    /// object cache are skipped rather than read.
    ///
    /// Document trees are rebuilt from rows even when the owner is already
    /// loaded, so that mode never skips.
    pub const fn skips_rows_for_settled_owner(self) -> bool {
        !matches!(self, RepresentationMode::Document)
    }

    /// Get the mode name.
    pub const fn as_str(self) -> &'static str {
        match self {
            RepresentationMode::Typed => "typed",
            RepresentationMode::Dynamic => "dynamic",
            RepresentationMode::Document => "document",
        }
    }
}

impl fmt::Display for RepresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a unit of work interacts with the second-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Read from and write to the cache.
    #[default]
    Normal,
    /// Neither read from nor write to the cache.
    Ignore,
    /// Read from the cache, never write.
    Get,
    /// Write to the cache, never read.
    Put,
    /// Write to the cache, overwriting entries without minimal-put checks.
    Refresh,
}

impl CacheMode {
    /// Whether loaded state may be written to the cache.
    pub const fn is_put_enabled(self) -> bool {
        matches!(self, CacheMode::Normal | CacheMode::Put | CacheMode::Refresh)
    }

    /// Whether cached state may be read.
    pub const fn is_get_enabled(self) -> bool {
        matches!(self, CacheMode::Normal | CacheMode::Get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_mode_put_gating() {
        assert!(CacheMode::Normal.is_put_enabled());
        assert!(CacheMode::Put.is_put_enabled());
        assert!(CacheMode::Refresh.is_put_enabled());
        assert!(!CacheMode::Get.is_put_enabled());
        assert!(!CacheMode::Ignore.is_put_enabled());
    }

    #[test]
    fn test_cache_mode_get_gating() {
        assert!(CacheMode::Normal.is_get_enabled());
        assert!(CacheMode::Get.is_get_enabled());
        assert!(!CacheMode::Put.is_get_enabled());
        assert!(!CacheMode::Refresh.is_get_enabled());
    }

    #[test]
    fn test_representation_mode_settled_owner_rule() {
        assert!(RepresentationMode::Typed.skips_rows_for_settled_owner());
        assert!(RepresentationMode::Dynamic.skips_rows_for_settled_owner());
        assert!(!RepresentationMode::Document.skips_rows_for_settled_owner());
    }

    #[test]
    fn test_modes_deserialize_snake_case() {
        let mode: RepresentationMode = serde_json::from_str("\"document\"").unwrap();
        assert_eq!(mode, RepresentationMode::Document);
        let cache: CacheMode = serde_json::from_str("\"refresh\"").unwrap();
        assert_eq!(cache, CacheMode::Refresh);
    }
}
