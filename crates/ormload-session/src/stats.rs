//! Load statistics.

use std::collections::HashMap;

/// Counts collection loads per role and cache puts per region.
///
/// Recording is a no-op while statistics are disabled.
#[derive(Debug, Default)]
pub struct LoadStatistics {
    enabled: bool,
    collection_loads: HashMap<String, u64>,
    cache_puts: HashMap<String, u64>,
}

/// Point-in-time totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    /// Collections finalized, across all roles.
    pub collections_loaded: u64,
    /// Second-level cache puts that stored an entry, across all regions.
    pub cache_puts: u64,
    /// Distinct roles loaded.
    pub roles_loaded: usize,
}

impl LoadStatistics {
    /// Create a collector.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// Check if recording is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable recording.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable recording. Existing counts are kept.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Record that a collection of `role` finished loading.
    pub fn collection_loaded(&mut self, role: &str) {
        if !self.enabled {
            return;
        }
        *self.collection_loads.entry(role.to_string()).or_insert(0) += 1;
    }

    /// Record a stored second-level cache put in `region`.
    pub fn second_level_cache_put(&mut self, region: &str) {
        if !self.enabled {
            return;
        }
        *self.cache_puts.entry(region.to_string()).or_insert(0) += 1;
    }

    /// Loads recorded for a role.
    pub fn collection_load_count(&self, role: &str) -> u64 {
        self.collection_loads.get(role).copied().unwrap_or(0)
    }

    /// Puts recorded for a region.
    pub fn cache_put_count(&self, region: &str) -> u64 {
        self.cache_puts.get(region).copied().unwrap_or(0)
    }

    /// Totals across roles and regions.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            collections_loaded: self.collection_loads.values().sum(),
            cache_puts: self.cache_puts.values().sum(),
            roles_loaded: self.collection_loads.len(),
        }
    }

    /// Reset all counts.
    pub fn reset(&mut self) {
        self.collection_loads.clear();
        self.cache_puts.clear();
    }
}
