//! The unit of work seen from the loading layer.

use crate::collection::CollectionRef;
use crate::collection_context::CollectionLoader;
use crate::entity_context::EntityLoadContext;
use crate::key::CursorHandle;
use crate::persistence::PersistenceContext;
use crate::persister::CollectionPersister;
use crate::registry::LoadingRegistry;
use crate::settings::LoadSettings;
use crate::stats::LoadStatistics;
use ormload_core::{CacheMode, Value};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// One unit of work's loading state.
///
/// Owns the [`LoadingRegistry`] together with the collaborators collection
/// loading consults: the object cache, statistics, settings and the set of
/// enabled session filters. Everything here is single-threaded; a session is
/// never shared across units of work.
pub struct LoadSession {
    registry: LoadingRegistry,
    persistence: Box<dyn PersistenceContext>,
    statistics: LoadStatistics,
    settings: LoadSettings,
    enabled_filters: BTreeSet<String>,
    timestamp: i64,
}

impl LoadSession {
    /// Create a session over an object cache with default settings.
    pub fn new(persistence: impl PersistenceContext + 'static) -> Self {
        Self::with_settings(persistence, LoadSettings::default())
    }

    /// Create a session over an object cache with custom settings.
    pub fn with_settings(
        persistence: impl PersistenceContext + 'static,
        settings: LoadSettings,
    ) -> Self {
        tracing::debug!(
            cache_mode = ?settings.cache_mode,
            mode = %settings.representation_mode,
            statistics = settings.statistics_enabled,
            "Opening load session"
        );
        Self {
            registry: LoadingRegistry::new(),
            persistence: Box::new(persistence),
            statistics: LoadStatistics::new(settings.statistics_enabled),
            settings,
            enabled_filters: BTreeSet::new(),
            timestamp: now_millis(),
        }
    }

    // ========================================================================
    // Cursors
    // ========================================================================

    /// Issue a handle for a newly opened cursor.
    pub fn open_cursor(&mut self) -> CursorHandle {
        let cursor = self.registry.open_cursor();
        tracing::trace!(cursor = %cursor, "Opened cursor");
        cursor
    }

    /// Get the collection loader for a cursor, creating its context on first
    /// use.
    pub fn collection_load_context(&mut self, cursor: CursorHandle) -> CollectionLoader<'_> {
        self.registry.context_for(cursor);
        CollectionLoader::new(self, cursor)
    }

    /// Get the entity load context for a cursor, creating it on first use.
    pub fn entity_load_context(&mut self, cursor: CursorHandle) -> &mut EntityLoadContext {
        self.registry.entity_context_for(cursor)
    }

    /// Release everything held for a cursor once it is closed.
    pub fn retire(&mut self, cursor: CursorHandle) {
        self.registry.retire(cursor);
    }

    /// Fail-safe release of every remaining cursor context.
    pub fn sweep(&mut self) {
        self.registry.sweep();
    }

    /// The collection of `persister`'s role for `owner_key` that some cursor
    /// is currently populating.
    pub fn locate_loading_collection(
        &self,
        persister: &dyn CollectionPersister,
        owner_key: &Value,
    ) -> Option<CollectionRef> {
        self.registry
            .locate_loading_collection(persister, owner_key, self.settings.representation_mode)
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    pub fn registry(&self) -> &LoadingRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut LoadingRegistry {
        &mut self.registry
    }

    /// The object cache.
    pub fn persistence(&self) -> &dyn PersistenceContext {
        self.persistence.as_ref()
    }

    /// The object cache, mutably.
    pub fn persistence_mut(&mut self) -> &mut dyn PersistenceContext {
        self.persistence.as_mut()
    }

    pub fn statistics(&self) -> &LoadStatistics {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut LoadStatistics {
        &mut self.statistics
    }

    pub fn settings(&self) -> &LoadSettings {
        &self.settings
    }

    /// Change how the rest of the unit of work uses the second-level cache.
    pub fn set_cache_mode(&mut self, mode: CacheMode) {
        self.settings.cache_mode = mode;
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Enable a session filter by name.
    pub fn enable_filter(&mut self, name: impl Into<String>) {
        self.enabled_filters.insert(name.into());
    }

    /// Disable a session filter. Returns `false` if it was not enabled.
    pub fn disable_filter(&mut self, name: &str) -> bool {
        self.enabled_filters.remove(name)
    }

    pub fn enabled_filters(&self) -> &BTreeSet<String> {
        &self.enabled_filters
    }

    // ========================================================================
    // Timestamp
    // ========================================================================

    /// Session timestamp (milliseconds since the Unix epoch) stamped on
    /// second-level cache puts.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    // ========================================================================
    // Debug Diagnostics
    // ========================================================================

    /// Get a snapshot of the loading state.
    pub fn debug_state(&self) -> LoadingDebugInfo {
        LoadingDebugInfo {
            active_collection_contexts: self.registry.collection_context_count(),
            active_entity_contexts: self.registry.entity_context_count(),
            registered_collections: self.registry.registered_count(),
            consistency_warnings: self.registry.consistency_warnings(),
        }
    }
}

impl std::fmt::Debug for LoadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadSession")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("enabled_filters", &self.enabled_filters)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

impl Drop for LoadSession {
    fn drop(&mut self) {
        let live = self.registry.has_loading_collection_entries()
            || self.registry.entity_context_count() > 0
            || self.registry.has_registered_loading_collection_entries();
        if live {
            tracing::warn!("Load session closed with live cursor contexts");
            self.registry.sweep();
        }
    }
}

/// Debug information about loading state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingDebugInfo {
    /// Cursors with a collection load context.
    pub active_collection_contexts: usize,
    /// Cursors with an entity load context.
    pub active_entity_contexts: usize,
    /// Collections registered as being populated.
    pub registered_collections: usize,
    /// Consistency warnings logged so far.
    pub consistency_warnings: u64,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
