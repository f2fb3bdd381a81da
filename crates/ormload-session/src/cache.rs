//! Second-level cache access for loaded collections.
//!
//! The loading layer only ever writes to the cache, and only from a completed
//! load ("put from load"). Regions are shared across units of work, so a put is
//! best-effort: a rejected or failed put means "not cached", never a failed load.

use crate::collection::PersistentCollection;
use crate::persister::CollectionPersister;
use ormload_core::{CacheError, CacheErrorKind, Result, Value};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

/// Key of a collection's entry in a second-level cache region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    role: String,
    owner_key: Value,
}

impl CacheKey {
    /// Create a cache key for a role and owner.
    pub fn new(role: impl Into<String>, owner_key: Value) -> Self {
        Self {
            role: role.into(),
            owner_key,
        }
    }

    /// The collection role.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The owner's identifier.
    pub fn owner_key(&self) -> &Value {
        &self.owner_key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.owner_key)
    }
}

/// Cacheable snapshot of one loaded collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionCacheEntry {
    role: String,
    state: serde_json::Value,
}

impl CollectionCacheEntry {
    /// Disassemble a loaded collection.
    pub fn new(collection: &dyn PersistentCollection, persister: &dyn CollectionPersister) -> Self {
        Self {
            role: persister.role().to_string(),
            state: collection.disassemble(persister),
        }
    }

    /// The collection role.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The disassembled state.
    pub fn state(&self) -> &serde_json::Value {
        &self.state
    }

    /// The structured form handed to the cache.
    pub fn structure(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Write access to one second-level cache region.
pub trait CollectionCacheAccess {
    /// Name of the region, used for statistics attribution.
    fn region_name(&self) -> &str;

    /// Store state read from the database.
    ///
    /// `minimal_put` asks the region to skip the write if it already holds an
    /// entry for the key. Returns whether the entry was stored.
    fn put_from_load(
        &self,
        key: &CacheKey,
        entry: serde_json::Value,
        timestamp: i64,
        version: Option<&Value>,
        minimal_put: bool,
    ) -> Result<bool>;
}

/// An entry held by [`InMemoryCacheRegion`].
#[derive(Debug, Clone, PartialEq)]
pub struct CachedItem {
    pub value: serde_json::Value,
    pub timestamp: i64,
    pub version: Option<Value>,
}

/// A process-local cache region.
#[derive(Debug)]
pub struct InMemoryCacheRegion {
    name: String,
    entries: RefCell<HashMap<CacheKey, CachedItem>>,
    failure: Cell<Option<CacheErrorKind>>,
    puts: Cell<usize>,
}

impl InMemoryCacheRegion {
    /// Create an empty region.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RefCell::new(HashMap::new()),
            failure: Cell::new(None),
            puts: Cell::new(0),
        }
    }

    /// Make every subsequent put fail with `kind`, or succeed again with `None`.
    pub fn fail_with(&self, kind: Option<CacheErrorKind>) {
        self.failure.set(kind);
    }

    /// Look up a cached entry.
    pub fn get(&self, key: &CacheKey) -> Option<CachedItem> {
        self.entries.borrow().get(key).cloned()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the region holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of puts that stored an entry.
    pub fn put_count(&self) -> usize {
        self.puts.get()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl CollectionCacheAccess for InMemoryCacheRegion {
    fn region_name(&self) -> &str {
        &self.name
    }

    fn put_from_load(
        &self,
        key: &CacheKey,
        entry: serde_json::Value,
        timestamp: i64,
        version: Option<&Value>,
        minimal_put: bool,
    ) -> Result<bool> {
        if let Some(kind) = self.failure.get() {
            return Err(CacheError::new(kind, self.name.clone(), "simulated region failure").into());
        }

        let mut entries = self.entries.borrow_mut();
        if minimal_put && entries.contains_key(key) {
            tracing::trace!(region = %self.name, key = %key, "Minimal put: entry already cached");
            return Ok(false);
        }

        entries.insert(
            key.clone(),
            CachedItem {
                value: entry,
                timestamp,
                version: version.cloned(),
            },
        );
        self.puts.set(self.puts.get() + 1);
        Ok(true)
    }
}
