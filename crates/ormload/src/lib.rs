//! ormload - result-cursor-scoped collection loading for an object/relational
//! mapping runtime.
//!
//! While a unit of work streams result rows that hydrate entities and populate
//! their collections, ormload tracks which cursor owns each collection under
//! population, routes rows to the right collection instance, and finalizes
//! every collection exactly once, even when finalizing one collection opens
//! further cursors.
//!
//! # Quick Start
//!
//! ```ignore
//! use ormload::prelude::*;
//!
//! let mut session = LoadSession::new(StatefulPersistenceContext::default());
//! let items = BasicCollectionPersister::new("Order.items", "Order").into_ref();
//!
//! let cursor = session.open_cursor();
//! let mut loader = session.collection_load_context(cursor);
//! if let Some(target) = loader.resolve_target(&items, &Value::BigInt(1)) {
//!     if let Some(bag) = target.downcast_ref::<PersistentBag>() {
//!         bag.read_element(serde_json::json!({ "sku": "A-1" }));
//!     }
//! }
//! loader.finalize(&items);
//! ```
//!
//! # Crates
//!
//! - `ormload-core`: values, behavior switches and errors
//! - `ormload-session`: the loading registry, cursor contexts and the
//!   collaborator seams they drive

pub use ormload_core::{
    CacheError, CacheErrorKind, CacheMode, ConfigError, Error, RepresentationMode, Result, Value,
};
pub use ormload_session::{
    BasicCollectionPersister, CacheKey, CachedItem, CollectionCacheAccess, CollectionCacheEntry,
    CollectionEntry, CollectionId, CollectionKey, CollectionLoadContext, CollectionLoader,
    CollectionOwner, CollectionPersister, CollectionRef, CursorHandle, EntityEntry, EntityKey,
    EntityLoadContext, EntityStatus, InMemoryCacheRegion, LoadSession, LoadSettings,
    LoadStatistics, LoadingCollectionEntry, LoadingDebugInfo, LoadingRegistry, PersistenceContext,
    PersistentBag, PersistentCollection, PersisterRef, StatefulPersistenceContext,
    StatisticsSnapshot,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        BasicCollectionPersister, CacheMode, CollectionPersister, CollectionRef, CursorHandle,
        EntityEntry, EntityKey, Error, InMemoryCacheRegion, LoadSession, LoadSettings,
        PersistenceContext, PersistentBag, PersistentCollection, PersisterRef,
        RepresentationMode, Result, StatefulPersistenceContext, Value,
    };
}
