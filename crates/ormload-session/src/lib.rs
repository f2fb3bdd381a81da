//! Cursor-scoped collection loading for ormload sessions.
//!
//! `ormload-session` is the **loading coordination layer**. While a unit of
//! work reads result rows, possibly from several cursors open at once and
//! nested inside each other, it decides which collection instance receives
//! each row and finalizes every collection exactly once when its cursor is
//! exhausted.
//!
//! # Role In The Architecture
//!
//! - **Registry**: one [`LoadingRegistry`] per [`LoadSession`] maps cursors to
//!   their contexts and collection keys to the cursor populating them.
//! - **Row routing**: [`CollectionLoader::resolve_target`] picks (or creates)
//!   the collection a row's element belongs to, or says to ignore the row.
//! - **Finalization**: [`CollectionLoader::finalize`] ends the read, registers
//!   the collection with the object cache and optionally writes it to the
//!   second-level cache.
//!
//! # Design Philosophy
//!
//! - **Explicit session passing**: completing a collection receives
//!   `&mut LoadSession`, so nested loads reenter through a plain borrow.
//! - **Single-threaded**: collections are `Rc`-shared with interior mutability.
//! - **Never fail the load**: inconsistencies are logged and counted
//!   ([`LoadingDebugInfo::consistency_warnings`]), cache failures are logged.
//!
//! # Example
//!
//! ```ignore
//! let mut session = LoadSession::new(StatefulPersistenceContext::default());
//! let items = BasicCollectionPersister::new("Order.items", "Order").into_ref();
//!
//! let cursor = session.open_cursor();
//! let mut loader = session.collection_load_context(cursor);
//! for (owner_id, element) in rows {
//!     if let Some(target) = loader.resolve_target(&items, &Value::BigInt(owner_id)) {
//!         // read the element into `target`
//!     }
//! }
//! loader.finalize(&items);
//! ```

pub mod cache;
pub mod collection;
pub mod collection_context;
pub mod entity_context;
pub mod entry;
pub mod key;
pub mod persistence;
pub mod persister;
pub mod registry;
pub mod session;
pub mod settings;
pub mod stats;

pub use cache::{CacheKey, CachedItem, CollectionCacheAccess, CollectionCacheEntry, InMemoryCacheRegion};
pub use collection::{CollectionId, CollectionOwner, CollectionRef, PersistentBag, PersistentCollection};
pub use collection_context::{CollectionLoadContext, CollectionLoader};
pub use entity_context::EntityLoadContext;
pub use entry::LoadingCollectionEntry;
pub use key::{CollectionKey, CursorHandle, EntityKey};
pub use persistence::{
    CollectionEntry, EntityEntry, EntityStatus, PersistenceContext, StatefulPersistenceContext,
};
pub use persister::{BasicCollectionPersister, CollectionPersister, PersisterRef};
pub use registry::LoadingRegistry;
pub use session::{LoadSession, LoadingDebugInfo};
pub use settings::LoadSettings;
pub use stats::{LoadStatistics, StatisticsSnapshot};
