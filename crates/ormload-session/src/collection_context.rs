//! Per-cursor collection loading.
//!
//! A cursor reads rows that may carry elements of many collections, of one or
//! more roles. [`CollectionLoader`] routes each row to the collection instance
//! that should receive it and, once the cursor is exhausted, finalizes every
//! collection of a role that this cursor populated.
//!
//! Finalization runs in two phases. The first detaches the finished
//! collections from the registry; the second completes them. Completing a
//! collection may load further collections through the same session (and so
//! reenter the registry), which is why the registry is never held borrowed
//! across the second phase.

use crate::cache::{CacheKey, CollectionCacheEntry};
use crate::collection::CollectionRef;
use crate::entry::LoadingCollectionEntry;
use crate::key::{CollectionKey, CursorHandle, EntityKey};
use crate::persister::{CollectionPersister, PersisterRef};
use crate::session::LoadSession;
use indexmap::IndexSet;
use ormload_core::{RepresentationMode, Value};
use std::fmt;

/// Collections being populated by one cursor.
///
/// Holds the keys of collections this cursor began populating, in discovery
/// order. The registry owns one per active cursor.
#[derive(Debug)]
pub struct CollectionLoadContext {
    cursor: CursorHandle,
    local_keys: IndexSet<CollectionKey>,
}

impl CollectionLoadContext {
    pub(crate) fn new(cursor: CursorHandle) -> Self {
        Self {
            cursor,
            local_keys: IndexSet::new(),
        }
    }

    pub fn cursor(&self) -> CursorHandle {
        self.cursor
    }

    /// Keys of collections this cursor is populating, in discovery order.
    pub fn local_keys(&self) -> impl Iterator<Item = &CollectionKey> {
        self.local_keys.iter()
    }

    pub fn local_key_count(&self) -> usize {
        self.local_keys.len()
    }

    pub fn contains_local_key(&self, key: &CollectionKey) -> bool {
        self.local_keys.contains(key)
    }

    /// Whether this cursor has nothing left to finalize.
    pub fn is_empty(&self) -> bool {
        self.local_keys.is_empty()
    }

    pub(crate) fn track(&mut self, key: CollectionKey) {
        self.local_keys.insert(key);
    }

    pub(crate) fn untrack(&mut self, key: &CollectionKey) -> bool {
        self.local_keys.shift_remove(key)
    }

    pub(crate) fn take_local_keys(&mut self) -> IndexSet<CollectionKey> {
        std::mem::take(&mut self.local_keys)
    }
}

impl fmt::Display for CollectionLoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionLoadContext<{}>", self.cursor)
    }
}

// ============================================================================
// CollectionLoader
// ============================================================================

/// Drives collection loading for one cursor.
///
/// Obtained from [`LoadSession::collection_load_context`]. Borrows the session
/// mutably, so only one loader is in use at a time; a nested cursor opened
/// while a collection completes gets its own loader from the session passed to
/// [`PersistentCollection::end_read`](crate::collection::PersistentCollection::end_read).
pub struct CollectionLoader<'s> {
    session: &'s mut LoadSession,
    cursor: CursorHandle,
}

impl<'s> CollectionLoader<'s> {
    pub(crate) fn new(session: &'s mut LoadSession, cursor: CursorHandle) -> Self {
        Self { session, cursor }
    }

    pub fn cursor(&self) -> CursorHandle {
        self.cursor
    }

    /// Number of collections this cursor is still populating.
    pub fn local_key_count(&self) -> usize {
        self.session
            .registry()
            .collection_context(self.cursor)
            .map_or(0, CollectionLoadContext::local_key_count)
    }

    // ========================================================================
    // Row routing
    // ========================================================================

    /// Find the collection that should receive a row's element for
    /// `persister`'s role and `owner_key`.
    ///
    /// Returns `None` when the row must be ignored: the collection is already
    /// loaded, another cursor is populating it, or its owner was already
    /// loaded by an earlier query. A returned collection is registered as being
    /// populated by this cursor until [`finalize`](Self::finalize).
    #[tracing::instrument(
        level = "trace",
        skip(self, persister),
        fields(cursor = %self.cursor, role = persister.role())
    )]
    pub fn resolve_target(
        &mut self,
        persister: &PersisterRef,
        owner_key: &Value,
    ) -> Option<CollectionRef> {
        let mode = self.session.settings().representation_mode;
        let key = CollectionKey::new(persister.role(), owner_key.clone(), mode);

        let routing = self
            .session
            .registry()
            .lookup(&key)
            .map(|entry| (entry.cursor(), entry.collection().clone()));
        match routing {
            Some((cursor, collection)) if cursor == self.cursor => {
                tracing::trace!(key = %key, "Collection already loading on this cursor");
                return Some(collection);
            }
            Some((cursor, _)) if self.session.registry().is_active(cursor) => {
                tracing::trace!(
                    key = %key,
                    loading_cursor = %cursor,
                    "Collection is being loaded by another cursor; ignoring row"
                );
                return None;
            }
            Some((cursor, _)) => {
                tracing::warn!(
                    key = %key,
                    loading_cursor = %cursor,
                    "Loading collection entry belongs to a retired cursor; discarding"
                );
                let registry = self.session.registry_mut();
                registry.record_warning();
                registry.unregister(&key);
            }
            None => {}
        }

        let collection = match self.session.persistence().get_collection(&key) {
            Some(existing) if existing.was_initialized() => {
                tracing::trace!(key = %key, "Collection already initialized; ignoring row");
                return None;
            }
            Some(existing) => {
                tracing::trace!(key = %key, "Collection not yet initialized; initializing");
                existing
            }
            None => {
                if self.owner_already_settled(persister.as_ref(), owner_key, mode) {
                    tracing::trace!(key = %key, "Owning entity already loaded; ignoring row");
                    return None;
                }
                tracing::trace!(key = %key, "Instantiating new collection");
                persister.instantiate(owner_key)
            }
        };

        collection.before_initialize(persister.as_ref(), None);
        collection.begin_read();

        let registry = self.session.registry_mut();
        registry.context_for(self.cursor).track(key.clone());
        registry.register(
            key,
            LoadingCollectionEntry::new(
                self.cursor,
                persister.clone(),
                owner_key.clone(),
                collection.clone(),
            ),
        );
        Some(collection)
    }

    fn owner_already_settled(
        &self,
        persister: &dyn CollectionPersister,
        owner_key: &Value,
        mode: RepresentationMode,
    ) -> bool {
        if !mode.skips_rows_for_settled_owner() {
            return false;
        }
        let pc = self.session.persistence();
        pc.get_collection_owner(owner_key, persister)
            .and_then(|owner| pc.get_entry(&owner))
            .is_some_and(|entry| !entry.is_loading())
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Finish every collection of `persister`'s role that this cursor
    /// populated.
    ///
    /// Collections of other roles stay registered for later calls. Once the
    /// cursor has nothing left to finalize it is retired.
    #[tracing::instrument(
        level = "debug",
        skip(self, persister),
        fields(cursor = %self.cursor, role = persister.role())
    )]
    pub fn finalize(&mut self, persister: &PersisterRef) {
        if self.local_key_count() == 0 {
            self.session.registry_mut().retire(self.cursor);
            return;
        }

        let finished = self.detach_finished(persister);
        self.end_loading_collections(persister, finished);

        let drained = self
            .session
            .registry()
            .collection_context(self.cursor)
            .is_none_or(CollectionLoadContext::is_empty);
        if drained {
            self.session.registry_mut().retire(self.cursor);
        }
    }

    /// Remove this cursor's finished collections of `persister`'s role from
    /// the registry, in discovery order.
    fn detach_finished(&mut self, persister: &PersisterRef) -> Vec<LoadingCollectionEntry> {
        let cursor = self.cursor;
        let keys: Vec<CollectionKey> = match self.session.registry().collection_context(cursor) {
            Some(ctx) => ctx.local_keys().cloned().collect(),
            None => return Vec::new(),
        };

        let mut finished = Vec::new();
        for key in keys {
            let belongs = self
                .session
                .registry()
                .lookup(&key)
                .map(|entry| entry.cursor() == cursor && entry.persister().role() == persister.role());

            let registry = self.session.registry_mut();
            match belongs {
                None => {
                    tracing::warn!(key = %key, "Locally loading collection has no registry entry");
                    registry.record_warning();
                    if let Some(ctx) = registry.collection_context_mut(cursor) {
                        ctx.untrack(&key);
                    }
                }
                Some(false) => {}
                Some(true) => {
                    if let Some(ctx) = registry.collection_context_mut(cursor) {
                        ctx.untrack(&key);
                    }
                    let Some(entry) = registry.unregister(&key) else {
                        continue;
                    };
                    if entry.collection().owner().is_unowned() {
                        // the owner is resolved later and adopts it from here
                        self.session
                            .persistence_mut()
                            .add_unowned_collection(key, entry.collection().clone());
                    }
                    finished.push(entry);
                }
            }
        }
        finished
    }

    fn end_loading_collections(
        &mut self,
        persister: &PersisterRef,
        finished: Vec<LoadingCollectionEntry>,
    ) {
        if finished.is_empty() {
            tracing::debug!(role = persister.role(), "No collections were found in result set");
            return;
        }

        let count = finished.len();
        tracing::debug!(
            role = persister.role(),
            count,
            "Collections were found in result set"
        );
        for entry in &finished {
            self.end_loading_collection(entry);
        }
        tracing::debug!(role = persister.role(), count, "Collections initialized");
    }

    fn end_loading_collection(&mut self, entry: &LoadingCollectionEntry) {
        let collection = entry.collection();
        let persister = entry.persister();
        tracing::trace!(entry = %entry, "Ending loading collection");

        let had_queued_operations = collection.end_read(self.session);

        let settings = self.session.settings().clone();
        if persister.requires_holder(settings.representation_mode) {
            self.session
                .persistence_mut()
                .add_collection_holder(collection.clone());
        }

        let pc = self.session.persistence_mut();
        let forced_reinitialization = match pc.get_collection_entry(collection) {
            Some(ce) => {
                ce.post_initialize();
                ce.is_forced_reinitialization()
            }
            None => pc
                .add_initialized_collection(
                    CollectionKey::new(
                        persister.role(),
                        entry.key().clone(),
                        settings.representation_mode,
                    ),
                    collection,
                )
                .is_forced_reinitialization(),
        };

        let add_to_cache = !had_queued_operations
            && persister.has_cache()
            && settings.cache_mode.is_put_enabled()
            && !forced_reinitialization;
        if add_to_cache {
            self.add_collection_to_cache(entry);
        } else if persister.has_cache() {
            tracing::trace!(
                had_queued_operations,
                forced_reinitialization,
                cache_mode = ?settings.cache_mode,
                "Not caching loaded collection"
            );
        }

        self.session.statistics_mut().collection_loaded(persister.role());
        tracing::trace!(entry = %entry, "Collection fully initialized");
    }

    // ========================================================================
    // Second-level cache
    // ========================================================================

    fn add_collection_to_cache(&mut self, entry: &LoadingCollectionEntry) {
        let persister = entry.persister();
        let Some(cache) = persister.cache_access() else {
            return;
        };
        tracing::debug!(
            role = persister.role(),
            owner_key = %entry.key(),
            region = cache.region_name(),
            "Caching collection"
        );

        let filters = self.session.enabled_filters();
        if !filters.is_empty() && persister.is_affected_by_filters(filters) {
            tracing::debug!(
                role = persister.role(),
                "Refusing to add to cache due to enabled filters"
            );
            return;
        }

        let version = if persister.is_versioned() {
            match self.resolve_cache_owner(entry) {
                Some(owner) => self
                    .session
                    .persistence()
                    .get_entry(&owner)
                    .and_then(|owner_entry| owner_entry.version),
                None => {
                    tracing::warn!(
                        role = persister.role(),
                        owner_key = %entry.key(),
                        "Unable to resolve owner of loading collection for second level caching"
                    );
                    self.session.registry_mut().record_warning();
                    return;
                }
            }
        } else {
            None
        };

        let structured =
            match CollectionCacheEntry::new(entry.collection().as_ref(), persister.as_ref())
                .structure()
            {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(role = persister.role(), error = %e, "Could not structure cache entry");
                    return;
                }
            };

        let cache_key = CacheKey::new(persister.role(), entry.key().clone());
        let put = cache.put_from_load(
            &cache_key,
            structured,
            self.session.timestamp(),
            version.as_ref(),
            self.session.settings().effective_minimal_puts(),
        );
        match put {
            Ok(true) => {
                self.session
                    .statistics_mut()
                    .second_level_cache_put(cache.region_name());
            }
            Ok(false) => {
                tracing::debug!(key = %cache_key, region = cache.region_name(), "Cache put skipped");
            }
            Err(e) => {
                tracing::warn!(
                    key = %cache_key,
                    region = e.region().unwrap_or(cache.region_name()),
                    transient = e.is_transient(),
                    error = %e,
                    "Second-level cache put failed"
                );
            }
        }
    }

    /// The owner whose version stamps a cache entry: the object cache's owner
    /// for the key, else the owner the collection itself points at.
    fn resolve_cache_owner(&self, entry: &LoadingCollectionEntry) -> Option<EntityKey> {
        self.session
            .persistence()
            .get_collection_owner(entry.key(), entry.persister().as_ref())
            .or_else(|| entry.collection().owner().entity().cloned())
    }
}

impl fmt::Debug for CollectionLoader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionLoader")
            .field("cursor", &self.cursor)
            .field("local_keys", &self.local_key_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheRegion;
    use crate::collection::{CollectionOwner, PersistentBag, PersistentCollection};
    use crate::persistence::{EntityEntry, PersistenceContext, StatefulPersistenceContext};
    use crate::persister::BasicCollectionPersister;
    use crate::settings::LoadSettings;
    use ormload_core::CacheMode;
    use serde_json::json;
    use std::any::Any;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn items() -> PersisterRef {
        BasicCollectionPersister::new("Order.items", "Order").into_ref()
    }

    fn typed_key(owner: i64) -> CollectionKey {
        CollectionKey::new("Order.items", Value::BigInt(owner), RepresentationMode::Typed)
    }

    fn bag(collection: &CollectionRef) -> &PersistentBag {
        collection.downcast_ref::<PersistentBag>().unwrap()
    }

    /// A bag that runs a callback against the session when its read ends.
    struct HookedBag {
        inner: PersistentBag,
        hook: RefCell<Option<Box<dyn FnOnce(&mut LoadSession)>>>,
    }

    impl HookedBag {
        fn new(key: i64, hook: impl FnOnce(&mut LoadSession) + 'static) -> Self {
            Self {
                inner: PersistentBag::new("Order.items", Value::BigInt(key))
                    .with_owner(EntityKey::new("Order", Value::BigInt(key))),
                hook: RefCell::new(Some(Box::new(hook))),
            }
        }
    }

    impl PersistentCollection for HookedBag {
        fn owner(&self) -> CollectionOwner {
            self.inner.owner()
        }

        fn was_initialized(&self) -> bool {
            self.inner.was_initialized()
        }

        fn is_initializing(&self) -> bool {
            self.inner.is_initializing()
        }

        fn before_initialize(
            &self,
            persister: &dyn CollectionPersister,
            anticipated_size: Option<usize>,
        ) {
            self.inner.before_initialize(persister, anticipated_size);
        }

        fn begin_read(&self) {
            self.inner.begin_read();
        }

        fn end_read(&self, session: &mut LoadSession) -> bool {
            let had_queued = self.inner.end_read(session);
            let hook = self.hook.borrow_mut().take();
            if let Some(hook) = hook {
                hook(session);
            }
            had_queued
        }

        fn disassemble(&self, persister: &dyn CollectionPersister) -> serde_json::Value {
            self.inner.disassemble(persister)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_local_keys_keep_discovery_order() {
        let mut ctx = CollectionLoadContext::new(CursorHandle::new(1));
        for owner in [3, 1, 2] {
            ctx.track(CollectionKey::new(
                "Order.items",
                Value::BigInt(owner),
                RepresentationMode::Typed,
            ));
        }
        let owners: Vec<_> = ctx.local_keys().map(|k| k.owner_key().clone()).collect();
        assert_eq!(owners, vec![Value::BigInt(3), Value::BigInt(1), Value::BigInt(2)]);

        let middle = CollectionKey::new("Order.items", Value::BigInt(1), RepresentationMode::Typed);
        assert!(ctx.untrack(&middle));
        assert!(!ctx.contains_local_key(&middle));
        assert_eq!(ctx.take_local_keys().len(), 2);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_resolve_target_instantiates_and_reuses() {
        let mut session = LoadSession::new(StatefulPersistenceContext::default());
        let persister = items();
        let cursor = session.open_cursor();

        let mut loader = session.collection_load_context(cursor);
        let first = loader.resolve_target(&persister, &Value::BigInt(1)).unwrap();
        let second = loader.resolve_target(&persister, &Value::BigInt(1)).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.is_initializing());
        assert_eq!(loader.local_key_count(), 1);
        assert_eq!(session.registry().registered_count(), 1);
    }

    #[test]
    fn test_resolve_target_skips_initialized_collection() {
        let persister = items();
        let mut pc = StatefulPersistenceContext::default();
        let loaded = PersistentBag::new("Order.items", Value::BigInt(1)).into_ref();
        let mut scratch = LoadSession::new(StatefulPersistenceContext::default());
        loaded.begin_read();
        loaded.end_read(&mut scratch);
        pc.add_initialized_collection(typed_key(1), &loaded);
        let mut session = LoadSession::new(pc);

        let cursor = session.open_cursor();
        let mut loader = session.collection_load_context(cursor);
        assert!(loader.resolve_target(&persister, &Value::BigInt(1)).is_none());
        assert_eq!(loader.local_key_count(), 0);
    }

    #[test]
    fn test_resolve_target_adopts_uninitialized_collection() {
        let persister = items();
        let mut pc = StatefulPersistenceContext::default();
        let lazy = PersistentBag::new("Order.items", Value::BigInt(1)).into_ref();
        pc.add_uninitialized_collection(typed_key(1), lazy.clone());
        let mut session = LoadSession::new(pc);

        let cursor = session.open_cursor();
        let mut loader = session.collection_load_context(cursor);
        let target = loader.resolve_target(&persister, &Value::BigInt(1)).unwrap();
        assert!(Rc::ptr_eq(&target, &lazy));
    }

    #[test]
    fn test_resolve_target_skips_settled_owner() {
        let persister = items();
        let mut pc = StatefulPersistenceContext::default();
        pc.add_entity(
            EntityKey::new("Order", Value::BigInt(1)),
            EntityEntry::managed(None),
        );
        pc.add_entity(EntityKey::new("Order", Value::BigInt(2)), EntityEntry::loading());
        let mut session = LoadSession::new(pc);

        let cursor = session.open_cursor();
        let mut loader = session.collection_load_context(cursor);
        assert!(loader.resolve_target(&persister, &Value::BigInt(1)).is_none());
        assert!(loader.resolve_target(&persister, &Value::BigInt(2)).is_some());
    }

    #[test]
    fn test_finalize_initializes_and_retires() {
        let mut session = LoadSession::new(StatefulPersistenceContext::default());
        let persister = items();
        let cursor = session.open_cursor();

        let mut loader = session.collection_load_context(cursor);
        let target = loader.resolve_target(&persister, &Value::BigInt(7)).unwrap();
        bag(&target).read_element(json!("widget"));
        loader.finalize(&persister);

        assert!(target.was_initialized());
        assert_eq!(bag(&target).elements(), vec![json!("widget")]);
        assert!(!session.registry().has_loading_collection_entries());
        assert!(!session.registry().has_registered_loading_collection_entries());
        assert_eq!(session.registry().consistency_warnings(), 0);
    }

    #[test]
    fn test_finalize_without_rows_retires_quietly() {
        let mut session = LoadSession::new(StatefulPersistenceContext::default());
        let cursor = session.open_cursor();
        session.collection_load_context(cursor).finalize(&items());
        assert!(session.registry().collection_context(cursor).is_none());
        assert_eq!(session.registry().consistency_warnings(), 0);
    }

    #[test]
    fn test_finalize_leaves_other_roles_registered() {
        let mut session = LoadSession::new(StatefulPersistenceContext::default());
        let items = items();
        let tags = BasicCollectionPersister::new("Order.tags", "Order").into_ref();
        let cursor = session.open_cursor();

        let mut loader = session.collection_load_context(cursor);
        loader.resolve_target(&items, &Value::BigInt(1));
        let pending = loader.resolve_target(&tags, &Value::BigInt(1)).unwrap();
        loader.finalize(&items);
        assert_eq!(loader.local_key_count(), 1);
        assert!(!pending.was_initialized());

        loader.finalize(&tags);
        assert!(pending.was_initialized());
        assert!(session.registry().collection_context(cursor).is_none());
    }

    #[test]
    fn test_finalize_puts_into_cache() {
        let region = Rc::new(InMemoryCacheRegion::new("items"));
        let persister = BasicCollectionPersister::new("Order.items", "Order")
            .cached_in(region.clone())
            .into_ref();
        let mut session = LoadSession::with_settings(
            StatefulPersistenceContext::default(),
            LoadSettings::new().statistics_enabled(true),
        );
        session.set_timestamp(42);

        let cursor = session.open_cursor();
        let mut loader = session.collection_load_context(cursor);
        let target = loader.resolve_target(&persister, &Value::BigInt(1)).unwrap();
        bag(&target).read_element(json!(1));
        loader.finalize(&persister);

        let cached = region
            .get(&CacheKey::new("Order.items", Value::BigInt(1)))
            .unwrap();
        assert_eq!(cached.timestamp, 42);
        assert_eq!(session.statistics().cache_put_count("items"), 1);
        assert_eq!(session.statistics().collection_load_count("Order.items"), 1);
    }

    #[test]
    fn test_cache_mode_without_put_skips_cache() {
        let region = Rc::new(InMemoryCacheRegion::new("items"));
        let persister = BasicCollectionPersister::new("Order.items", "Order")
            .cached_in(region.clone())
            .into_ref();
        let mut session = LoadSession::with_settings(
            StatefulPersistenceContext::default(),
            LoadSettings::new().cache_mode(CacheMode::Get),
        );

        let cursor = session.open_cursor();
        let mut loader = session.collection_load_context(cursor);
        loader.resolve_target(&persister, &Value::BigInt(1));
        loader.finalize(&persister);
        assert!(region.is_empty());
    }

    #[test]
    fn test_nested_load_during_end_read() {
        let persister = items();
        let nested_persister = persister.clone();
        let nested_seen = Rc::new(Cell::new(false));
        let seen = nested_seen.clone();

        let hooked: CollectionRef = Rc::new(HookedBag::new(1, move |session| {
            let cursor = session.open_cursor();
            let mut loader = session.collection_load_context(cursor);
            let target = loader
                .resolve_target(&nested_persister, &Value::BigInt(2))
                .unwrap();
            loader.finalize(&nested_persister);
            seen.set(target.was_initialized());
        }));

        let mut pc = StatefulPersistenceContext::default();
        pc.add_uninitialized_collection(typed_key(1), hooked.clone());
        let mut session = LoadSession::new(pc);

        let cursor = session.open_cursor();
        let mut loader = session.collection_load_context(cursor);
        let target = loader.resolve_target(&persister, &Value::BigInt(1)).unwrap();
        assert!(Rc::ptr_eq(&target, &hooked));
        loader.finalize(&persister);

        assert!(nested_seen.get());
        assert!(hooked.was_initialized());
        assert!(!session.registry().has_loading_collection_entries());
        assert_eq!(session.registry().consistency_warnings(), 0);
    }

    #[test]
    fn test_finalize_survives_missing_registry_entry() {
        let mut session = LoadSession::new(StatefulPersistenceContext::default());
        let persister = items();
        let cursor = session.open_cursor();

        let mut loader = session.collection_load_context(cursor);
        let lost = loader.resolve_target(&persister, &Value::BigInt(1)).unwrap();
        let kept = loader.resolve_target(&persister, &Value::BigInt(2)).unwrap();
        assert!(session.registry_mut().unregister(&typed_key(1)).is_some());

        session.collection_load_context(cursor).finalize(&persister);

        assert!(!lost.was_initialized());
        assert!(kept.was_initialized());
        assert!(session.registry().collection_context(cursor).is_none());
        assert_eq!(session.registry().registered_count(), 0);
        assert_eq!(session.registry().consistency_warnings(), 1);
    }

    #[test]
    fn test_resolve_target_discards_entry_of_retired_cursor() {
        let mut session = LoadSession::new(StatefulPersistenceContext::default());
        let persister = items();
        let retired = session.open_cursor();
        session.retire(retired);

        let stale = PersistentBag::new("Order.items", Value::BigInt(1)).into_ref();
        session.registry_mut().register(
            typed_key(1),
            LoadingCollectionEntry::new(retired, persister.clone(), Value::BigInt(1), stale.clone()),
        );

        let cursor = session.open_cursor();
        let mut loader = session.collection_load_context(cursor);
        let target = loader.resolve_target(&persister, &Value::BigInt(1)).unwrap();
        assert!(!Rc::ptr_eq(&target, &stale));
        loader.finalize(&persister);

        assert!(target.was_initialized());
        assert!(!stale.was_initialized());
        assert!(!session.registry().has_registered_loading_collection_entries());
        assert_eq!(session.registry().consistency_warnings(), 1);
    }

    #[test]
    fn test_composite_owner_key() {
        let mut session = LoadSession::new(StatefulPersistenceContext::default());
        let persister = items();
        let owner_key = Value::Composite(vec![Value::BigInt(1), Value::from("EU")]);
        let cursor = session.open_cursor();

        let mut loader = session.collection_load_context(cursor);
        let target = loader.resolve_target(&persister, &owner_key).unwrap();
        let other = Value::Composite(vec![Value::BigInt(1), Value::from("US")]);
        assert!(!Rc::ptr_eq(
            &target,
            &loader.resolve_target(&persister, &other).unwrap()
        ));
        loader.finalize(&persister);

        let loaded = CollectionKey::new("Order.items", owner_key, RepresentationMode::Typed);
        let found = session.persistence().get_collection(&loaded).unwrap();
        assert!(Rc::ptr_eq(&found, &target));
    }
}
