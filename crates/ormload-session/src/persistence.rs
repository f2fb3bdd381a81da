//! The object cache ("persistence context") as seen by the loading layer.
//!
//! The loading layer consults the object cache to find collections and owners
//! that are already managed, and hands finished collections back to it. The
//! [`PersistenceContext`] trait is the seam; [`StatefulPersistenceContext`] is
//! an in-memory implementation suitable for embedding and tests.

use crate::collection::{CollectionId, CollectionRef};
use crate::key::{CollectionKey, EntityKey};
use crate::persister::CollectionPersister;
use ormload_core::Value;
use std::any::Any;
use std::collections::HashMap;

/// Lifecycle status of a managed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    /// Fully loaded and managed.
    Managed,
    /// Loaded, changes are not tracked.
    ReadOnly,
    /// Scheduled for deletion.
    Deleted,
    /// Deleted and flushed.
    Gone,
    /// Being hydrated from result rows.
    Loading,
    /// Being saved.
    Saving,
}

/// The object cache's record of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEntry {
    pub status: EntityStatus,
    pub version: Option<Value>,
}

impl EntityEntry {
    /// A managed entity with an optional version.
    pub fn managed(version: Option<Value>) -> Self {
        Self {
            status: EntityStatus::Managed,
            version,
        }
    }

    /// An entity still being hydrated.
    pub fn loading() -> Self {
        Self {
            status: EntityStatus::Loading,
            version: None,
        }
    }

    /// Whether the entity is still being hydrated.
    pub fn is_loading(&self) -> bool {
        self.status == EntityStatus::Loading
    }
}

/// The object cache's tracking record of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    role: String,
    key: Value,
    initialized: bool,
    forced_reinitialization: bool,
}

impl CollectionEntry {
    /// A tracking entry for a collection of `role` owned by `key`.
    pub fn new(role: impl Into<String>, key: Value, initialized: bool) -> Self {
        Self {
            role: role.into(),
            key,
            initialized,
            forced_reinitialization: false,
        }
    }

    /// The collection role.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The owner key.
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// Whether the collection is loaded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Mark the collection loaded.
    pub fn post_initialize(&mut self) {
        self.initialized = true;
    }

    /// Whether this load is a forced re-initialization issued by a flush.
    /// Such loads must not populate the second-level cache.
    pub fn is_forced_reinitialization(&self) -> bool {
        self.forced_reinitialization
    }

    /// Flag (or clear) a flush-driven re-initialization.
    pub fn set_forced_reinitialization(&mut self, value: bool) {
        self.forced_reinitialization = value;
    }
}

/// Object cache operations used while loading collections.
pub trait PersistenceContext: Any {
    /// The collection registered for `key`, loaded or not.
    fn get_collection(&self, key: &CollectionKey) -> Option<CollectionRef>;

    /// The managed owner of the collection of `persister`'s role for `owner_key`.
    fn get_collection_owner(
        &self,
        owner_key: &Value,
        persister: &dyn CollectionPersister,
    ) -> Option<EntityKey>;

    /// The record for a managed entity.
    fn get_entry(&self, entity: &EntityKey) -> Option<EntityEntry>;

    /// Park a loaded collection whose owner is not yet known.
    fn add_unowned_collection(&mut self, key: CollectionKey, collection: CollectionRef);

    /// Take a parked collection so a newly resolved owner can adopt it.
    fn use_unowned_collection(&mut self, key: &CollectionKey) -> Option<CollectionRef>;

    /// Start tracking a freshly loaded collection under `key`.
    ///
    /// `key` is the one the loading layer resolved the collection by, so later
    /// lookups in the same representation mode find this instance.
    fn add_initialized_collection(
        &mut self,
        key: CollectionKey,
        collection: &CollectionRef,
    ) -> &mut CollectionEntry;

    /// The tracking record of a collection instance.
    fn get_collection_entry(&mut self, collection: &CollectionRef) -> Option<&mut CollectionEntry>;

    /// Register a collection whose in-memory value is held by a wrapper.
    fn add_collection_holder(&mut self, collection: CollectionRef);

    /// Access as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn PersistenceContext + '_ {
    /// Downcast to a concrete object cache type.
    pub fn downcast_ref<T: PersistenceContext>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

struct TrackedCollection {
    collection: CollectionRef,
    entry: CollectionEntry,
}

/// In-memory object cache.
///
/// Collections are keyed by the [`CollectionKey`] they are registered under,
/// representation mode included.
#[derive(Default)]
pub struct StatefulPersistenceContext {
    entities: HashMap<EntityKey, EntityEntry>,
    collections_by_key: HashMap<CollectionKey, CollectionRef>,
    collection_entries: HashMap<CollectionId, TrackedCollection>,
    unowned_collections: HashMap<CollectionKey, CollectionRef>,
    holders: HashMap<CollectionId, CollectionRef>,
}

impl StatefulPersistenceContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an entity.
    pub fn add_entity(&mut self, key: EntityKey, entry: EntityEntry) {
        self.entities.insert(key, entry);
    }

    /// Change an entity's status. Returns `false` if the entity is unknown.
    pub fn set_entity_status(&mut self, key: &EntityKey, status: EntityStatus) -> bool {
        match self.entities.get_mut(key) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    /// Track a collection that has not been loaded yet (e.g. a lazy
    /// collection wired into an owner during hydration).
    pub fn add_uninitialized_collection(&mut self, key: CollectionKey, collection: CollectionRef) {
        self.add_collection(key, collection, false);
    }

    /// Number of tracked collections.
    pub fn collection_count(&self) -> usize {
        self.collection_entries.len()
    }

    /// Number of parked unowned collections.
    pub fn unowned_count(&self) -> usize {
        self.unowned_collections.len()
    }

    /// Whether a collection is registered as a holder.
    pub fn contains_holder(&self, collection: &CollectionRef) -> bool {
        self.holders.contains_key(&CollectionId::of(collection))
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.collections_by_key.clear();
        self.collection_entries.clear();
        self.unowned_collections.clear();
        self.holders.clear();
    }

    fn add_collection(
        &mut self,
        key: CollectionKey,
        collection: CollectionRef,
        initialized: bool,
    ) -> &mut CollectionEntry {
        let entry = CollectionEntry::new(key.role(), key.owner_key().clone(), initialized);
        if let Some(previous) = self.collections_by_key.get(&key) {
            if CollectionId::of(previous) != CollectionId::of(&collection) {
                tracing::warn!(
                    key = %key,
                    "Replacing a different collection instance registered for the same key"
                );
                self.collection_entries.remove(&CollectionId::of(previous));
            }
        }
        self.collections_by_key.insert(key, collection.clone());

        let tracked = self
            .collection_entries
            .entry(CollectionId::of(&collection))
            .or_insert_with(|| TrackedCollection { collection, entry });
        &mut tracked.entry
    }
}

impl PersistenceContext for StatefulPersistenceContext {
    fn get_collection(&self, key: &CollectionKey) -> Option<CollectionRef> {
        self.collections_by_key.get(key).cloned()
    }

    fn get_collection_owner(
        &self,
        owner_key: &Value,
        persister: &dyn CollectionPersister,
    ) -> Option<EntityKey> {
        let key = EntityKey::new(persister.owner_entity_name(), owner_key.clone());
        self.entities.contains_key(&key).then_some(key)
    }

    fn get_entry(&self, entity: &EntityKey) -> Option<EntityEntry> {
        self.entities.get(entity).cloned()
    }

    fn add_unowned_collection(&mut self, key: CollectionKey, collection: CollectionRef) {
        self.unowned_collections.insert(key, collection);
    }

    fn use_unowned_collection(&mut self, key: &CollectionKey) -> Option<CollectionRef> {
        self.unowned_collections.remove(key)
    }

    fn add_initialized_collection(
        &mut self,
        key: CollectionKey,
        collection: &CollectionRef,
    ) -> &mut CollectionEntry {
        let entry = self.add_collection(key, collection.clone(), true);
        entry.post_initialize();
        entry
    }

    fn get_collection_entry(&mut self, collection: &CollectionRef) -> Option<&mut CollectionEntry> {
        self.collection_entries
            .get_mut(&CollectionId::of(collection))
            .map(|tracked| &mut tracked.entry)
    }

    fn add_collection_holder(&mut self, collection: CollectionRef) {
        self.holders.insert(CollectionId::of(&collection), collection);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::PersistentBag;
    use crate::persister::BasicCollectionPersister;
    use ormload_core::RepresentationMode;

    fn persister() -> BasicCollectionPersister {
        BasicCollectionPersister::new("Order.items", "Order")
    }

    fn key(owner: i64, mode: RepresentationMode) -> CollectionKey {
        CollectionKey::new("Order.items", Value::BigInt(owner), mode)
    }

    #[test]
    fn test_collection_owner_lookup() {
        let mut pc = StatefulPersistenceContext::default();
        let owner = EntityKey::new("Order", Value::BigInt(1));
        pc.add_entity(owner.clone(), EntityEntry::managed(Some(Value::Int(2))));

        assert_eq!(
            pc.get_collection_owner(&Value::BigInt(1), &persister()),
            Some(owner.clone())
        );
        assert_eq!(pc.get_collection_owner(&Value::BigInt(2), &persister()), None);
        assert_eq!(pc.get_entry(&owner).unwrap().version, Some(Value::Int(2)));

        assert!(pc.set_entity_status(&owner, EntityStatus::Loading));
        assert!(pc.get_entry(&owner).unwrap().is_loading());
    }

    #[test]
    fn test_uninitialized_then_initialized_collection() {
        let mut pc = StatefulPersistenceContext::default();
        let bag = PersistentBag::new("Order.items", Value::BigInt(1)).into_ref();
        pc.add_uninitialized_collection(key(1, RepresentationMode::Typed), bag.clone());

        assert!(pc.get_collection(&key(1, RepresentationMode::Typed)).is_some());
        assert!(!pc.get_collection_entry(&bag).unwrap().is_initialized());

        pc.get_collection_entry(&bag).unwrap().post_initialize();
        assert!(pc.get_collection_entry(&bag).unwrap().is_initialized());
        assert_eq!(pc.collection_count(), 1);
    }

    #[test]
    fn test_add_initialized_collection_registers_by_key() {
        let mut pc = StatefulPersistenceContext::default();
        let bag = PersistentBag::new("Order.items", Value::BigInt(9)).into_ref();

        let entry = pc.add_initialized_collection(key(9, RepresentationMode::Typed), &bag);
        assert!(entry.is_initialized());
        assert_eq!(entry.role(), "Order.items");
        assert_eq!(entry.key(), &Value::BigInt(9));

        let found = pc.get_collection(&key(9, RepresentationMode::Typed)).unwrap();
        assert_eq!(CollectionId::of(&found), CollectionId::of(&bag));
    }

    #[test]
    fn test_collections_are_found_in_the_mode_they_were_added_in() {
        let mut pc = StatefulPersistenceContext::new();
        let bag = PersistentBag::new("Order.items", Value::BigInt(1)).into_ref();
        pc.add_initialized_collection(key(1, RepresentationMode::Document), &bag);

        let found = pc.get_collection(&key(1, RepresentationMode::Document)).unwrap();
        assert_eq!(CollectionId::of(&found), CollectionId::of(&bag));
        assert!(pc.get_collection(&key(1, RepresentationMode::Typed)).is_none());
    }

    #[test]
    fn test_unowned_collection_hand_off() {
        let mut pc = StatefulPersistenceContext::default();
        let bag = PersistentBag::new("Order.items", Value::BigInt(1)).into_ref();
        let unowned = key(1, RepresentationMode::Typed);

        pc.add_unowned_collection(unowned.clone(), bag);
        assert_eq!(pc.unowned_count(), 1);
        assert!(pc.use_unowned_collection(&unowned).is_some());
        assert!(pc.use_unowned_collection(&unowned).is_none());
    }

    #[test]
    fn test_holders() {
        let mut pc = StatefulPersistenceContext::default();
        let bag = PersistentBag::new("Order.items", Value::BigInt(1)).into_ref();
        assert!(!pc.contains_holder(&bag));
        pc.add_collection_holder(bag.clone());
        assert!(pc.contains_holder(&bag));

        pc.clear();
        assert!(!pc.contains_holder(&bag));
    }
}
