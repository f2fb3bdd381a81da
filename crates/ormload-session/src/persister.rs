//! Collection type descriptors.

use crate::cache::CollectionCacheAccess;
use crate::collection::{CollectionRef, PersistentBag};
use ormload_core::{RepresentationMode, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Shared reference to a collection persister.
pub type PersisterRef = Rc<dyn CollectionPersister>;

/// Describes one mapped collection role and how its instances are built,
/// cached and filtered.
pub trait CollectionPersister {
    /// The role identifier, unique per mapped collection attribute.
    fn role(&self) -> &str;

    /// Name of the entity that owns collections of this role.
    fn owner_entity_name(&self) -> &str;

    /// Create a new, empty, not yet loaded collection for an owner.
    fn instantiate(&self, owner_key: &Value) -> CollectionRef;

    /// The second-level cache region for this role, if the role is cacheable.
    fn cache_access(&self) -> Option<&dyn CollectionCacheAccess> {
        None
    }

    /// Whether the role is cacheable.
    fn has_cache(&self) -> bool {
        self.cache_access().is_some()
    }

    /// Whether the owner is versioned, so cached state must carry its version.
    fn is_versioned(&self) -> bool {
        false
    }

    /// Whether instances must be registered as holders (e.g. arrays, whose
    /// in-memory value is not the persistent wrapper itself).
    fn requires_holder(&self, _mode: RepresentationMode) -> bool {
        false
    }

    /// Whether any of the enabled session filters restrict this role.
    fn is_affected_by_filters(&self, _enabled_filters: &BTreeSet<String>) -> bool {
        false
    }
}

impl fmt::Debug for dyn CollectionPersister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionPersister")
            .field("role", &self.role())
            .finish_non_exhaustive()
    }
}

/// A configurable persister whose instances are [`PersistentBag`]s.
pub struct BasicCollectionPersister {
    role: String,
    owner_entity_name: String,
    cache: Option<Rc<dyn CollectionCacheAccess>>,
    versioned: bool,
    holder: bool,
    filters: BTreeSet<String>,
}

impl BasicCollectionPersister {
    /// Create a persister for a role owned by `owner_entity_name`.
    pub fn new(role: impl Into<String>, owner_entity_name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            owner_entity_name: owner_entity_name.into(),
            cache: None,
            versioned: false,
            holder: false,
            filters: BTreeSet::new(),
        }
    }

    /// Cache the role in a region (builder pattern).
    #[must_use]
    pub fn cached_in(mut self, region: Rc<dyn CollectionCacheAccess>) -> Self {
        self.cache = Some(region);
        self
    }

    /// Mark the owner as versioned (builder pattern).
    #[must_use]
    pub fn versioned(mut self, value: bool) -> Self {
        self.versioned = value;
        self
    }

    /// Require holder registration (builder pattern).
    #[must_use]
    pub fn with_holder(mut self, value: bool) -> Self {
        self.holder = value;
        self
    }

    /// Declare a session filter that restricts this role (builder pattern).
    #[must_use]
    pub fn filtered_by(mut self, filter: impl Into<String>) -> Self {
        self.filters.insert(filter.into());
        self
    }

    /// Wrap the persister in a shared reference.
    pub fn into_ref(self) -> PersisterRef {
        Rc::new(self)
    }
}

impl CollectionPersister for BasicCollectionPersister {
    fn role(&self) -> &str {
        &self.role
    }

    fn owner_entity_name(&self) -> &str {
        &self.owner_entity_name
    }

    fn instantiate(&self, owner_key: &Value) -> CollectionRef {
        PersistentBag::new(self.role.clone(), owner_key.clone()).into_ref()
    }

    fn cache_access(&self) -> Option<&dyn CollectionCacheAccess> {
        self.cache.as_deref()
    }

    fn is_versioned(&self) -> bool {
        self.versioned
    }

    fn requires_holder(&self, _mode: RepresentationMode) -> bool {
        self.holder
    }

    fn is_affected_by_filters(&self, enabled_filters: &BTreeSet<String>) -> bool {
        !self.filters.is_disjoint(enabled_filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheRegion;

    #[test]
    fn test_basic_persister_defaults() {
        let persister = BasicCollectionPersister::new("Order.items", "Order");
        assert_eq!(persister.role(), "Order.items");
        assert_eq!(persister.owner_entity_name(), "Order");
        assert!(!persister.has_cache());
        assert!(!persister.is_versioned());
        assert!(!persister.requires_holder(RepresentationMode::Typed));
    }

    #[test]
    fn test_basic_persister_instantiates_unloaded_bag() {
        let persister = BasicCollectionPersister::new("Order.items", "Order");
        let collection = persister.instantiate(&Value::BigInt(5));
        assert!(!collection.was_initialized());
        let bag = collection.downcast_ref::<PersistentBag>().unwrap();
        assert_eq!(bag.key(), &Value::BigInt(5));
        assert_eq!(bag.role(), "Order.items");
    }

    #[test]
    fn test_filter_matching() {
        let persister = BasicCollectionPersister::new("Order.items", "Order").filtered_by("active");
        let mut enabled = BTreeSet::new();
        assert!(!persister.is_affected_by_filters(&enabled));
        enabled.insert("tenant".to_string());
        assert!(!persister.is_affected_by_filters(&enabled));
        enabled.insert("active".to_string());
        assert!(persister.is_affected_by_filters(&enabled));
    }

    #[test]
    fn test_cached_persister_exposes_region() {
        let region = Rc::new(InMemoryCacheRegion::new("order-items"));
        let persister = BasicCollectionPersister::new("Order.items", "Order").cached_in(region);
        assert!(persister.has_cache());
        assert_eq!(
            persister.cache_access().map(|c| c.region_name()),
            Some("order-items")
        );
    }
}
