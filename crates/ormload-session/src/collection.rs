//! Persistent collection instances and their population protocol.
//!
//! A persistent collection is shared between the object cache, its owning
//! entity and, while it is being populated, the loading registry. Instances are
//! therefore handed around as [`CollectionRef`] and mutate through `&self`.
//!
//! Population follows a fixed protocol driven by the loading layer:
//!
//! 1. [`PersistentCollection::before_initialize`] with a size hint (`None` when unknown)
//! 2. [`PersistentCollection::begin_read`], after which rows are read into the instance
//! 3. [`PersistentCollection::end_read`], which applies operations queued while the
//!    collection was not yet loaded and may itself trigger further loading

use crate::key::EntityKey;
use crate::persister::CollectionPersister;
use crate::session::LoadSession;
use ormload_core::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared reference to a persistent collection.
pub type CollectionRef = Rc<dyn PersistentCollection>;

/// Who a collection belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOwner {
    /// Attached to an entity in the object cache.
    Owned(EntityKey),
    /// The owner is still being resolved; the collection waits in the object
    /// cache's unowned set until it is attached.
    Unowned,
}

impl CollectionOwner {
    /// Whether the owner is not yet known.
    pub fn is_unowned(&self) -> bool {
        matches!(self, CollectionOwner::Unowned)
    }

    /// The owning entity, if attached.
    pub fn entity(&self) -> Option<&EntityKey> {
        match self {
            CollectionOwner::Owned(key) => Some(key),
            CollectionOwner::Unowned => None,
        }
    }
}

/// A collection whose contents are loaded from result rows.
pub trait PersistentCollection: Any {
    /// The collection's owner.
    fn owner(&self) -> CollectionOwner;

    /// Whether the collection has been fully loaded.
    fn was_initialized(&self) -> bool;

    /// Whether rows are currently being read into the collection.
    fn is_initializing(&self) -> bool;

    /// Prepare for population. `anticipated_size` is `None` when the row count
    /// is unknown.
    fn before_initialize(
        &self,
        persister: &dyn CollectionPersister,
        anticipated_size: Option<usize>,
    );

    /// Start accepting rows.
    fn begin_read(&self);

    /// Stop accepting rows and mark the collection loaded.
    ///
    /// Returns `true` if operations were queued against the collection while it
    /// was not yet loaded. The session is passed so that completing the read
    /// can load further collections or entities.
    fn end_read(&self, session: &mut LoadSession) -> bool;

    /// Disassemble the loaded state into a cacheable form.
    fn disassemble(&self, persister: &dyn CollectionPersister) -> serde_json::Value;

    /// Access as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn PersistentCollection {
    /// Downcast to a concrete collection type.
    pub fn downcast_ref<T: PersistentCollection>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Reference identity of a collection instance.
///
/// Two `CollectionRef`s have the same id only if they point at the same
/// instance. Only meaningful while the instance is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionId(usize);

impl CollectionId {
    /// Get the id of a collection reference.
    pub fn of(collection: &CollectionRef) -> Self {
        Self(Rc::as_ptr(collection).cast::<()>().addr())
    }
}

// ============================================================================
// PersistentBag
// ============================================================================

/// An unordered collection that allows duplicates.
///
/// Elements are held in their structured (`serde_json::Value`) form. Writes
/// made through [`PersistentBag::add`] before the bag is loaded are queued and
/// applied when the read ends.
#[derive(Debug)]
pub struct PersistentBag {
    role: String,
    key: Value,
    owner: RefCell<CollectionOwner>,
    elements: RefCell<Vec<serde_json::Value>>,
    operation_queue: RefCell<Vec<serde_json::Value>>,
    initialized: Cell<bool>,
    initializing: Cell<bool>,
}

impl PersistentBag {
    /// Create an empty, not yet loaded bag for a role and owner key.
    pub fn new(role: impl Into<String>, key: Value) -> Self {
        Self {
            role: role.into(),
            key,
            owner: RefCell::new(CollectionOwner::Unowned),
            elements: RefCell::new(Vec::new()),
            operation_queue: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
            initializing: Cell::new(false),
        }
    }

    /// Attach the bag to its owner (builder pattern).
    #[must_use]
    pub fn with_owner(self, owner: EntityKey) -> Self {
        self.owner.replace(CollectionOwner::Owned(owner));
        self
    }

    /// Wrap the bag in a shared reference.
    pub fn into_ref(self) -> CollectionRef {
        Rc::new(self)
    }

    /// The role this bag was created for.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The owner key this bag was created for.
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// Attach the bag to its owner.
    pub fn set_owner(&self, owner: EntityKey) {
        self.owner.replace(CollectionOwner::Owned(owner));
    }

    /// Read one element from a result row.
    ///
    /// Returns `false` (and drops the element) if the bag is not currently
    /// being populated.
    pub fn read_element(&self, element: serde_json::Value) -> bool {
        if !self.initializing.get() {
            tracing::warn!(
                role = %self.role,
                owner_key = %self.key,
                "Row element read into a bag that is not being populated; ignoring"
            );
            return false;
        }
        self.elements.borrow_mut().push(element);
        true
    }

    /// Add an element on behalf of application code.
    ///
    /// Before the bag is loaded the element is queued, so the load does not
    /// clobber it.
    pub fn add(&self, element: serde_json::Value) {
        if self.initialized.get() {
            self.elements.borrow_mut().push(element);
        } else {
            self.operation_queue.borrow_mut().push(element);
        }
    }

    /// Snapshot of the current elements.
    pub fn elements(&self) -> Vec<serde_json::Value> {
        self.elements.borrow().clone()
    }

    /// Number of loaded elements.
    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    /// Whether the bag has no loaded elements.
    pub fn is_empty(&self) -> bool {
        self.elements.borrow().is_empty()
    }

    /// Number of operations waiting for the load to finish.
    pub fn queued_operation_count(&self) -> usize {
        self.operation_queue.borrow().len()
    }
}

impl PersistentCollection for PersistentBag {
    fn owner(&self) -> CollectionOwner {
        self.owner.borrow().clone()
    }

    fn was_initialized(&self) -> bool {
        self.initialized.get()
    }

    fn is_initializing(&self) -> bool {
        self.initializing.get()
    }

    fn before_initialize(
        &self,
        _persister: &dyn CollectionPersister,
        anticipated_size: Option<usize>,
    ) {
        let mut elements = self.elements.borrow_mut();
        elements.clear();
        if let Some(size) = anticipated_size {
            elements.reserve(size);
        }
    }

    fn begin_read(&self) {
        self.initializing.set(true);
    }

    fn end_read(&self, _session: &mut LoadSession) -> bool {
        self.initializing.set(false);
        self.initialized.set(true);
        let queued: Vec<_> = self.operation_queue.borrow_mut().drain(..).collect();
        let had_queued = !queued.is_empty();
        self.elements.borrow_mut().extend(queued);
        had_queued
    }

    fn disassemble(&self, _persister: &dyn CollectionPersister) -> serde_json::Value {
        serde_json::Value::Array(self.elements())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
