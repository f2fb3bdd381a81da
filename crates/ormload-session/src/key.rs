//! Keys and handles used by the loading registry.

use ormload_core::{RepresentationMode, Value};
use std::fmt;

/// Opaque identity of one open result cursor.
///
/// Handles are issued by [`LoadingRegistry::open_cursor`](crate::LoadingRegistry::open_cursor)
/// from a per-registry counter. Two handles are equal only if they were issued
/// for the same cursor; the cursor's own notion of equality is never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorHandle(u64);

impl CursorHandle {
    pub(crate) const fn new(token: u64) -> Self {
        Self(token)
    }

    /// Get the raw token.
    pub const fn token(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor#{}", self.0)
    }
}

/// Identifies the collection of one role belonging to one owner.
///
/// Equality and hash are structural over role, owner key and representation
/// mode, independent of which cursor produced the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    role: String,
    owner_key: Value,
    mode: RepresentationMode,
}

impl CollectionKey {
    /// Create a collection key.
    pub fn new(role: impl Into<String>, owner_key: Value, mode: RepresentationMode) -> Self {
        Self {
            role: role.into(),
            owner_key,
            mode,
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

    /// The representation mode.
    pub fn mode(&self) -> RepresentationMode {
        self.mode
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.owner_key)
    }
}

/// Identifies one entity in the object cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    entity_name: String,
    id: Value,
}

impl EntityKey {
    /// Create an entity key.
    pub fn new(entity_name: impl Into<String>, id: Value) -> Self {
        Self {
            entity_name: entity_name.into(),
            id,
        }
    }

    /// The entity name.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// The entity identifier.
    pub fn id(&self) -> &Value {
        &self.id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_name, self.id)
    }
}
