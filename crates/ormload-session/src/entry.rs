//! Cross-reference record of a collection being populated.

use crate::collection::CollectionRef;
use crate::key::CursorHandle;
use crate::persister::PersisterRef;
use ormload_core::Value;
use std::fmt;

/// Binds a collection under population to the cursor that populates it.
///
/// Created when a cursor starts reading rows into a collection, dropped when
/// that cursor finalizes the collection. Immutable once built.
#[derive(Clone)]
pub struct LoadingCollectionEntry {
    cursor: CursorHandle,
    persister: PersisterRef,
    key: Value,
    collection: CollectionRef,
}

impl LoadingCollectionEntry {
    pub fn new(
        cursor: CursorHandle,
        persister: PersisterRef,
        key: Value,
        collection: CollectionRef,
    ) -> Self {
        Self {
            cursor,
            persister,
            key,
            collection,
        }
    }

    pub fn cursor(&self) -> CursorHandle {
        self.cursor
    }

    pub fn persister(&self) -> &PersisterRef {
        &self.persister
    }

    /// The owner key.
    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }
}

impl fmt::Debug for LoadingCollectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingCollectionEntry")
            .field("cursor", &self.cursor)
            .field("role", &self.persister.role())
            .field("key", &self.key)
            .field("initializing", &self.collection.is_initializing())
            .finish()
    }
}

impl fmt::Display for LoadingCollectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LoadingCollectionEntry<{}#{}, {}>",
            self.persister.role(),
            self.key,
            self.cursor
        )
    }
}
