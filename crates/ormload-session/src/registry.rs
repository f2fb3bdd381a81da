//! Session-wide registry of active cursors and collections under population.
//!
//! The registry owns one [`CollectionLoadContext`] and one [`EntityLoadContext`]
//! per active cursor, plus a single cross-reference table mapping every
//! [`CollectionKey`] currently being populated, by any cursor, to its
//! [`LoadingCollectionEntry`]. The table is what lets a cursor opened while
//! another cursor's rows are being processed discover that a collection is
//! already owned further up the call stack.
//!
//! # Invariants
//!
//! - At most one entry exists per key in the cross-reference table.
//! - A key finalized by a context is absent from that context's local set and
//!   from the table.
//!
//! The registry lives exactly as long as its unit of work and is never shared
//! between units of work.

use crate::collection::CollectionRef;
use crate::collection_context::CollectionLoadContext;
use crate::entity_context::EntityLoadContext;
use crate::entry::LoadingCollectionEntry;
use crate::key::{CollectionKey, CursorHandle};
use crate::persister::CollectionPersister;
use ormload_core::{RepresentationMode, Value};
use std::collections::HashMap;

/// Registry of load contexts and collections under population.
#[derive(Debug, Default)]
pub struct LoadingRegistry {
    /// Last issued cursor token.
    next_cursor: u64,
    /// Cursor -> collection load context.
    collection_contexts: HashMap<CursorHandle, CollectionLoadContext>,
    /// Cursor -> entity load context.
    entity_contexts: HashMap<CursorHandle, EntityLoadContext>,
    /// Collection key -> entry, across all cursors.
    xref: HashMap<CollectionKey, LoadingCollectionEntry>,
    /// Consistency warnings logged so far.
    consistency_warnings: u64,
}

impl LoadingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a handle for a newly opened cursor.
    pub fn open_cursor(&mut self) -> CursorHandle {
        self.next_cursor += 1;
        CursorHandle::new(self.next_cursor)
    }

    /// Get the collection load context for a cursor, creating it on first use.
    pub fn context_for(&mut self, cursor: CursorHandle) -> &mut CollectionLoadContext {
        self.collection_contexts.entry(cursor).or_insert_with(|| {
            tracing::trace!(cursor = %cursor, "Constructing collection load context");
            CollectionLoadContext::new(cursor)
        })
    }

    /// Get the collection load context for a cursor, if one exists.
    pub fn collection_context(&self, cursor: CursorHandle) -> Option<&CollectionLoadContext> {
        self.collection_contexts.get(&cursor)
    }

    pub(crate) fn collection_context_mut(
        &mut self,
        cursor: CursorHandle,
    ) -> Option<&mut CollectionLoadContext> {
        self.collection_contexts.get_mut(&cursor)
    }

    /// Get the entity load context for a cursor, creating it on first use.
    pub fn entity_context_for(&mut self, cursor: CursorHandle) -> &mut EntityLoadContext {
        self.entity_contexts.entry(cursor).or_insert_with(|| {
            tracing::trace!(cursor = %cursor, "Constructing entity load context");
            EntityLoadContext::new(cursor)
        })
    }

    /// Whether a cursor has a live collection or entity load context.
    pub fn is_active(&self, cursor: CursorHandle) -> bool {
        self.collection_contexts.contains_key(&cursor) || self.entity_contexts.contains_key(&cursor)
    }

    /// Record that `key` is being populated under `entry`'s cursor.
    ///
    /// Callers check [`lookup`](Self::lookup) first; an existing entry is
    /// replaced, and replacing another cursor's entry is logged.
    pub fn register(&mut self, key: CollectionKey, entry: LoadingCollectionEntry) {
        let cursor = entry.cursor();
        if let Some(previous) = self.xref.insert(key, entry) {
            if previous.cursor() != cursor {
                tracing::warn!(
                    role = previous.persister().role(),
                    owner_key = %previous.key(),
                    replaced = %previous.cursor(),
                    by = %cursor,
                    "Replaced a loading collection entry owned by another cursor"
                );
                self.consistency_warnings += 1;
            }
        }
    }

    /// Find the entry for a collection being populated by any cursor.
    pub fn lookup(&self, key: &CollectionKey) -> Option<&LoadingCollectionEntry> {
        let entry = self.xref.get(key);
        tracing::trace!(
            key = %key,
            found = entry.is_some(),
            "Attempting to locate loading collection entry in any cursor context"
        );
        entry
    }

    /// Remove the entry for a collection.
    pub fn unregister(&mut self, key: &CollectionKey) -> Option<LoadingCollectionEntry> {
        self.xref.remove(key)
    }

    /// The collection being populated for `persister`'s role and `owner_key`,
    /// under any cursor.
    pub fn locate_loading_collection(
        &self,
        persister: &dyn CollectionPersister,
        owner_key: &Value,
        mode: RepresentationMode,
    ) -> Option<CollectionRef> {
        let key = CollectionKey::new(persister.role(), owner_key.clone(), mode);
        match self.lookup(&key) {
            Some(entry) => {
                tracing::trace!(key = %key, "Returning loading collection");
                Some(entry.collection().clone())
            }
            None => None,
        }
    }

    /// Release everything held for a cursor. Retiring an unknown cursor is a
    /// no-op.
    pub fn retire(&mut self, cursor: CursorHandle) {
        if let Some(mut ctx) = self.collection_contexts.remove(&cursor) {
            self.cleanup_collection_context(&mut ctx);
        }
        if let Some(mut ctx) = self.entity_contexts.remove(&cursor) {
            if ctx.cleanup() {
                self.consistency_warnings += 1;
            }
        }
    }

    /// Fail-safe teardown of every remaining context.
    ///
    /// Anything still registered at this point indicates an aborted load or a
    /// caller that never retired its cursor; each is logged and released.
    pub fn sweep(&mut self) {
        let collection_contexts = std::mem::take(&mut self.collection_contexts);
        for (_, mut ctx) in collection_contexts {
            tracing::warn!(context = %ctx, "Fail-safe cleanup (collections)");
            self.consistency_warnings += 1;
            self.cleanup_collection_context(&mut ctx);
        }

        let entity_contexts = std::mem::take(&mut self.entity_contexts);
        for (_, mut ctx) in entity_contexts {
            tracing::warn!(context = %ctx, "Fail-safe cleanup (entities)");
            self.consistency_warnings += 1;
            ctx.cleanup();
        }

        if !self.xref.is_empty() {
            tracing::warn!(
                count = self.xref.len(),
                "Loading collection entries remained without an owning context"
            );
            self.consistency_warnings += 1;
            self.xref.clear();
        }
    }

    fn cleanup_collection_context(&mut self, ctx: &mut CollectionLoadContext) {
        let keys = ctx.take_local_keys();
        if !keys.is_empty() {
            tracing::warn!(
                cursor = %ctx.cursor(),
                count = keys.len(),
                "On collection load context cleanup, local loading keys were still registered"
            );
            self.consistency_warnings += 1;
        }
        for key in keys {
            if self
                .xref
                .get(&key)
                .is_some_and(|entry| entry.cursor() == ctx.cursor())
            {
                self.xref.remove(&key);
            }
        }
    }

    pub(crate) fn record_warning(&mut self) {
        self.consistency_warnings += 1;
    }

    /// Whether any cursor has a collection load context.
    pub fn has_loading_collection_entries(&self) -> bool {
        !self.collection_contexts.is_empty()
    }

    /// Whether any collection is currently registered as being populated.
    pub fn has_registered_loading_collection_entries(&self) -> bool {
        !self.xref.is_empty()
    }

    /// Number of live collection load contexts.
    pub fn collection_context_count(&self) -> usize {
        self.collection_contexts.len()
    }

    /// Number of live entity load contexts.
    pub fn entity_context_count(&self) -> usize {
        self.entity_contexts.len()
    }

    /// Number of collections registered as being populated.
    pub fn registered_count(&self) -> usize {
        self.xref.len()
    }

    /// Consistency warnings logged so far.
    pub fn consistency_warnings(&self) -> u64 {
        self.consistency_warnings
    }
}
