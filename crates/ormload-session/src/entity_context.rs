//! Per-cursor entity hydration bookkeeping.

use crate::key::{CursorHandle, EntityKey};
use std::fmt;

/// Tracks entities mid-hydration for one cursor.
///
/// The hydration algorithm itself lives with the entity loader; the registry
/// only manages this context's lifetime alongside the cursor's collection
/// load context.
#[derive(Debug)]
pub struct EntityLoadContext {
    cursor: CursorHandle,
    hydrating_entities: Vec<EntityKey>,
}

impl EntityLoadContext {
    pub(crate) fn new(cursor: CursorHandle) -> Self {
        Self {
            cursor,
            hydrating_entities: Vec::with_capacity(20),
        }
    }

    pub fn cursor(&self) -> CursorHandle {
        self.cursor
    }

    /// Record an entity whose hydration started on this cursor.
    pub fn register_hydrating(&mut self, entity: EntityKey) {
        self.hydrating_entities.push(entity);
    }

    /// Record that hydration of `entity` completed. Returns `false` if the
    /// entity was not being tracked.
    pub fn complete_hydration(&mut self, entity: &EntityKey) -> bool {
        match self.hydrating_entities.iter().position(|e| e == entity) {
            Some(index) => {
                self.hydrating_entities.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn hydrating_count(&self) -> usize {
        self.hydrating_entities.len()
    }

    /// Drop all tracked entities. Returns `true` if any were still hydrating,
    /// which is logged as a consistency warning.
    pub(crate) fn cleanup(&mut self) -> bool {
        let stragglers = !self.hydrating_entities.is_empty();
        if stragglers {
            tracing::warn!(
                cursor = %self.cursor,
                count = self.hydrating_entities.len(),
                "On entity load context cleanup, entities were still hydrating"
            );
        }
        self.hydrating_entities.clear();
        stragglers
    }
}

impl fmt::Display for EntityLoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityLoadContext<{}>", self.cursor)
    }
}
