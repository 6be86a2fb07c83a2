//! FieldScope - Scoped Field-Set Overrides
//!
//! TigerStyle: Overrides are explicit values, never global state.
//!
//! A `FieldScope` belongs to one logical request or task. It holds a stack of
//! field-set frames per entity type on top of the registry declarations.
//! Every push returns a [`ScopeGuard`] tied to its own frame. Dropping the
//! guard removes exactly that frame, so nested overrides unwind in LIFO
//! order on return, error and panic alike, and a guard dropped out of order
//! never removes a frame whose guard is still alive.
//!
//! ```text
//! registry: posts = [a, b, c]
//!   exclude(posts, [a])      -> [b, c]
//!     exclude(posts, [b])    -> [c]
//!     <drop>                 -> [b, c]
//!   <drop>                   -> [a, b, c]
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::registry::{FieldRegistry, FieldSet};

// =============================================================================
// FieldScope
// =============================================================================

/// One pushed override.
#[derive(Debug)]
struct Frame {
    id: u64,
    fields: FieldSet,
}

#[derive(Debug, Default)]
struct Overrides {
    next_id: u64,
    stacks: HashMap<String, Vec<Frame>>,
}

/// Request-scoped view of the synchronized field sets.
#[derive(Debug)]
pub struct FieldScope {
    registry: Arc<FieldRegistry>,
    overrides: Mutex<Overrides>,
}

impl FieldScope {
    /// Create a scope with no overrides.
    #[must_use]
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        Self {
            registry,
            overrides: Mutex::new(Overrides::default()),
        }
    }

    /// Field set currently in force for a type.
    #[must_use]
    pub fn active_fields(&self, table: &str) -> FieldSet {
        let overrides = self.lock();
        match overrides.stacks.get(table).and_then(|stack| stack.last()) {
            Some(frame) => frame.fields.clone(),
            None => self.registry.fields(table),
        }
    }

    /// Number of override frames currently pushed for a type.
    #[must_use]
    pub fn depth(&self, table: &str) -> usize {
        self.lock().stacks.get(table).map_or(0, Vec::len)
    }

    /// Narrow the active set of a type until the guard is dropped.
    pub fn exclude<I, S>(&self, table: &str, excluded: I) -> ScopeGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let excluded: FieldSet = excluded.into_iter().collect();
        let narrowed = self.active_fields(table).without(&excluded);
        self.push(table, narrowed)
    }

    /// Clear the active set of a type until the guard is dropped.
    pub fn disable(&self, table: &str) -> ScopeGuard<'_> {
        self.push(table, FieldSet::new())
    }

    /// Run `f` with some fields of a type excluded.
    pub fn without_fields<I, S, R>(&self, table: &str, excluded: I, f: impl FnOnce() -> R) -> R
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _guard = self.exclude(table, excluded);
        f()
    }

    /// Run `f` with synchronization of a type switched off.
    pub fn without_synchronization<R>(&self, table: &str, f: impl FnOnce() -> R) -> R {
        let _guard = self.disable(table);
        f()
    }

    /// Await `fut` with some fields of a type excluded.
    pub async fn without_fields_async<I, S, F>(&self, table: &str, excluded: I, fut: F) -> F::Output
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Future,
    {
        let _guard = self.exclude(table, excluded);
        fut.await
    }

    /// Await `fut` with synchronization of a type switched off.
    pub async fn without_synchronization_async<F: Future>(&self, table: &str, fut: F) -> F::Output {
        let _guard = self.disable(table);
        fut.await
    }

    fn push(&self, table: &str, fields: FieldSet) -> ScopeGuard<'_> {
        let mut overrides = self.lock();
        let id = overrides.next_id;
        overrides.next_id += 1;

        let stack = overrides.stacks.entry(table.to_string()).or_default();
        tracing::debug!(table = table, depth = stack.len(), fields = %fields, "pushed field override");
        stack.push(Frame { id, fields });

        ScopeGuard {
            scope: self,
            table: table.to_string(),
            id,
        }
    }

    fn restore(&self, table: &str, id: u64) {
        let mut overrides = self.lock();
        let Some(stack) = overrides.stacks.get_mut(table) else {
            return;
        };

        if stack.last().is_some_and(|frame| frame.id != id) {
            tracing::warn!(table = table, frame = id, "field override dropped out of order");
        }
        stack.retain(|frame| frame.id != id);
        if stack.is_empty() {
            overrides.stacks.remove(table);
        }
        tracing::debug!(table = table, frame = id, "restored field override");
    }

    fn lock(&self) -> MutexGuard<'_, Overrides> {
        // A panic while holding the lock cannot leave a half-written stack.
        self.overrides.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// ScopeGuard
// =============================================================================

/// Removes its own override frame when dropped.
#[must_use = "the override is removed as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    scope: &'a FieldScope,
    table: String,
    id: u64,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.restore(&self.table, self.id);
    }
}
