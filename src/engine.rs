//! SyncEngine - Lifecycle Hooks for Synchronized Fields
//!
//! TigerStyle: Every hook is a pure decision over (scope, entity, options)
//! followed by at most one backend call and one primary-store write.
//!
//! # Lifecycle
//!
//! ```text
//! load    → retrieve(active ∩ unpopulated) → hydrate
//! save    → persist(active ∩ dirty)        → nullify written (replicate off)
//! delete  → delete(active)                 (skipped on soft delete)
//! force   → persist(active)                → nullify written (replicate off)
//! ```
//!
//! # Consistency
//!
//! The primary row and the secondary store are written without a shared
//! transaction. A crash between the backend write and the nullify update
//! leaves the field in both stores (replicate off) or leaves the secondary
//! store stale. No retry or repair is attempted.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::Entity;
use crate::primary::PrimaryStore;
use crate::registry::{FieldRegistry, FieldSet};
use crate::scope::FieldScope;
use crate::storage::{StorageBackend, StorageResult};

// =============================================================================
// Options
// =============================================================================

/// Engine switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// When off every hook is a no-op
    pub enabled: bool,
    /// When off, written fields are set to NULL in the primary row
    pub replicate: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            replicate: true,
        }
    }
}

/// How the host is removing an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKind {
    /// Row is only flagged as deleted
    Soft,
    /// Row is removed permanently
    Force,
}

// =============================================================================
// LifecycleObserver
// =============================================================================

/// Hooks the host calls around its own load, save and delete.
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// After an entity is loaded from the primary store.
    async fn on_load(&self, scope: &FieldScope, entity: &mut Entity) -> StorageResult<()>;

    /// After an entity is written to the primary store.
    async fn on_save(&self, scope: &FieldScope, entity: &Entity) -> StorageResult<()>;

    /// After an entity is deleted from the primary store.
    async fn on_delete(&self, scope: &FieldScope, entity: &Entity, kind: DeleteKind) -> StorageResult<()>;
}

// =============================================================================
// SyncEngine
// =============================================================================

/// Moves synchronized fields between entities and a storage backend.
pub struct SyncEngine {
    storage: Arc<dyn StorageBackend>,
    primary: Arc<dyn PrimaryStore>,
    registry: Arc<FieldRegistry>,
    options: SyncOptions,
}

impl SyncEngine {
    /// Create a new engine.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        primary: Arc<dyn PrimaryStore>,
        registry: Arc<FieldRegistry>,
        options: SyncOptions,
    ) -> Self {
        tracing::info!(
            backend = storage.name(),
            enabled = options.enabled,
            replicate = options.replicate,
            "sync engine created"
        );
        Self {
            storage,
            primary,
            registry,
            options,
        }
    }

    /// Fresh override scope over this engine's registry.
    #[must_use]
    pub fn scope(&self) -> FieldScope {
        FieldScope::new(Arc::clone(&self.registry))
    }

    /// Persist every active field regardless of dirty state.
    ///
    /// Returns the fields the backend actually wrote.
    ///
    /// # Errors
    /// Returns error if the backend or the primary store fails.
    pub async fn force_synchronization(&self, scope: &FieldScope, entity: &Entity) -> StorageResult<FieldSet> {
        if !self.options.enabled {
            return Ok(FieldSet::new());
        }

        let fields = scope.active_fields(entity.table());
        if fields.is_empty() {
            return Ok(FieldSet::new());
        }

        tracing::debug!(
            table = entity.table(),
            key = entity.key(),
            fields = %fields,
            "forcing synchronization"
        );
        self.persist(entity, &fields).await
    }

    async fn persist(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldSet> {
        let written = self.storage.persist(entity, fields).await?;

        if !self.options.replicate && !written.is_empty() {
            self.primary
                .update_columns_to_null(entity.table(), entity.key_name(), entity.key(), &written)
                .await?;
            tracing::debug!(
                table = entity.table(),
                key = entity.key(),
                fields = %written,
                "nullified primary columns"
            );
        }
        Ok(written)
    }
}

#[async_trait]
impl LifecycleObserver for SyncEngine {
    async fn on_load(&self, scope: &FieldScope, entity: &mut Entity) -> StorageResult<()> {
        if !self.options.enabled {
            return Ok(());
        }

        let candidates = scope
            .active_fields(entity.table())
            .filter(|field| entity.original(field).is_none());
        if candidates.is_empty() {
            return Ok(());
        }

        let values = self.storage.retrieve(entity, &candidates).await?;
        tracing::debug!(
            table = entity.table(),
            key = entity.key(),
            requested = %candidates,
            found = values.len(),
            "retrieved synchronized fields"
        );

        for (field, value) in values {
            entity.hydrate(field, value);
        }
        Ok(())
    }

    async fn on_save(&self, scope: &FieldScope, entity: &Entity) -> StorageResult<()> {
        if !self.options.enabled {
            return Ok(());
        }

        let dirty = entity.dirty_fields();
        if dirty.is_empty() {
            return Ok(());
        }

        let fields = scope.active_fields(entity.table()).intersect(&dirty);
        if fields.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            table = entity.table(),
            key = entity.key(),
            fields = %fields,
            "persisting dirty synchronized fields"
        );
        self.persist(entity, &fields).await?;
        Ok(())
    }

    async fn on_delete(&self, scope: &FieldScope, entity: &Entity, kind: DeleteKind) -> StorageResult<()> {
        if !self.options.enabled {
            return Ok(());
        }

        if kind == DeleteKind::Soft && self.registry.soft_deletes(entity.table()) {
            tracing::debug!(table = entity.table(), key = entity.key(), "soft delete, keeping synchronized fields");
            return Ok(());
        }

        let fields = scope.active_fields(entity.table());
        if fields.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            table = entity.table(),
            key = entity.key(),
            fields = %fields,
            "deleting synchronized fields"
        );
        self.storage.delete(entity, &fields).await
    }
}

// =============================================================================
// Tests
// =============================================================================
