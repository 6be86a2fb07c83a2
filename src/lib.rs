//! Synced Fields - Offload Record Fields to a Secondary Store
//!
//! TigerStyle simulation-first field synchronization for ORM-style records.
//!
//! Selected fields of an entity type are copied (or moved) out of the
//! primary row into a secondary backend on save, read back on load, and
//! removed on delete.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Host ORM  → LifecycleObserver hooks         │
//! ├─────────────────────────────────────────────┤
//! │  SyncEngine   │ FieldScope (overrides)       │
//! │               │ FieldRegistry (declarations) │
//! ├─────────────────────────────────────────────┤
//! │  StorageBackend: filesystem │ dynamo │ sql   │
//! │  PrimaryStore: nullify offloaded columns     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use synced_fields::{
//!     Entity, FieldRegistry, FilesystemBackend, LifecycleObserver, ShardingScheme,
//!     SimPrimaryStore, SyncEngine, SyncOptions, SyncedType,
//! };
//!
//! # async fn run() -> Result<(), synced_fields::StorageError> {
//! let registry = FieldRegistry::new().with(SyncedType::new("posts").fields(["body"]));
//! let engine = SyncEngine::new(
//!     Arc::new(FilesystemBackend::local("/tmp/fields", ShardingScheme::default())),
//!     Arc::new(SimPrimaryStore::new()),
//!     Arc::new(registry),
//!     SyncOptions::default(),
//! );
//!
//! let scope = engine.scope();
//! let post = Entity::new("posts", 1).with_attribute("body", json!("hello"));
//! engine.on_save(&scope, &post).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod engine;
pub mod entity;
pub mod primary;
pub mod registry;
pub mod scope;
pub mod storage;

// Re-export common types
pub use config::{ConfigError, DatabaseConfig, DriverKind, DynamoConfig, FilesystemConfig, SyncConfig};
pub use engine::{DeleteKind, LifecycleObserver, SyncEngine, SyncOptions};
pub use entity::{Entity, FieldValues};
pub use primary::{NullifyCall, PrimaryStore, SimPrimaryStore, SqlPrimaryStore};
pub use registry::{FieldRegistry, FieldSet, SyncedType};
pub use scope::{FieldScope, ScopeGuard};
pub use storage::{
    DatabaseBackend, Disk, DynamoBackend, FilesystemBackend, KeyValueClient, LocalDisk, ShardingScheme,
    SimCall, SimItemStore, SimStorageBackend, StorageBackend, StorageError, StorageResult,
};
