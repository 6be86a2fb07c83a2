//! FilesystemBackend - One JSON File per Field
//!
//! TigerStyle: Sharded layout, explicit not-found handling.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FilesystemBackend                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ShardingScheme: table/<shards>/<key>@<field>.json           │
//! │  Disk: exists / read / write / delete / make_directory       │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑
//! ┌────────┴────────┐
//! │    LocalDisk    │  (tokio::fs under a root directory)
//! └─────────────────┘
//! ```

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::fs;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::identifier::validate_identifier;
use super::sharding::ShardingScheme;
use crate::entity::{Entity, FieldValues};
use crate::registry::FieldSet;

// =============================================================================
// Disk
// =============================================================================

/// File medium addressed by relative, `/`-separated paths.
#[async_trait]
pub trait Disk: Send + Sync {
    /// Whether a file or directory exists.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Read a file; `None` when it does not exist.
    async fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Create or overwrite a file.
    async fn write(&self, path: &str, contents: &[u8]) -> StorageResult<()>;

    /// Remove a file; removing a missing file succeeds.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Create a directory, with its parents when `recursive` is set.
    async fn make_directory(&self, path: &str, recursive: bool) -> StorageResult<()>;
}

/// Local disk rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    /// Create a disk rooted at `root`. The root is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl Disk for LocalDisk {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        match fs::metadata(self.resolve(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::read(format!("failed to stat {path}: {e}"))),
        }
    }

    async fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.resolve(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::read(format!("failed to read {path}: {e}"))),
        }
    }

    async fn write(&self, path: &str, contents: &[u8]) -> StorageResult<()> {
        fs::write(self.resolve(path), contents)
            .await
            .map_err(|e| StorageError::write(format!("failed to write {path}: {e}")))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        match fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::write(format!("failed to delete {path}: {e}"))),
        }
    }

    async fn make_directory(&self, path: &str, recursive: bool) -> StorageResult<()> {
        let target = self.resolve(path);
        let result = if recursive {
            fs::create_dir_all(&target).await
        } else {
            fs::create_dir(&target).await
        };
        result.map_err(|e| StorageError::directory(format!("cannot create directory {path}: {e}")))
    }
}

// =============================================================================
// FilesystemBackend
// =============================================================================

/// Stores every synchronized field as its own JSON file.
pub struct FilesystemBackend {
    disk: Arc<dyn Disk>,
    scheme: ShardingScheme,
}

impl FilesystemBackend {
    /// Create a backend over any disk.
    #[must_use]
    pub fn new(disk: Arc<dyn Disk>, scheme: ShardingScheme) -> Self {
        Self { disk, scheme }
    }

    /// Create a backend over the local disk.
    #[must_use]
    pub fn local(root: impl Into<PathBuf>, scheme: ShardingScheme) -> Self {
        Self::new(Arc::new(LocalDisk::new(root)), scheme)
    }

    /// Relative path of one field of an entity.
    ///
    /// # Errors
    /// Returns `InvalidData` if the table or field is not a plain identifier.
    pub fn full_path(&self, entity: &Entity, field: &str) -> StorageResult<String> {
        let table = validate_identifier(entity.table())?;
        let field = validate_identifier(field)?;
        Ok(self.scheme.path(table, entity.key(), field))
    }

    async fn make_folder(&self, entity: &Entity) -> StorageResult<()> {
        let folder = self.scheme.folder(validate_identifier(entity.table())?, entity.key());

        let exists = self
            .disk
            .exists(&folder)
            .await
            .map_err(|e| StorageError::directory(format!("cannot inspect {folder}: {e}")))?;

        if !exists {
            self.disk.make_directory(&folder, true).await?;
        }
        Ok(())
    }

    async fn read_field(&self, entity: &Entity, field: &str) -> StorageResult<Option<(String, serde_json::Value)>> {
        let path = self.full_path(entity, field)?;

        let Some(bytes) = self.disk.read(&path).await? else {
            return Ok(None);
        };

        let value = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::invalid_data(format!("{path} is not valid JSON: {e}")))?;
        Ok(Some((field.to_string(), value)))
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn retrieve(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldValues> {
        let reads = fields.iter().map(|field| self.read_field(entity, field));
        let hits = try_join_all(reads).await?;

        Ok(hits.into_iter().flatten().collect())
    }

    async fn persist(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldSet> {
        let paths = fields
            .iter()
            .map(|field| self.full_path(entity, field))
            .collect::<StorageResult<Vec<_>>>()?;
        self.make_folder(entity).await?;

        let mut written = FieldSet::new();
        for (field, path) in fields.iter().zip(paths) {

            match entity.value(field) {
                None => {
                    self.disk.delete(&path).await?;
                }
                Some(value) => {
                    let payload = serde_json::to_vec(value)
                        .map_err(|e| StorageError::invalid_data(format!("cannot encode {field}: {e}")))?;
                    self.disk.write(&path, &payload).await?;
                    written.insert(field);
                }
            }
        }

        tracing::debug!(
            table = entity.table(),
            key = entity.key(),
            written = %written,
            "persisted fields to filesystem"
        );
        Ok(written)
    }

    async fn delete(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<()> {
        for field in fields.iter() {
            self.disk.delete(&self.full_path(entity, field)?).await?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn fields(names: &[&str]) -> FieldSet {
        names.iter().copied().collect()
    }

    fn entity() -> Entity {
        Entity::new("test_models", 1)
            .with_attribute("sync_field", json!({"key": "value"}))
            .with_attribute("another_sync_field", json!({"foo": "bar"}))
    }

    #[tokio::test]
    async fn test_persist_writes_sharded_files() {
        let dir = tempdir().unwrap();
        let backend = FilesystemBackend::local(dir.path(), ShardingScheme::new(1000));

        let written = backend
            .persist(&entity(), &fields(&["sync_field", "another_sync_field"]))
            .await
            .unwrap();

        assert_eq!(written, fields(&["sync_field", "another_sync_field"]));
        let raw = std::fs::read_to_string(dir.path().join("test_models/0/1@sync_field.json")).unwrap();
        assert_eq!(raw, r#"{"key":"value"}"#);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempdir().unwrap();
        let backend = FilesystemBackend::local(dir.path(), ShardingScheme::default());
        let requested = fields(&["sync_field", "another_sync_field"]);

        backend.persist(&entity(), &requested).await.unwrap();
        let values = backend.retrieve(&Entity::new("test_models", 1), &requested).await.unwrap();

        assert_eq!(values.get("sync_field"), Some(&json!({"key": "value"})));
        assert_eq!(values.get("another_sync_field"), Some(&json!({"foo": "bar"})));
    }

    #[tokio::test]
    async fn test_retrieve_skips_missing_files() {
        let dir = tempdir().unwrap();
        let backend = FilesystemBackend::local(dir.path(), ShardingScheme::default());

        let values = backend
            .retrieve(&Entity::new("test_models", 1), &fields(&["sync_field"]))
            .await
            .unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_null_value_deletes_file() {
        let dir = tempdir().unwrap();
        let backend = FilesystemBackend::local(dir.path(), ShardingScheme::default());
        let requested = fields(&["sync_field", "another_sync_field"]);
        backend.persist(&entity(), &requested).await.unwrap();

        let cleared = entity().with_attribute("sync_field", Value::Null);
        let written = backend.persist(&cleared, &requested).await.unwrap();

        assert_eq!(written, fields(&["another_sync_field"]));
        assert!(!dir.path().join("test_models/0/1@sync_field.json").exists());
    }

    #[tokio::test]
    async fn test_persist_is_idempotent() {
        let dir = tempdir().unwrap();
        let backend = FilesystemBackend::local(dir.path(), ShardingScheme::default());
        let requested = fields(&["sync_field"]);

        let first = backend.persist(&entity(), &requested).await.unwrap();
        let second = backend.persist(&entity(), &requested).await.unwrap();
        assert_eq!(first, second);

        let values = backend.retrieve(&entity(), &requested).await.unwrap();
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_ignores_missing_files() {
        let dir = tempdir().unwrap();
        let backend = FilesystemBackend::local(dir.path(), ShardingScheme::default());
        let requested = fields(&["sync_field", "another_sync_field"]);
        backend.persist(&entity(), &fields(&["sync_field"])).await.unwrap();

        backend.delete(&entity(), &requested).await.unwrap();

        let values = backend.retrieve(&entity(), &requested).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("test_models/0")).unwrap();
        std::fs::write(dir.path().join("test_models/0/1@sync_field.json"), b"{not json").unwrap();
        let backend = FilesystemBackend::local(dir.path(), ShardingScheme::default());

        let err = backend.retrieve(&entity(), &fields(&["sync_field"])).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_names_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let backend = FilesystemBackend::local(&root, ShardingScheme::default());
        let escaping = Entity::new("../outside", 1).with_attribute("sync_field", json!(1));

        let err = backend.persist(&escaping, &fields(&["sync_field"])).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
        let err = backend
            .persist(&entity(), &fields(&["../../sync_field"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
        assert!(backend.retrieve(&escaping, &fields(&["sync_field"])).await.is_err());
        assert!(backend.delete(&escaping, &fields(&["sync_field"])).await.is_err());

        assert!(!dir.path().join("outside").exists());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_directory_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let backend = FilesystemBackend::local(&blocker, ShardingScheme::default());

        let err = backend.persist(&entity(), &fields(&["sync_field"])).await.unwrap_err();
        assert!(matches!(err, StorageError::Directory(_)));
    }
}
