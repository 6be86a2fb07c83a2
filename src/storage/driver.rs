//! Driver selection from configuration.

use std::sync::Arc;

use super::backend::StorageBackend;
use super::database::DatabaseBackend;
use super::dynamo::{aws_client, DynamoBackend};
use super::error::StorageResult;
use super::filesystem::FilesystemBackend;
use super::sharding::ShardingScheme;
use crate::config::{DriverKind, SyncConfig};

/// Build the backend named by `config.driver`.
///
/// # Errors
/// Returns error if the relational backend cannot connect.
pub async fn connect(config: &SyncConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.driver {
        DriverKind::Filesystem => Arc::new(FilesystemBackend::local(
            config.filesystem.root.clone(),
            ShardingScheme::new(config.filesystem.files_per_folder),
        )),
        DriverKind::Dynamo => Arc::new(DynamoBackend::new(Arc::new(aws_client(&config.dynamo).await))),
        DriverKind::Database => Arc::new(DatabaseBackend::connect(&config.database.url).await?),
    };

    tracing::info!(driver = backend.name(), "storage backend ready");
    Ok(backend)
}
