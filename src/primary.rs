//! PrimaryStore - Direct Writes Against the Primary Row
//!
//! TigerStyle: The engine never goes through the host's save pipeline here;
//! it issues one explicit UPDATE so no lifecycle hook fires again.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use crate::registry::FieldSet;
use crate::storage::{connect_pool, quote_identifier, StorageError, StorageResult};

/// Write access to the primary store used by the replicate policy.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// Set the given columns of one primary row to NULL.
    async fn update_columns_to_null(
        &self,
        table: &str,
        key_name: &str,
        key: u64,
        fields: &FieldSet,
    ) -> StorageResult<()>;
}

// =============================================================================
// SqlPrimaryStore
// =============================================================================

/// Primary store reached through a sqlx SQLite pool.
pub struct SqlPrimaryStore {
    pool: SqlitePool,
}

impl SqlPrimaryStore {
    /// Connect to the primary database at `url`.
    ///
    /// # Errors
    /// Returns error if the url is invalid or the connection fails.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        Ok(Self {
            pool: connect_pool(url).await?,
        })
    }

    /// Create from an existing pool, typically the host's own.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PrimaryStore for SqlPrimaryStore {
    async fn update_columns_to_null(
        &self,
        table: &str,
        key_name: &str,
        key: u64,
        fields: &FieldSet,
    ) -> StorageResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let assignments = fields
            .iter()
            .map(|field| quote_identifier(field).map(|column| format!("{column} = NULL")))
            .collect::<StorageResult<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?",
            quote_identifier(table)?,
            quote_identifier(key_name)?
        );
        let key = i64::try_from(key)
            .map_err(|_| StorageError::invalid_data(format!("key {key} does not fit in a SQL integer")))?;

        sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::write(format!("failed to nullify {table} columns: {e}")))?;
        Ok(())
    }
}

// =============================================================================
// SimPrimaryStore
// =============================================================================

/// A recorded nullify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullifyCall {
    /// Primary table
    pub table: String,
    /// Primary key value
    pub key: u64,
    /// Columns set to NULL
    pub fields: FieldSet,
}

/// Primary store that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct SimPrimaryStore {
    calls: Mutex<Vec<NullifyCall>>,
}

impl SimPrimaryStore {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<NullifyCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PrimaryStore for SimPrimaryStore {
    async fn update_columns_to_null(
        &self,
        table: &str,
        _key_name: &str,
        key: u64,
        fields: &FieldSet,
    ) -> StorageResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(NullifyCall {
                table: table.to_string(),
                key,
                fields: fields.clone(),
            });
        Ok(())
    }
}
