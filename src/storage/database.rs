//! DatabaseBackend - Secondary SQL Table
//!
//! TigerStyle: One row per entity, one column per field, JSON text payloads.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS posts (
//!     id INTEGER PRIMARY KEY,
//!     body TEXT,
//!     summary TEXT
//! );
//! ```
//!
//! The secondary table has the same name and key column as the primary
//! table, but lives in its own database. Field names become column names, so
//! every identifier is validated and quoted before it reaches SQL.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::identifier::quote_identifier;
use crate::constants::DATABASE_CONNECTIONS_MAX;
use crate::entity::{Entity, FieldValues};
use crate::registry::FieldSet;

// =============================================================================
// Connection Helpers
// =============================================================================

/// Open a SQLite pool, creating the database file when missing.
///
/// In-memory databases get a single, never-recycled connection so every
/// query sees the same database.
pub async fn connect_pool(url: &str) -> StorageResult<SqlitePool> {
    assert!(!url.is_empty(), "database url cannot be empty");

    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| StorageError::connection(format!("invalid database url {url}: {e}")))?
        .create_if_missing(true);

    let pool_options = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(DATABASE_CONNECTIONS_MAX)
    };

    pool_options
        .connect_with(options)
        .await
        .map_err(|e| StorageError::connection(format!("failed to connect: {e}")))
}

/// SQLite integer form of an entity key.
pub(crate) fn sql_key(entity: &Entity) -> StorageResult<i64> {
    i64::try_from(entity.key())
        .map_err(|_| StorageError::invalid_data(format!("key {} does not fit in a SQL integer", entity.key())))
}

// =============================================================================
// DatabaseBackend
// =============================================================================

/// Stores synchronized fields as columns of a secondary SQL table.
pub struct DatabaseBackend {
    pool: SqlitePool,
}

impl DatabaseBackend {
    /// Connect to the database at `url`.
    ///
    /// # Errors
    /// Returns error if the url is invalid or the connection fails.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let pool = connect_pool(url).await?;
        tracing::info!(url = url, "connected relational backend");
        Ok(Self { pool })
    }

    /// Create from an existing pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the secondary table of a type if it does not exist.
    pub async fn create_table(&self, table: &str, key_name: &str, fields: &FieldSet) -> StorageResult<()> {
        let mut columns = vec![format!("{} INTEGER PRIMARY KEY", quote_identifier(key_name)?)];
        for field in fields.iter() {
            columns.push(format!("{} TEXT", quote_identifier(field)?));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(table)?,
            columns.join(", ")
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::write(format!("failed to create table {table}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for DatabaseBackend {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn retrieve(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldValues> {
        if fields.is_empty() {
            return Ok(FieldValues::new());
        }

        let columns = fields
            .iter()
            .map(quote_identifier)
            .collect::<StorageResult<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM {} WHERE {} = ?",
            quote_identifier(entity.table())?,
            quote_identifier(entity.key_name())?
        );

        let row = sqlx::query(&sql)
            .bind(sql_key(entity)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::read(format!("failed to select {}: {e}", entity.table())))?;

        let Some(row) = row else {
            return Ok(FieldValues::new());
        };

        let mut values = FieldValues::new();
        for field in fields.iter() {
            let raw: Option<String> = row
                .try_get(field)
                .map_err(|e| StorageError::read(format!("failed to read column {field}: {e}")))?;

            if let Some(raw) = raw {
                let value = serde_json::from_str(&raw)
                    .map_err(|e| StorageError::invalid_data(format!("column {field} is not valid JSON: {e}")))?;
                values.insert(field.to_string(), value);
            }
        }
        Ok(values)
    }

    async fn persist(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldSet> {
        if fields.is_empty() {
            return Ok(FieldSet::new());
        }

        let key_column = quote_identifier(entity.key_name())?;
        let mut columns = vec![key_column.clone()];
        let mut updates = Vec::with_capacity(fields.len());
        let mut payloads = Vec::with_capacity(fields.len());
        let mut written = FieldSet::new();

        for field in fields.iter() {
            let column = quote_identifier(field)?;
            updates.push(format!("{column} = excluded.{column}"));
            columns.push(column);

            match entity.value(field) {
                None => payloads.push(None),
                Some(value) => {
                    let payload = serde_json::to_string(value)
                        .map_err(|e| StorageError::invalid_data(format!("cannot encode {field}: {e}")))?;
                    payloads.push(Some(payload));
                    written.insert(field);
                }
            }
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT({key_column}) DO UPDATE SET {}",
            quote_identifier(entity.table())?,
            columns.join(", "),
            updates.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(sql_key(entity)?);
        for payload in payloads {
            query = query.bind(payload);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::write(format!("failed to upsert {}: {e}", entity.table())))?;

        tracing::debug!(
            table = entity.table(),
            key = entity.key(),
            written = %written,
            "upserted secondary row"
        );
        Ok(written)
    }

    /// Removes the whole secondary row, whatever fields are requested.
    async fn delete(&self, entity: &Entity, _fields: &FieldSet) -> StorageResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(entity.table())?,
            quote_identifier(entity.key_name())?
        );

        sqlx::query(&sql)
            .bind(sql_key(entity)?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::write(format!("failed to delete from {}: {e}", entity.table())))?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
