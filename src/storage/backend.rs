//! StorageBackend - Secondary Store Contract
//!
//! TigerStyle: One trait, every medium behind it.

use async_trait::async_trait;

use super::error::StorageResult;
use crate::entity::{Entity, FieldValues};
use crate::registry::FieldSet;

/// A secondary store for synchronized fields.
///
/// Implementations must:
/// - never treat a missing field as an error (it is absent from the result)
/// - remove the stored value of a field whose current value is null
/// - map every medium failure into [`super::StorageError`]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Load the requested fields of an entity.
    ///
    /// Returns only the fields actually found.
    async fn retrieve(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldValues>;

    /// Store the current values of the requested fields.
    ///
    /// Returns the fields that were written. Null fields are deleted from
    /// the store and left out of the result.
    async fn persist(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldSet>;

    /// Remove the stored values of the requested fields.
    async fn delete(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<()>;
}
