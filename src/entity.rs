//! Entity - In-Memory Record with Dirty Tracking
//!
//! TigerStyle: Explicit current/original snapshots, no hidden state.
//!
//! An entity mirrors one row of the primary store. The host keeps two
//! snapshots of its attributes: the current values and the values last
//! loaded from or persisted to the store. A field is dirty when the two
//! differ. Absent and `null` are the same thing for every comparison.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::constants::KEY_NAME_DEFAULT;
use crate::registry::FieldSet;

/// Field name to value mapping, as returned by a backend retrieve.
pub type FieldValues = BTreeMap<String, Value>;

/// A record observed by the synchronization engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    table: String,
    key_name: String,
    key: u64,
    attributes: FieldValues,
    original: FieldValues,
}

impl Entity {
    /// Create a new, unsaved entity with no attributes.
    ///
    /// # Panics
    /// Panics if the table name is empty.
    #[must_use]
    pub fn new(table: impl Into<String>, key: u64) -> Self {
        let table = table.into();
        assert!(!table.is_empty(), "table cannot be empty");

        Self {
            table,
            key_name: KEY_NAME_DEFAULT.to_string(),
            key,
            attributes: FieldValues::new(),
            original: FieldValues::new(),
        }
    }

    /// Build a clean entity from a row just loaded from the primary store.
    #[must_use]
    pub fn from_row<I, K>(table: impl Into<String>, key: u64, row: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut entity = Self::new(table, key);
        entity.attributes = row.into_iter().map(|(k, v)| (k.into(), v)).collect();
        entity.original = entity.attributes.clone();
        entity
    }

    /// Use a primary key attribute other than `id`.
    #[must_use]
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    /// Set an attribute (builder form of [`Entity::set`]).
    #[must_use]
    pub fn with_attribute(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set(field, value);
        self
    }

    /// Table, and entity type, of this record.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Name of the primary key attribute.
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Primary key value.
    #[must_use]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Current value of a field, `None` when absent or null.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        non_null(&self.attributes, field)
    }

    /// Original value of a field, `None` when absent or null.
    #[must_use]
    pub fn original(&self, field: &str) -> Option<&Value> {
        non_null(&self.original, field)
    }

    /// All current attributes, nulls included.
    #[must_use]
    pub fn attributes(&self) -> &FieldValues {
        &self.attributes
    }

    /// Set the current value of a field.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.attributes.insert(field.into(), value);
    }

    /// Write a value straight into raw storage as both current and original.
    ///
    /// Used when a value comes back from the secondary store: it is the
    /// last-loaded value, so the field stays clean.
    pub fn hydrate(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.original.insert(field.clone(), value.clone());
        self.attributes.insert(field, value);
    }

    /// Whether a field's current value differs from its original value.
    #[must_use]
    pub fn is_dirty(&self, field: &str) -> bool {
        self.value(field) != self.original(field)
    }

    /// Fields whose current value differs from the original, in name order.
    #[must_use]
    pub fn dirty_fields(&self) -> FieldSet {
        let names: BTreeSet<&String> = self.attributes.keys().chain(self.original.keys()).collect();
        names
            .into_iter()
            .filter(|field| self.is_dirty(field))
            .cloned()
            .collect()
    }

    /// Whether no field is dirty.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dirty_fields().is_empty()
    }

    /// Mark the current attributes as persisted.
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }
}

fn non_null<'a>(map: &'a FieldValues, field: &str) -> Option<&'a Value> {
    map.get(field).filter(|v| !v.is_null())
}
