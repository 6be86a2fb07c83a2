//! Registry - Synchronized Field Declarations
//!
//! TigerStyle: Field sets are declared once per entity type at startup and
//! never mutated afterwards. Temporary narrowing goes through
//! [`crate::scope::FieldScope`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// FieldSet
// =============================================================================

/// Ordered, de-duplicated set of field names.
///
/// Order is declaration order; every set operation keeps the order of the
/// left-hand operand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(Vec<String>);

impl FieldSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the set holds `field`.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|f| f == field)
    }

    /// Add a field at the end, unless already present.
    pub fn insert(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.contains(&field) {
            self.0.push(field);
        }
    }

    /// Iterate over field names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Fields of `self` that are also in `other`.
    #[must_use]
    pub fn intersect(&self, other: &FieldSet) -> FieldSet {
        self.filter(|field| other.contains(field))
    }

    /// Fields of `self` that are not in `other`.
    #[must_use]
    pub fn without(&self, other: &FieldSet) -> FieldSet {
        self.filter(|field| !other.contains(field))
    }

    /// Fields of `self` matching a predicate.
    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&str) -> bool) -> FieldSet {
        Self(self.0.iter().filter(|f| predicate(f)).cloned().collect())
    }

    /// Field names as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for FieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

// =============================================================================
// SyncedType
// =============================================================================

/// Declaration of one entity type taking part in synchronization.
#[derive(Debug, Clone)]
pub struct SyncedType {
    table: String,
    fields: FieldSet,
    soft_deletes: bool,
}

impl SyncedType {
    /// Declare a type by its table name.
    ///
    /// # Panics
    /// Panics if the table name is empty.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        assert!(!table.is_empty(), "table cannot be empty");

        Self {
            table,
            fields: FieldSet::new(),
            soft_deletes: false,
        }
    }

    /// Set the synchronized fields.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().collect();
        self
    }

    /// Mark the type as soft-deletable: a soft delete keeps its stored fields.
    #[must_use]
    pub fn soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

// =============================================================================
// FieldRegistry
// =============================================================================

/// Synchronized field sets of every registered entity type.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    types: HashMap<String, SyncedType>,
}

impl FieldRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type (builder form).
    #[must_use]
    pub fn with(mut self, synced: SyncedType) -> Self {
        self.register(synced);
        self
    }

    /// Register a type, replacing a previous declaration for the same table.
    pub fn register(&mut self, synced: SyncedType) {
        tracing::debug!(table = %synced.table, fields = %synced.fields, "registered synchronized type");
        self.types.insert(synced.table.clone(), synced);
    }

    /// Declared fields of a type; empty for unknown types.
    #[must_use]
    pub fn fields(&self, table: &str) -> FieldSet {
        self.types
            .get(table)
            .map(|t| t.fields.clone())
            .unwrap_or_default()
    }

    /// Whether a type supports soft deletes.
    #[must_use]
    pub fn soft_deletes(&self, table: &str) -> bool {
        self.types.get(table).is_some_and(|t| t.soft_deletes)
    }

    /// Whether a type is registered.
    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.types.contains_key(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(fields: &[&str]) -> FieldSet {
        fields.iter().copied().collect()
    }

    #[test]
    fn test_field_set_dedups_in_order() {
        let fields = set(&["b", "a", "b", "c"]);
        assert_eq!(fields.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_field_set_operations_keep_left_order() {
        let declared = set(&["sync_field", "another_sync_field", "third"]);
        let dirty = set(&["third", "sync_field", "title"]);

        assert_eq!(declared.intersect(&dirty), set(&["sync_field", "third"]));
        assert_eq!(declared.without(&dirty), set(&["another_sync_field"]));
    }

    #[test]
    fn test_field_set_display_and_serialize() {
        let fields = set(&["a", "b"]);
        assert_eq!(fields.to_string(), "[a, b]");
        assert_eq!(serde_json::to_string(&fields).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = FieldRegistry::new()
            .with(SyncedType::new("posts").fields(["sync_field", "another_sync_field"]))
            .with(SyncedType::new("comments").fields(["body"]).soft_deletes());

        assert_eq!(registry.fields("posts"), set(&["sync_field", "another_sync_field"]));
        assert!(!registry.soft_deletes("posts"));
        assert!(registry.soft_deletes("comments"));
        assert!(registry.contains("comments"));
    }

    #[test]
    fn test_registry_unknown_type_is_empty() {
        let registry = FieldRegistry::new();
        assert!(registry.fields("missing").is_empty());
        assert!(!registry.soft_deletes("missing"));
    }
}
