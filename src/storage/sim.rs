//! Simulated Storage - Deterministic In-Memory Media
//!
//! TigerStyle: Simulation-first. Every backend call is recorded, and a
//! failure can be injected to exercise error propagation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::backend::StorageBackend;
use super::dynamo::{Item, KeyValueClient};
use super::error::{StorageError, StorageResult};
use crate::entity::{Entity, FieldValues};
use crate::registry::FieldSet;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// SimStorageBackend
// =============================================================================

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    /// `retrieve` with the requested fields
    Retrieve(FieldSet),
    /// `persist` with the requested fields
    Persist(FieldSet),
    /// `delete` with the requested fields
    Delete(FieldSet),
}

#[derive(Debug, Default)]
struct SimState {
    values: HashMap<(String, u64, String), Value>,
    calls: Vec<SimCall>,
    failure: Option<String>,
}

/// In-memory backend for engine tests.
#[derive(Debug, Default)]
pub struct SimStorageBackend {
    state: Mutex<SimState>,
}

impl SimStorageBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value directly, without recording a call.
    pub fn seed(&self, table: &str, key: u64, field: &str, value: Value) {
        lock(&self.state)
            .values
            .insert((table.to_string(), key, field.to_string()), value);
    }

    /// Stored value of one field.
    #[must_use]
    pub fn stored(&self, table: &str, key: u64, field: &str) -> Option<Value> {
        lock(&self.state)
            .values
            .get(&(table.to_string(), key, field.to_string()))
            .cloned()
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SimCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.state).calls.len()
    }

    /// Make every following call fail with a connection error.
    pub fn fail_with(&self, message: impl Into<String>) {
        lock(&self.state).failure = Some(message.into());
    }

    fn record(&self, call: SimCall) -> StorageResult<MutexGuard<'_, SimState>> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        match &state.failure {
            Some(message) => Err(StorageError::connection(message.clone())),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl StorageBackend for SimStorageBackend {
    fn name(&self) -> &'static str {
        "sim"
    }

    async fn retrieve(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldValues> {
        let state = self.record(SimCall::Retrieve(fields.clone()))?;

        Ok(fields
            .iter()
            .filter_map(|field| {
                state
                    .values
                    .get(&(entity.table().to_string(), entity.key(), field.to_string()))
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect())
    }

    async fn persist(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldSet> {
        let mut state = self.record(SimCall::Persist(fields.clone()))?;

        let mut written = FieldSet::new();
        for field in fields.iter() {
            let slot = (entity.table().to_string(), entity.key(), field.to_string());
            match entity.value(field) {
                None => {
                    state.values.remove(&slot);
                }
                Some(value) => {
                    state.values.insert(slot, value.clone());
                    written.insert(field);
                }
            }
        }
        Ok(written)
    }

    async fn delete(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<()> {
        let mut state = self.record(SimCall::Delete(fields.clone()))?;

        for field in fields.iter() {
            state
                .values
                .remove(&(entity.table().to_string(), entity.key(), field.to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// SimItemStore
// =============================================================================

#[derive(Debug, Default)]
struct ItemState {
    items: HashMap<(String, String), Item>,
    get_calls: usize,
    failure: Option<String>,
}

/// In-memory key-value medium with whole-item replacement semantics.
#[derive(Debug, Default)]
pub struct SimItemStore {
    state: Mutex<ItemState>,
}

impl SimItemStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored item for a numeric key.
    #[must_use]
    pub fn item(&self, table: &str, key_name: &str, key: u64) -> Option<Item> {
        let key = Item::from([(
            key_name.to_string(),
            aws_sdk_dynamodb::types::AttributeValue::N(key.to_string()),
        )]);
        lock(&self.state)
            .items
            .get(&(table.to_string(), key_id(&key)))
            .cloned()
    }

    /// Number of `get_item` calls received.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        lock(&self.state).get_calls
    }

    /// Make every following call fail with a connection error.
    pub fn fail_with(&self, message: impl Into<String>) {
        lock(&self.state).failure = Some(message.into());
    }

    fn checked(&self) -> StorageResult<MutexGuard<'_, ItemState>> {
        let state = lock(&self.state);
        match &state.failure {
            Some(message) => Err(StorageError::connection(message.clone())),
            None => Ok(state),
        }
    }
}

fn key_id(key: &Item) -> String {
    let mut parts: Vec<String> = key.iter().map(|(name, value)| format!("{name}={value:?}")).collect();
    parts.sort();
    parts.join("&")
}

#[async_trait]
impl KeyValueClient for SimItemStore {
    async fn get_item(&self, table: &str, key: Item, attributes: &[String]) -> StorageResult<Option<Item>> {
        let mut state = self.checked()?;
        state.get_calls += 1;

        let item = state.items.get(&(table.to_string(), key_id(&key))).map(|item| {
            item.iter()
                .filter(|(name, _)| attributes.is_empty() || attributes.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        });
        Ok(item)
    }

    async fn put_item(&self, table: &str, key: Item, attributes: Item) -> StorageResult<()> {
        let mut state = self.checked()?;
        let slot = (table.to_string(), key_id(&key));

        let mut item = attributes;
        item.extend(key);
        state.items.insert(slot, item);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> StorageResult<()> {
        let mut state = self.checked()?;
        state.items.remove(&(table.to_string(), key_id(&key)));
        Ok(())
    }
}
