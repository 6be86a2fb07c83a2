//! DynamoBackend - One Item per Entity
//!
//! TigerStyle: Whole-item writes, explicit marshalling.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DynamoBackend                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Table: entity table name                                    │
//! │  Item:  { <key_name>: N(key), <field>: <marshalled JSON> }   │
//! │  Client: get_item / put_item / delete_item                   │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │  SimItemStore   │           │ aws DynamoDB    │
//! │   (testing)     │           │    Client       │
//! └─────────────────┘           └─────────────────┘
//! ```
//!
//! `persist` replaces the whole item. Fields not passed to `persist` are
//! dropped from the item, so a partial save loses the other fields stored
//! for the same key. Use a full field set (force synchronization) when the
//! item must be rewritten completely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use crate::config::DynamoConfig;
use crate::constants::ATTRIBUTE_DEPTH_MAX;
use crate::entity::{Entity, FieldValues};
use crate::registry::FieldSet;

/// A DynamoDB item.
pub type Item = HashMap<String, AttributeValue>;

// =============================================================================
// KeyValueClient
// =============================================================================

/// Item-level operations of a key-value medium.
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    /// Fetch the named attributes of an item; `None` when there is no item.
    async fn get_item(&self, table: &str, key: Item, attributes: &[String]) -> StorageResult<Option<Item>>;

    /// Create or replace the item under `key`; the stored item is `key`
    /// merged with `attributes`.
    async fn put_item(&self, table: &str, key: Item, attributes: Item) -> StorageResult<()>;

    /// Remove an item; removing a missing item succeeds.
    async fn delete_item(&self, table: &str, key: Item) -> StorageResult<()>;
}

#[async_trait]
impl KeyValueClient for aws_sdk_dynamodb::Client {
    async fn get_item(&self, table: &str, key: Item, attributes: &[String]) -> StorageResult<Option<Item>> {
        let output = self
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .set_attributes_to_get((!attributes.is_empty()).then(|| attributes.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::read(format!("get_item on {table} failed: {}", DisplayErrorContext(e))))?;

        Ok(output.item().cloned())
    }

    async fn put_item(&self, table: &str, key: Item, attributes: Item) -> StorageResult<()> {
        let mut item = attributes;
        item.extend(key);

        self.put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| StorageError::write(format!("put_item on {table} failed: {}", DisplayErrorContext(e))))?;
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> StorageResult<()> {
        self.delete_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| StorageError::write(format!("delete_item on {table} failed: {}", DisplayErrorContext(e))))?;
        Ok(())
    }
}

/// Build a DynamoDB client from static configuration.
pub async fn aws_client(config: &DynamoConfig) -> aws_sdk_dynamodb::Client {
    let credentials = Credentials::new(
        config.access_key.clone(),
        config.secret_key.clone(),
        None,
        None,
        "synced-fields",
    );

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let shared = loader.load().await;
    tracing::info!(region = %config.region, endpoint = ?config.endpoint, "created DynamoDB client");
    aws_sdk_dynamodb::Client::new(&shared)
}

// =============================================================================
// Marshalling
// =============================================================================

/// Convert a JSON value into a DynamoDB attribute.
pub fn to_attribute(value: &Value) -> StorageResult<AttributeValue> {
    to_attribute_at(value, 0)
}

fn to_attribute_at(value: &Value, depth: usize) -> StorageResult<AttributeValue> {
    if depth > ATTRIBUTE_DEPTH_MAX {
        return Err(StorageError::invalid_data(format!(
            "value nested deeper than {ATTRIBUTE_DEPTH_MAX} levels"
        )));
    }

    Ok(match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(
            items
                .iter()
                .map(|item| to_attribute_at(item, depth + 1))
                .collect::<StorageResult<_>>()?,
        ),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| Ok::<_, StorageError>((k.clone(), to_attribute_at(v, depth + 1)?)))
                .collect::<StorageResult<_>>()?,
        ),
    })
}

/// Convert a DynamoDB attribute back into JSON.
pub fn from_attribute(attribute: &AttributeValue) -> StorageResult<Value> {
    Ok(match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(items) => Value::Array(items.iter().map(from_attribute).collect::<StorageResult<_>>()?),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok::<_, StorageError>((k.clone(), from_attribute(v)?)))
                .collect::<StorageResult<Map<_, _>>>()?,
        ),
        AttributeValue::Ss(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<StorageResult<_>>()?,
        ),
        other => {
            return Err(StorageError::invalid_data(format!(
                "unsupported DynamoDB attribute: {other:?}"
            )))
        }
    })
}

fn parse_number(raw: &str) -> StorageResult<Number> {
    raw.parse::<Number>()
        .map_err(|e| StorageError::invalid_data(format!("invalid DynamoDB number {raw:?}: {e}")))
}

// =============================================================================
// DynamoBackend
// =============================================================================

/// Stores the synchronized fields of an entity as one DynamoDB item.
pub struct DynamoBackend {
    client: Arc<dyn KeyValueClient>,
}

impl DynamoBackend {
    /// Create a backend over any key-value client.
    #[must_use]
    pub fn new(client: Arc<dyn KeyValueClient>) -> Self {
        Self { client }
    }

    fn key(entity: &Entity) -> Item {
        HashMap::from([(
            entity.key_name().to_string(),
            AttributeValue::N(entity.key().to_string()),
        )])
    }
}

#[async_trait]
impl StorageBackend for DynamoBackend {
    fn name(&self) -> &'static str {
        "dynamo"
    }

    async fn retrieve(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldValues> {
        let item = self
            .client
            .get_item(entity.table(), Self::key(entity), fields.as_slice())
            .await?;

        let Some(item) = item else {
            return Ok(FieldValues::new());
        };

        let mut values = FieldValues::new();
        for field in fields.iter() {
            if let Some(attribute) = item.get(field) {
                values.insert(field.to_string(), from_attribute(attribute)?);
            }
        }
        Ok(values)
    }

    async fn persist(&self, entity: &Entity, fields: &FieldSet) -> StorageResult<FieldSet> {
        let mut attributes = Item::new();
        let mut written = FieldSet::new();

        for field in fields.iter() {
            if let Some(value) = entity.value(field) {
                attributes.insert(field.to_string(), to_attribute(value)?);
                written.insert(field);
            }
        }

        self.client
            .put_item(entity.table(), Self::key(entity), attributes)
            .await?;

        tracing::debug!(
            table = entity.table(),
            key = entity.key(),
            written = %written,
            "put item to DynamoDB"
        );
        Ok(written)
    }

    /// Removes the whole item, whatever fields are requested.
    async fn delete(&self, entity: &Entity, _fields: &FieldSet) -> StorageResult<()> {
        self.client.delete_item(entity.table(), Self::key(entity)).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sim::SimItemStore;
    use serde_json::json;

    fn fields(names: &[&str]) -> FieldSet {
        names.iter().copied().collect()
    }

    fn backend() -> (Arc<SimItemStore>, DynamoBackend) {
        let store = Arc::new(SimItemStore::new());
        let backend = DynamoBackend::new(store.clone());
        (store, backend)
    }

    #[test]
    fn test_marshal_round_trip_keeps_structure() {
        let value = json!({"key": "value", "n": 3, "f": 1.5, "ok": true, "none": null, "list": [1, "a"]});
        let attribute = to_attribute(&value).unwrap();
        assert!(matches!(attribute, AttributeValue::M(_)));
        assert_eq!(from_attribute(&attribute).unwrap(), value);
    }

    #[test]
    fn test_string_set_unmarshals_to_array() {
        let attribute = AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(from_attribute(&attribute).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = from_attribute(&AttributeValue::N("twelve".to_string())).unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let mut value = json!("leaf");
        for _ in 0..=ATTRIBUTE_DEPTH_MAX + 1 {
            value = json!([value]);
        }
        assert!(to_attribute(&value).is_err());
    }

    #[tokio::test]
    async fn test_retrieve_returns_requested_attributes_only() {
        let (store, backend) = backend();
        let entity = Entity::new("test_models", 1)
            .with_attribute("test_field", json!({"key": "value"}))
            .with_attribute("other", json!("x"));
        backend.persist(&entity, &fields(&["test_field", "other"])).await.unwrap();

        let values = backend.retrieve(&entity, &fields(&["test_field"])).await.unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values.get("test_field"), Some(&json!({"key": "value"})));
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_missing_item_is_empty() {
        let (_, backend) = backend();
        let values = backend
            .retrieve(&Entity::new("test_models", 1), &fields(&["test_field"]))
            .await
            .unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_persist_stores_key_and_skips_nulls() {
        let (store, backend) = backend();
        let entity = Entity::new("test_models", 9)
            .with_attribute("a", json!("x"))
            .with_attribute("b", Value::Null);

        let written = backend.persist(&entity, &fields(&["a", "b"])).await.unwrap();
        assert_eq!(written, fields(&["a"]));

        let item = store.item("test_models", "id", 9).unwrap();
        assert_eq!(item.get("id"), Some(&AttributeValue::N("9".to_string())));
        assert!(item.contains_key("a"));
        assert!(!item.contains_key("b"));
    }

    #[tokio::test]
    async fn test_persist_replaces_whole_item() {
        let (_, backend) = backend();
        let full = Entity::new("test_models", 1)
            .with_attribute("a", json!(1))
            .with_attribute("b", json!(2));
        backend.persist(&full, &fields(&["a", "b"])).await.unwrap();

        backend.persist(&full, &fields(&["a"])).await.unwrap();

        let values = backend.retrieve(&full, &fields(&["a", "b"])).await.unwrap();
        assert_eq!(values.len(), 1);
        assert!(values.contains_key("a"));
    }

    #[tokio::test]
    async fn test_numeric_and_nested_values_round_trip() {
        let (store, backend) = backend();
        let entity = Entity::new("test_models", 1)
            .with_attribute("a", json!(10))
            .with_attribute("b", json!(true))
            .with_attribute("c", json!({"n": 2.5, "tags": ["x", 3], "inner": {"ok": false}}));
        let requested = fields(&["a", "b", "c"]);

        backend.persist(&entity, &requested).await.unwrap();
        let values = backend.retrieve(&Entity::new("test_models", 1), &requested).await.unwrap();

        assert_eq!(values.get("a"), Some(&json!(10)));
        assert_eq!(values.get("b"), Some(&json!(true)));
        assert_eq!(
            values.get("c"),
            Some(&json!({"n": 2.5, "tags": ["x", 3], "inner": {"ok": false}}))
        );
        assert_eq!(
            store.item("test_models", "id", 1).unwrap().get("id"),
            Some(&AttributeValue::N("1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_numeric_fields_never_become_the_key() {
        let (store, backend) = backend();
        for key in 1..=50 {
            let entity = Entity::new("test_models", key)
                .with_attribute("a", json!(key * 10))
                .with_attribute("b", json!(key * 20));
            backend.persist(&entity, &fields(&["a", "b"])).await.unwrap();
        }

        for key in 1..=50 {
            let item = store.item("test_models", "id", key).unwrap();
            assert_eq!(item.get("a"), Some(&AttributeValue::N((key * 10).to_string())));
        }
    }

    #[tokio::test]
    async fn test_persist_is_idempotent() {
        let (store, backend) = backend();
        let entity = Entity::new("test_models", 4)
            .with_attribute("a", json!(1))
            .with_attribute("b", json!({"k": [1, 2]}));
        let requested = fields(&["a", "b"]);

        let first = backend.persist(&entity, &requested).await.unwrap();
        let item_after_first = store.item("test_models", "id", 4).unwrap();
        let second = backend.persist(&entity, &requested).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.item("test_models", "id", 4).unwrap(), item_after_first);
        assert_eq!(backend.retrieve(&entity, &requested).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_item() {
        let (store, backend) = backend();
        let entity = Entity::new("test_models", 1).with_attribute("a", json!(1));
        backend.persist(&entity, &fields(&["a"])).await.unwrap();

        backend.delete(&entity, &fields(&["a"])).await.unwrap();
        assert!(store.item("test_models", "id", 1).is_none());

        // A second delete of the missing item succeeds.
        backend.delete(&entity, &fields(&["a"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_client_failure_is_storage_error() {
        let (store, backend) = backend();
        store.fail_with("connection refused");

        let err = backend
            .retrieve(&Entity::new("test_models", 1), &fields(&["a"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
