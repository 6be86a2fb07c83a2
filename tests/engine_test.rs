//! End-to-end tests: engine hooks against real media.
//!
//! The primary store is an in-memory SQLite database, the secondary store is
//! a temp directory, a second SQLite database, or the simulated item store.

use std::sync::Arc;

use serde_json::{json, Value};
use synced_fields::{
    storage::connect_pool, DatabaseBackend, DeleteKind, DynamoBackend, Entity, FieldRegistry, FieldSet,
    FilesystemBackend, LifecycleObserver, PrimaryStore, ShardingScheme, SimItemStore, SimPrimaryStore,
    SqlPrimaryStore, StorageBackend, SyncEngine, SyncOptions, SyncedType,
};
use tempfile::tempdir;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").with_test_writer().try_init();
}

fn registry() -> Arc<FieldRegistry> {
    Arc::new(FieldRegistry::new().with(SyncedType::new("posts").fields(["body", "summary"])))
}

fn fields(names: &[&str]) -> FieldSet {
    names.iter().copied().collect()
}

fn text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::String)
}

#[tokio::test]
async fn test_offloaded_field_round_trip_through_filesystem() {
    init_logging();
    let dir = tempdir().unwrap();

    let pool = connect_pool("sqlite::memory:").await.unwrap();
    sqlx::query("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, body TEXT, summary TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO posts (id, title, body) VALUES (1, 'hello', 'a long body')")
        .execute(&pool)
        .await
        .unwrap();

    let engine = SyncEngine::new(
        Arc::new(FilesystemBackend::local(dir.path(), ShardingScheme::default())),
        Arc::new(SqlPrimaryStore::from_pool(pool.clone())),
        registry(),
        SyncOptions {
            enabled: true,
            replicate: false,
        },
    );
    let scope = engine.scope();

    // Host just inserted the row.
    let post = Entity::new("posts", 1)
        .with_attribute("title", json!("hello"))
        .with_attribute("body", json!("a long body"));
    engine.on_save(&scope, &post).await.unwrap();

    assert!(dir.path().join("posts/0/1@body.json").exists());
    assert!(!dir.path().join("posts/0/1@summary.json").exists());

    let (title, body): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT title, body FROM posts WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(title.as_deref(), Some("hello"));
    assert_eq!(body, None);

    // Host loads the row again.
    let mut loaded = Entity::from_row(
        "posts",
        1,
        [("title", text(title)), ("body", text(body)), ("summary", Value::Null)],
    );
    engine.on_load(&scope, &mut loaded).await.unwrap();

    assert_eq!(loaded.value("body"), Some(&json!("a long body")));
    assert_eq!(loaded.value("summary"), None);
    assert!(loaded.is_clean());

    engine.on_delete(&scope, &loaded, DeleteKind::Force).await.unwrap();
    assert!(!dir.path().join("posts/0/1@body.json").exists());
}

#[tokio::test]
async fn test_database_backend_with_scoped_exclusion() {
    init_logging();
    let backend = Arc::new(DatabaseBackend::connect("sqlite::memory:").await.unwrap());
    backend
        .create_table("posts", "id", &fields(&["body", "summary"]))
        .await
        .unwrap();

    let primary = Arc::new(SimPrimaryStore::new());
    let engine = SyncEngine::new(
        Arc::clone(&backend) as Arc<dyn StorageBackend>,
        Arc::clone(&primary) as Arc<dyn PrimaryStore>,
        registry(),
        SyncOptions::default(),
    );
    let scope = engine.scope();

    let post = Entity::new("posts", 7)
        .with_attribute("body", json!({"blocks": [1, 2, 3]}))
        .with_attribute("summary", json!("short"));

    scope
        .without_fields_async("posts", ["summary"], engine.on_save(&scope, &post))
        .await
        .unwrap();
    assert_eq!(scope.active_fields("posts"), fields(&["body", "summary"]));

    let stored = backend
        .retrieve(&Entity::new("posts", 7), &fields(&["body", "summary"]))
        .await
        .unwrap();
    assert_eq!(stored.get("body"), Some(&json!({"blocks": [1, 2, 3]})));
    assert_eq!(stored.get("summary"), None);
    assert!(primary.calls().is_empty());

    let written = engine.force_synchronization(&scope, &post).await.unwrap();
    assert_eq!(written, fields(&["body", "summary"]));
}

#[tokio::test]
async fn test_key_value_save_rewrites_whole_item() {
    init_logging();
    let store = Arc::new(SimItemStore::new());
    let engine = SyncEngine::new(
        Arc::new(DynamoBackend::new(Arc::clone(&store) as Arc<dyn synced_fields::KeyValueClient>)),
        Arc::new(SimPrimaryStore::new()),
        registry(),
        SyncOptions::default(),
    );
    let scope = engine.scope();

    let mut post = Entity::new("posts", 3)
        .with_attribute("body", json!("body text"))
        .with_attribute("summary", json!("summary text"));
    engine.force_synchronization(&scope, &post).await.unwrap();
    assert_eq!(store.item("posts", "id", 3).map(|item| item.len()), Some(3));

    // A partial save only carries the dirty field, so the item loses the rest.
    post.sync_original();
    post.set("body", json!("edited"));
    engine.on_save(&scope, &post).await.unwrap();

    let mut reloaded = Entity::new("posts", 3);
    engine.on_load(&scope, &mut reloaded).await.unwrap();
    assert_eq!(reloaded.value("body"), Some(&json!("edited")));
    assert_eq!(reloaded.value("summary"), None);
}

#[tokio::test]
async fn test_disabled_engine_leaves_everything_untouched() {
    let dir = tempdir().unwrap();
    let primary = Arc::new(SimPrimaryStore::new());
    let engine = SyncEngine::new(
        Arc::new(FilesystemBackend::local(dir.path(), ShardingScheme::new(10))),
        Arc::clone(&primary) as Arc<dyn PrimaryStore>,
        registry(),
        SyncOptions {
            enabled: false,
            replicate: false,
        },
    );
    let scope = engine.scope();

    let post = Entity::new("posts", 123_456).with_attribute("body", json!("x"));
    engine.on_save(&scope, &post).await.unwrap();

    assert!(!dir.path().join("posts").exists());
    assert!(primary.calls().is_empty());
}
