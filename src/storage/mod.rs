//! Storage - Backend Trait and Implementations
//!
//! TigerStyle: Abstract storage with simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageBackend Trait                      │
//! │        retrieve / persist / delete over a FieldSet           │
//! └─────────────────────────────────────────────────────────────┘
//!       ↑                  ↑                  ↑               ↑
//! ┌─────┴──────┐   ┌───────┴──────┐   ┌───────┴──────┐  ┌─────┴─────┐
//! │ Filesystem │   │    Dynamo    │   │   Database   │  │    Sim    │
//! │  (Disk)    │   │(KeyValue API)│   │   (sqlx)     │  │ (testing) │
//! └────────────┘   └──────────────┘   └──────────────┘  └───────────┘
//! ```
//!
//! # Simulation-First
//!
//! SimStorageBackend records every call and supports fault injection, so the
//! engine is tested without any real medium.

mod backend;
mod database;
mod driver;
mod dynamo;
mod error;
mod filesystem;
mod identifier;
mod sharding;
mod sim;

pub use backend::StorageBackend;
pub use database::{connect_pool, DatabaseBackend};
pub use driver::connect;
pub use dynamo::{aws_client, from_attribute, to_attribute, DynamoBackend, Item, KeyValueClient};
pub use error::{StorageError, StorageResult};
pub use filesystem::{Disk, FilesystemBackend, LocalDisk};
pub use identifier::validate_identifier;
pub use sharding::ShardingScheme;
pub use sim::{SimCall, SimItemStore, SimStorageBackend};

pub(crate) use identifier::quote_identifier;
