//! TigerStyle Constants
//!
//! Limits and defaults shared across the engine and the storage backends.

/// Default number of field files grouped under one shard folder
pub const FILES_PER_FOLDER_DEFAULT: u64 = 1000;

/// Number of decimal digits per shard directory level
pub const SHARD_SEGMENT_DIGITS: usize = 2;

/// Separator between the entity key and the field name in a file name
pub const FIELD_FILE_SEPARATOR: char = '@';

/// Extension of a serialized field file
pub const FIELD_FILE_EXTENSION: &str = "json";

/// Default name of the primary key attribute
pub const KEY_NAME_DEFAULT: &str = "id";

/// Maximum length of a table, column or field identifier in bytes
pub const IDENTIFIER_BYTES_MAX: usize = 64;

/// Maximum nesting depth accepted when marshalling JSON to DynamoDB
pub const ATTRIBUTE_DEPTH_MAX: usize = 32;

/// Default root directory of the filesystem backend
pub const FS_ROOT_DEFAULT: &str = "./storage/synced-fields";

/// Default DynamoDB endpoint (local DynamoDB)
pub const DYNAMO_ENDPOINT_DEFAULT: &str = "http://localhost:8000";

/// Default DynamoDB region
pub const DYNAMO_REGION_DEFAULT: &str = "us-east-1";

/// Default SQL database URL of the relational backend
pub const DATABASE_URL_DEFAULT: &str = "sqlite://synced-fields.db";

/// Maximum connections held by the relational backend pool
pub const DATABASE_CONNECTIONS_MAX: u32 = 5;
