//! Configuration - Environment-Driven Settings
//!
//! Every setting has a default, so an empty environment yields a working
//! filesystem configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `SYNCED_FIELDS_ENABLED` | `true` |
//! | `SYNCED_FIELDS_DRIVER` | `filesystem` |
//! | `SYNCED_FIELDS_FS_ROOT` | `./storage/synced-fields` |
//! | `SYNCED_FIELDS_FILES_PER_FOLDER` | `1000` |
//! | `SYNCED_FIELDS_DYNAMO_ENDPOINT` | `http://localhost:8000` |
//! | `SYNCED_FIELDS_DYNAMO_REGION` | `us-east-1` |
//! | `SYNCED_FIELDS_DYNAMO_KEY` | empty |
//! | `SYNCED_FIELDS_DYNAMO_SECRET` | empty |
//! | `SYNCED_FIELDS_DATABASE_URL` | `sqlite://synced-fields.db` |
//! | `SYNCED_FIELDS_REPLICATE` | `true` |
//!
//! An empty `SYNCED_FIELDS_DYNAMO_ENDPOINT` falls back to the AWS endpoint
//! for the region.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DATABASE_URL_DEFAULT, DYNAMO_ENDPOINT_DEFAULT, DYNAMO_REGION_DEFAULT, FILES_PER_FOLDER_DEFAULT,
    FS_ROOT_DEFAULT,
};
use crate::engine::SyncOptions;

const ENV_PREFIX: &str = "SYNCED_FIELDS_";

/// Configuration parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value of the wrong shape
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Full variable name
        name: String,
        /// Raw value found
        value: String,
    },

    /// Driver name is not one of the known backends
    #[error("unknown driver: {0:?} (expected filesystem, dynamo or database)")]
    UnknownDriver(String),

    /// Bucket size must be positive
    #[error("files per folder must be greater than zero")]
    ZeroFilesPerFolder,
}

/// Storage backend variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// One JSON file per field
    #[default]
    Filesystem,
    /// One key-value item per entity
    Dynamo,
    /// One row per entity in a secondary SQL table
    Database,
}

impl FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filesystem" => Ok(Self::Filesystem),
            "dynamo" | "dynamodb" => Ok(Self::Dynamo),
            "database" => Ok(Self::Database),
            _ => Err(ConfigError::UnknownDriver(s.to_string())),
        }
    }
}

/// Filesystem backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Directory every table folder lives under
    pub root: PathBuf,
    /// Keys per shard bucket
    pub files_per_folder: u64,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(FS_ROOT_DEFAULT),
            files_per_folder: FILES_PER_FOLDER_DEFAULT,
        }
    }
}

/// Key-value backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamoConfig {
    /// Endpoint override; `None` uses the AWS endpoint for the region
    pub endpoint: Option<String>,
    /// AWS region
    pub region: String,
    /// Static access key id
    pub access_key: String,
    /// Static secret access key
    pub secret_key: String,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(DYNAMO_ENDPOINT_DEFAULT.to_string()),
            region: DYNAMO_REGION_DEFAULT.to_string(),
            access_key: String::new(),
            secret_key: String::new(),
        }
    }
}

/// Relational backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection url of the secondary database
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DATABASE_URL_DEFAULT.to_string(),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Master switch for every hook
    pub enabled: bool,
    /// Backend variant
    pub driver: DriverKind,
    /// Filesystem backend settings
    pub filesystem: FilesystemConfig,
    /// Key-value backend settings
    pub dynamo: DynamoConfig,
    /// Relational backend settings
    pub database: DatabaseConfig,
    /// Keep a full copy in the primary row
    pub replicate: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: DriverKind::default(),
            filesystem: FilesystemConfig::default(),
            dynamo: DynamoConfig::default(),
            database: DatabaseConfig::default(),
            replicate: true,
        }
    }
}

impl SyncConfig {
    /// Load from `SYNCED_FIELDS_*` process environment variables.
    ///
    /// # Errors
    /// Returns error if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load using an arbitrary lookup. `lookup` receives the full variable
    /// name, prefix included.
    ///
    /// # Errors
    /// Returns error if a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut config = Self::default();

        if let Some(raw) = get("ENABLED") {
            config.enabled = parse_bool("ENABLED", &raw)?;
        }
        if let Some(raw) = get("DRIVER") {
            config.driver = raw.parse()?;
        }
        if let Some(raw) = get("FS_ROOT") {
            config.filesystem.root = PathBuf::from(shellexpand::tilde(raw.trim()).into_owned());
        }
        if let Some(raw) = get("FILES_PER_FOLDER") {
            let files_per_folder: u64 = raw.trim().parse().map_err(|_| invalid("FILES_PER_FOLDER", &raw))?;
            if files_per_folder == 0 {
                return Err(ConfigError::ZeroFilesPerFolder);
            }
            config.filesystem.files_per_folder = files_per_folder;
        }
        if let Some(raw) = get("DYNAMO_ENDPOINT") {
            let endpoint = raw.trim();
            config.dynamo.endpoint = (!endpoint.is_empty()).then(|| endpoint.to_string());
        }
        if let Some(raw) = get("DYNAMO_REGION") {
            config.dynamo.region = raw.trim().to_string();
        }
        if let Some(raw) = get("DYNAMO_KEY") {
            config.dynamo.access_key = raw;
        }
        if let Some(raw) = get("DYNAMO_SECRET") {
            config.dynamo.secret_key = raw;
        }
        if let Some(raw) = get("DATABASE_URL") {
            let url = raw.trim();
            if url.is_empty() {
                return Err(invalid("DATABASE_URL", &raw));
            }
            config.database.url = url.to_string();
        }
        if let Some(raw) = get("REPLICATE") {
            config.replicate = parse_bool("REPLICATE", &raw)?;
        }

        Ok(config)
    }

    /// Engine switches derived from this configuration.
    #[must_use]
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            enabled: self.enabled,
            replicate: self.replicate,
        }
    }
}

fn invalid(suffix: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: format!("{ENV_PREFIX}{suffix}"),
        value: value.to_string(),
    }
}

fn parse_bool(suffix: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(suffix, raw)),
    }
}
