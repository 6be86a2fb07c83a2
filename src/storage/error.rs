//! StorageError - Backend Failure Normalization
//!
//! TigerStyle: One error type for every medium. A field that is simply not
//! stored is never an error; it is absent from the result.

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of the medium behind a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The medium could not be reached or configured.
    #[error("connection error: {0}")]
    Connection(String),

    /// Reading from the medium failed.
    #[error("read error: {0}")]
    Read(String),

    /// Writing to or deleting from the medium failed.
    #[error("write error: {0}")]
    Write(String),

    /// A shard directory could not be created.
    #[error("directory error: {0}")]
    Directory(String),

    /// The medium returned, or was asked to store, malformed data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a read error.
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    /// Create a write error.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create a directory error.
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}
