//! ShardingScheme - Filesystem Layout of Field Files
//!
//! TigerStyle: Pure arithmetic, no I/O.
//!
//! ```text
//! key / files_per_folder = 12345  ->  "12" / "34" / "5"
//! posts/12/34/5/123456@body.json
//! ```
//!
//! Each folder holds at most `files_per_folder` keys (times the number of
//! fields), and every directory level fans out to at most 100 children.

use crate::constants::{
    FIELD_FILE_EXTENSION, FIELD_FILE_SEPARATOR, FILES_PER_FOLDER_DEFAULT, SHARD_SEGMENT_DIGITS,
};

/// Maps (table, key, field) to a relative file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardingScheme {
    files_per_folder: u64,
}

impl ShardingScheme {
    /// Create a scheme with the given bucket size.
    ///
    /// # Panics
    /// Panics if `files_per_folder` is zero.
    #[must_use]
    pub fn new(files_per_folder: u64) -> Self {
        assert!(files_per_folder > 0, "files_per_folder must be positive");
        Self { files_per_folder }
    }

    /// Bucket size.
    #[must_use]
    pub fn files_per_folder(&self) -> u64 {
        self.files_per_folder
    }

    /// Directory levels below the table folder for a key.
    #[must_use]
    pub fn segments(&self, key: u64) -> Vec<String> {
        let quotient = (key / self.files_per_folder).to_string();
        quotient
            .as_bytes()
            .chunks(SHARD_SEGMENT_DIGITS)
            .map(|chunk| chunk.iter().copied().map(char::from).collect::<String>())
            .collect()
    }

    /// Folder holding every field file of a key.
    #[must_use]
    pub fn folder(&self, table: &str, key: u64) -> String {
        let mut folder = table.to_string();
        for segment in self.segments(key) {
            folder.push('/');
            folder.push_str(&segment);
        }
        folder
    }

    /// File name of one field of a key.
    #[must_use]
    pub fn file_name(key: u64, field: &str) -> String {
        format!("{key}{FIELD_FILE_SEPARATOR}{field}.{FIELD_FILE_EXTENSION}")
    }

    /// Full relative path of one field of a key.
    #[must_use]
    pub fn path(&self, table: &str, key: u64, field: &str) -> String {
        format!("{}/{}", self.folder(table, key), Self::file_name(key, field))
    }
}

impl Default for ShardingScheme {
    fn default() -> Self {
        Self::new(FILES_PER_FOLDER_DEFAULT)
    }
}
