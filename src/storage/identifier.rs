//! Identifier checks for table and field names.
//!
//! Names end up in SQL statements and in file paths, so both backends accept
//! only ASCII alphanumerics and `_`, not starting with a digit.

use super::error::{StorageError, StorageResult};
use crate::constants::IDENTIFIER_BYTES_MAX;

/// Check that a table or field name is a plain identifier.
///
/// # Errors
/// Returns `InvalidData` for empty, overlong or non-identifier names.
pub fn validate_identifier(name: &str) -> StorageResult<&str> {
    let valid = !name.is_empty()
        && name.len() <= IDENTIFIER_BYTES_MAX
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(StorageError::invalid_data(format!("invalid identifier: {name:?}")));
    }
    Ok(name)
}

/// Validate and double-quote a table or column name for SQL.
pub(crate) fn quote_identifier(name: &str) -> StorageResult<String> {
    validate_identifier(name).map(|name| format!("\"{name}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_names() {
        assert_eq!(validate_identifier("sync_field").unwrap(), "sync_field");
        assert_eq!(validate_identifier("_private2").unwrap(), "_private2");
        assert_eq!(quote_identifier("sync_field").unwrap(), "\"sync_field\"");
    }

    #[test]
    fn test_rejects_paths_and_sql() {
        for name in ["", "1field", "a-b", "../x", "a/b", "x@y", "a\"; --", "é"] {
            assert!(
                matches!(validate_identifier(name), Err(StorageError::InvalidData(_))),
                "{name:?} accepted"
            );
        }
        assert!(validate_identifier(&"a".repeat(IDENTIFIER_BYTES_MAX + 1)).is_err());
    }
}
