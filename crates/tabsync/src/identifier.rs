//! Identifier validation, normalization, and quoting.
//!
//! SQL identifiers cannot be parameterized, so every identifier that ends up
//! in generated DDL passes through exactly one validation/normalization step
//! here and is backtick-quoted at render time. Nothing downstream
//! re-interpolates unescaped text.

use crate::error::{Result, SyncError};

/// Maximum identifier length (MySQL limit is 64).
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Lowercase a field name and turn spaces into underscores.
///
/// This is the lookup form of a column name. It never fails; charset
/// validation only happens when a column is about to be created, via
/// [`normalize_column_name`].
pub fn normalize(field: &str) -> String {
    field.trim().to_lowercase().replace(' ', "_")
}

/// Normalize a field name into a column name and validate it.
///
/// Normalization lowercases and turns spaces into underscores; the result
/// must then match `^[a-zA-Z_][a-zA-Z0-9_]*$`. A mismatch is a fatal
/// [`SyncError::InvalidFieldName`].
pub fn normalize_column_name(field: &str) -> Result<String> {
    let normalized = normalize(field);

    if normalized.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SyncError::invalid_field_name(
            field,
            format!("name exceeds {MAX_IDENTIFIER_LENGTH} characters"),
        ));
    }

    let mut chars = normalized.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(SyncError::invalid_field_name(field, "name is empty")),
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(SyncError::invalid_field_name(
            field,
            "name must start with a letter or underscore",
        ));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(SyncError::invalid_field_name(
            field,
            format!("name contains invalid character {bad:?}"),
        ));
    }

    Ok(normalized)
}

/// Escape a default value for embedding in a DDL literal.
pub fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("title"), "`title`");
        assert_eq!(quote("tab`X"), "`tab``X`");
    }

    #[test]
    fn test_normalize_lowercases_and_underscores() {
        assert_eq!(normalize_column_name("Customer Name").unwrap(), "customer_name");
        assert_eq!(normalize_column_name("title").unwrap(), "title");
        assert_eq!(normalize_column_name("_hidden").unwrap(), "_hidden");
    }

    #[test]
    fn test_normalize_rejects_leading_digit() {
        let err = normalize_column_name("1field").unwrap_err();
        assert!(matches!(err, SyncError::InvalidFieldName { .. }));
    }

    #[test]
    fn test_normalize_rejects_punctuation() {
        assert!(normalize_column_name("amount($)").is_err());
        assert!(normalize_column_name("a-b").is_err());
        assert!(normalize_column_name("").is_err());
    }

    #[test]
    fn test_normalize_rejects_overlong() {
        assert!(normalize_column_name(&"a".repeat(65)).is_err());
        assert!(normalize_column_name(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("O'Brien"), "O''Brien");
        assert_eq!(escape_value("a\\b"), "a\\\\b");
    }
}
