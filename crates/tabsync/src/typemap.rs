//! Abstract field type to MySQL column type mapping.
//!
//! The map is pure and stateless. Types with no entry (layout fields,
//! child-table fields, anything unrecognized) have no physical column and
//! are silently skipped by the sync engine.

use crate::meta::FieldType;

/// Physical column definition for an abstract field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// MySQL type keyword (e.g. "varchar", "int", "text").
    pub sql_type: &'static str,

    /// Length/precision suffix, empty when the type takes none.
    pub length: &'static str,
}

impl TypeDefinition {
    const fn new(sql_type: &'static str, length: &'static str) -> Self {
        Self { sql_type, length }
    }

    /// Render the column type string, honoring a per-field length override.
    pub fn render(&self, length_override: Option<u32>) -> String {
        let length = match length_override {
            Some(n) if !self.length.is_empty() => n.to_string(),
            _ => self.length.to_string(),
        };
        if length.is_empty() {
            self.sql_type.to_string()
        } else {
            format!("{}({})", self.sql_type, length)
        }
    }
}

/// Look up the physical definition for an abstract type.
///
/// Returns `None` for non-physical types; callers skip such fields rather
/// than erroring.
pub fn definition(field_type: &FieldType) -> Option<TypeDefinition> {
    let def = match field_type {
        FieldType::Currency => TypeDefinition::new("decimal", "18,6"),
        FieldType::Int => TypeDefinition::new("int", "11"),
        FieldType::Float => TypeDefinition::new("decimal", "18,6"),
        FieldType::Check => TypeDefinition::new("int", "1"),
        FieldType::SmallText => TypeDefinition::new("text", ""),
        FieldType::LongText => TypeDefinition::new("text", ""),
        FieldType::TextEditor => TypeDefinition::new("longtext", ""),
        FieldType::Date => TypeDefinition::new("date", ""),
        FieldType::Time => TypeDefinition::new("time", ""),
        FieldType::Text => TypeDefinition::new("text", ""),
        FieldType::Data => TypeDefinition::new("varchar", "180"),
        FieldType::Link => TypeDefinition::new("varchar", "180"),
        FieldType::Password => TypeDefinition::new("varchar", "180"),
        FieldType::Select => TypeDefinition::new("varchar", "180"),
        FieldType::ReadOnly => TypeDefinition::new("varchar", "180"),
        FieldType::Binary => TypeDefinition::new("longblob", ""),
        FieldType::ChildTable | FieldType::Other => return None,
    };
    Some(def)
}

/// Whether a MySQL type keyword is a free-text or blob kind.
///
/// The engine cannot index these columns or give them defaults, regardless
/// of what the descriptor asks for.
pub fn is_text_or_blob(sql_type: &str) -> bool {
    matches!(
        sql_type,
        "text" | "tinytext" | "mediumtext" | "longtext" | "blob" | "tinyblob" | "mediumblob"
            | "longblob"
    )
}
