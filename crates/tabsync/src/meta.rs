//! Record-type metadata: field descriptors and the provider interface.
//!
//! A record type is a named entity whose physical table is derived entirely
//! from a list of [`FieldDescriptor`]s. Descriptors come from two places:
//! the base declaration of the record type, and ad-hoc custom fields
//! registered separately. Custom fields are merged in by name at sync time
//! and are indistinguishable from base fields afterwards.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Abstract field type. The physical column type comes from the type map;
/// types with no mapping (layout/computed fields) produce no column at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Currency,
    Int,
    Float,
    /// Boolean flag, stored as int(1).
    Check,
    SmallText,
    LongText,
    /// Rich text; stored as longtext.
    TextEditor,
    Date,
    Time,
    Text,
    /// Short string, the default for user-entered data.
    Data,
    /// Reference to another record type.
    Link,
    Password,
    Select,
    ReadOnly,
    Binary,
    /// Child rows live in their own table, no column in the parent.
    ChildTable,
    /// Unrecognized type string; treated as non-physical.
    #[serde(other)]
    Other,
}

/// Declarative description of one field of a record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name; becomes the column name after normalization.
    pub name: String,

    /// Abstract type, resolved to a SQL type via the type map.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Override for the mapped type's length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Default value. Shortcut values (resolved at row-write time) are
    /// never baked into the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Whether a single-column index is requested.
    #[serde(default)]
    pub indexed: bool,

    /// Target record type for Link fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

impl FieldDescriptor {
    /// Minimal descriptor with just a name and type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            length: None,
            default: None,
            indexed: false,
            link_target: None,
        }
    }
}

/// Provides field descriptors for record types.
///
/// The sync engine only ever sees the merged view: base fields first, then
/// custom fields overriding or extending by name.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Base field descriptors as declared for the record type.
    async fn fields(&self, record_type: &str) -> Result<Vec<FieldDescriptor>>;

    /// Custom field descriptors registered outside the base declaration.
    async fn custom_fields(&self, record_type: &str) -> Result<Vec<FieldDescriptor>>;

    /// All record type names known to this source.
    async fn record_types(&self) -> Result<Vec<String>>;
}

/// Merge base and custom descriptors by name, custom winning.
/// Base declaration order is preserved; new custom fields append.
pub fn merge_descriptors(
    base: Vec<FieldDescriptor>,
    custom: Vec<FieldDescriptor>,
) -> Vec<FieldDescriptor> {
    let mut merged: IndexMap<String, FieldDescriptor> = base
        .into_iter()
        .map(|f| (f.name.clone(), f))
        .collect();
    for field in custom {
        merged.insert(field.name.clone(), field);
    }
    merged.into_values().collect()
}

/// One record-type declaration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordTypeFile {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}

/// Custom fields file: record type name -> extra descriptors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CustomFieldsFile {
    #[serde(default)]
    custom_fields: HashMap<String, Vec<FieldDescriptor>>,
}

/// File-backed metadata source.
///
/// Reads a directory of `<name>.yaml` record-type files plus an optional
/// `custom_fields.yaml`. Files are loaded once at construction.
pub struct FileMetadataSource {
    record_types: HashMap<String, Vec<FieldDescriptor>>,
    custom: HashMap<String, Vec<FieldDescriptor>>,
    order: Vec<String>,
}

impl FileMetadataSource {
    /// Load all record-type declarations from a directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut record_types = HashMap::new();
        let mut order = Vec::new();
        let mut custom = HashMap::new();

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            let content = std::fs::read_to_string(&path)?;
            if path.file_stem().and_then(|s| s.to_str()) == Some("custom_fields") {
                let file: CustomFieldsFile = serde_yaml::from_str(&content)?;
                custom = file.custom_fields;
            } else {
                let file: RecordTypeFile = serde_yaml::from_str(&content)?;
                if record_types.contains_key(&file.name) {
                    return Err(SyncError::Metadata(format!(
                        "duplicate record type declaration: {}",
                        file.name
                    )));
                }
                order.push(file.name.clone());
                record_types.insert(file.name, file.fields);
            }
        }

        if record_types.is_empty() {
            return Err(SyncError::Metadata(format!(
                "no record type declarations found in {}",
                dir.display()
            )));
        }

        Ok(Self {
            record_types,
            custom,
            order,
        })
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    async fn fields(&self, record_type: &str) -> Result<Vec<FieldDescriptor>> {
        self.record_types
            .get(record_type)
            .cloned()
            .ok_or_else(|| SyncError::Metadata(format!("unknown record type: {record_type}")))
    }

    async fn custom_fields(&self, record_type: &str) -> Result<Vec<FieldDescriptor>> {
        Ok(self.custom.get(record_type).cloned().unwrap_or_default())
    }

    async fn record_types(&self) -> Result<Vec<String>> {
        Ok(self.order.clone())
    }
}

/// In-memory metadata source for tests and embedding.
#[derive(Default)]
pub struct StaticMetadataSource {
    record_types: HashMap<String, Vec<FieldDescriptor>>,
    custom: HashMap<String, Vec<FieldDescriptor>>,
    order: Vec<String>,
}

impl StaticMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record type with its base fields.
    pub fn with_record_type(
        mut self,
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        let name = name.into();
        if !self.record_types.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.record_types.insert(name, fields);
        self
    }

    /// Register custom fields for a record type.
    pub fn with_custom_fields(
        mut self,
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        self.custom.insert(name.into(), fields);
        self
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn fields(&self, record_type: &str) -> Result<Vec<FieldDescriptor>> {
        self.record_types
            .get(record_type)
            .cloned()
            .ok_or_else(|| SyncError::Metadata(format!("unknown record type: {record_type}")))
    }

    async fn custom_fields(&self, record_type: &str) -> Result<Vec<FieldDescriptor>> {
        Ok(self.custom.get(record_type).cloned().unwrap_or_default())
    }

    async fn record_types(&self) -> Result<Vec<String>> {
        Ok(self.order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_merge_custom_overrides_base() {
        let base = vec![
            FieldDescriptor::new("title", FieldType::Data),
            FieldDescriptor::new("notes", FieldType::Text),
        ];
        let custom = vec![
            FieldDescriptor {
                indexed: true,
                ..FieldDescriptor::new("title", FieldType::Data)
            },
            FieldDescriptor::new("priority", FieldType::Int),
        ];

        let merged = merge_descriptors(base, custom);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].name, "title");
        assert!(merged[0].indexed, "custom field should override base");
        assert_eq!(merged[1].name, "notes");
        assert_eq!(merged[2].name, "priority");
    }

    #[test]
    fn test_unknown_type_string_deserializes_to_other() {
        let yaml = "name: banner\ntype: section_break\n";
        let field: FieldDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(field.field_type, FieldType::Other);
    }

    #[tokio::test]
    async fn test_file_source_loads_directory() {
        let dir = tempfile::tempdir().unwrap();

        let mut f = std::fs::File::create(dir.path().join("Task.yaml")).unwrap();
        writeln!(f, "name: Task").unwrap();
        writeln!(f, "fields:").unwrap();
        writeln!(f, "  - name: title").unwrap();
        writeln!(f, "    type: data").unwrap();

        let mut c = std::fs::File::create(dir.path().join("custom_fields.yaml")).unwrap();
        writeln!(c, "custom_fields:").unwrap();
        writeln!(c, "  Task:").unwrap();
        writeln!(c, "    - name: priority").unwrap();
        writeln!(c, "      type: int").unwrap();

        let source = FileMetadataSource::load(dir.path()).unwrap();
        assert_eq!(source.record_types().await.unwrap(), vec!["Task"]);

        let fields = source.fields("Task").await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "title");

        let custom = source.custom_fields("Task").await.unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].name, "priority");

        assert!(source.fields("Nope").await.is_err());
    }

    #[tokio::test]
    async fn test_file_source_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileMetadataSource::load(dir.path()).is_err());
    }
}
