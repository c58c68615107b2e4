//! A managed column: a field descriptor resolved against the type map.
//!
//! [`Column`] owns everything the engine knows about one column of a
//! managed table: its rendered SQL type, whether it may carry an index or
//! a default, and how it differs from the live column of the same name.

use crate::db::LiveColumn;
use crate::error::Result;
use crate::identifier::{escape_value, normalize, normalize_column_name};
use crate::meta::FieldDescriptor;
use crate::ops::Operation;
use crate::typemap::{definition, TypeDefinition};

/// Default values that are resolved at write time, never stored as a
/// column default. A leading `:` marks a fetch-from-related-record rule.
const SHORTCUT_DEFAULTS: &[&str] = &["__user", "user", "__today", "today", "now"];

fn is_shortcut_default(value: &str) -> bool {
    value.starts_with(':') || SHORTCUT_DEFAULTS.contains(&value)
}

/// One column the engine manages, ready to render and diff.
#[derive(Debug, Clone)]
pub struct Column {
    descriptor: FieldDescriptor,
    name: String,
    type_def: TypeDefinition,
}

impl Column {
    /// Build a column from a field descriptor.
    ///
    /// Returns `None` for field types with no physical column, such as
    /// child-table references; those are skipped, not errors.
    pub fn new(descriptor: FieldDescriptor) -> Option<Self> {
        let type_def = definition(&descriptor.field_type)?;
        let name = normalize(&descriptor.name);
        Some(Self {
            descriptor,
            name,
            type_def,
        })
    }

    /// The column name, lowercased with spaces turned into underscores.
    ///
    /// Charset validation is deferred until the column is actually added.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor this column was built from.
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// The full SQL type, e.g. `varchar(180)` or `int(11)`.
    pub fn column_type(&self) -> String {
        self.type_def.render(self.descriptor.length)
    }

    /// Whether this column is a text or blob type.
    ///
    /// MySQL forbids plain indexes and defaults on those, so they are
    /// excluded from both regardless of what the descriptor asks for.
    pub fn is_text_or_blob(&self) -> bool {
        crate::typemap::is_text_or_blob(self.type_def.sql_type)
    }

    /// Whether this column should carry an index.
    pub fn has_index(&self) -> bool {
        self.descriptor.indexed && !self.is_text_or_blob()
    }

    /// The default value eligible to appear in DDL, if any.
    ///
    /// Shortcut defaults (current user, today's date, `:`-prefixed fetch
    /// rules) are resolved at write time and never stored in the schema.
    pub fn schema_default(&self) -> Option<&str> {
        if self.is_text_or_blob() {
            return None;
        }
        match self.descriptor.default.as_deref() {
            Some(value) if !is_shortcut_default(value) => Some(value),
            _ => None,
        }
    }

    /// Render the column definition used in CREATE and ADD COLUMN DDL.
    pub fn definition(&self, with_default: bool) -> String {
        let mut def = self.column_type();
        if with_default {
            if let Some(value) = self.schema_default() {
                def.push_str(&format!(" DEFAULT '{}'", escape_value(value)));
            }
        }
        def
    }

    /// Diff this column against its live counterpart.
    ///
    /// With no live column the name is validated and an add is queued,
    /// along with an index add when the descriptor asks for one. When the
    /// live type differs, a single type change is queued and the index and
    /// default comparisons are skipped for this pass: the change statement
    /// carries the definition, and comparing stale index or default state
    /// against a column about to be rewritten would queue spurious work.
    /// Otherwise index and default state are compared independently.
    pub fn diff(&self, existing: Option<&LiveColumn>) -> Result<Vec<Operation>> {
        let mut ops = Vec::new();
        let live = match existing {
            None => {
                let column = normalize_column_name(&self.descriptor.name)?;
                ops.push(Operation::AddColumn {
                    column: column.clone(),
                    definition: self.definition(true),
                });
                if self.has_index() {
                    ops.push(Operation::AddIndex { column });
                }
                return Ok(ops);
            }
            Some(live) => live,
        };

        if live.column_type != self.column_type() {
            ops.push(Operation::ChangeType {
                column: self.name.clone(),
                definition: self.definition(true),
            });
            return Ok(ops);
        }

        if self.has_index() && !live.has_index {
            ops.push(Operation::AddIndex {
                column: self.name.clone(),
            });
        } else if !self.has_index() && live.has_index {
            ops.push(Operation::DropIndex {
                column: self.name.clone(),
            });
        }

        if let Some(want) = self.schema_default() {
            if live.default_value.as_deref() != Some(want) {
                ops.push(Operation::SetDefault {
                    column: self.name.clone(),
                    value: want.to_string(),
                });
            }
        }

        Ok(ops)
    }
}
