//! Pending schema operations and their DDL rendering.
//!
//! Diffing produces one ordered list of tagged operations per table.
//! Execution order is fixed: column structure changes first, then foreign
//! keys, then index changes, then defaults. FK drops run before index drops
//! because dropping an FK may be required before its backing index can go.

use std::fmt;

use crate::identifier::{escape_value, quote};

/// A single pending schema change for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Add a new column with a rendered definition (type + default clause).
    AddColumn { column: String, definition: String },

    /// Change an existing column's type.
    ChangeType { column: String, definition: String },

    /// Add a foreign key to the target table's primary key.
    AddForeignKey { column: String, target_table: String },

    /// Drop a foreign key constraint by name.
    DropForeignKey { column: String, constraint: String },

    /// Add a single-column index named after the column.
    AddIndex { column: String },

    /// Drop the single-column index named after the column.
    DropIndex { column: String },

    /// Set the column default.
    SetDefault { column: String, value: String },
}

impl Operation {
    /// Execution rank. Lower runs first.
    pub fn rank(&self) -> u8 {
        match self {
            Operation::AddColumn { .. } => 0,
            Operation::ChangeType { .. } => 1,
            Operation::AddForeignKey { .. } => 2,
            Operation::DropForeignKey { .. } => 3,
            Operation::AddIndex { .. } => 4,
            Operation::DropIndex { .. } => 5,
            Operation::SetDefault { .. } => 6,
        }
    }

    /// The column this operation touches.
    pub fn column(&self) -> &str {
        match self {
            Operation::AddColumn { column, .. }
            | Operation::ChangeType { column, .. }
            | Operation::AddForeignKey { column, .. }
            | Operation::DropForeignKey { column, .. }
            | Operation::AddIndex { column }
            | Operation::DropIndex { column }
            | Operation::SetDefault { column, .. } => column,
        }
    }

    /// Render the ALTER TABLE statement for this operation.
    pub fn to_sql(&self, table: &str) -> String {
        let table = quote(table);
        match self {
            Operation::AddColumn { column, definition } => {
                format!("ALTER TABLE {table} ADD COLUMN {} {definition}", quote(column))
            }
            Operation::ChangeType { column, definition } => {
                let col = quote(column);
                format!("ALTER TABLE {table} CHANGE {col} {col} {definition}")
            }
            Operation::AddForeignKey { column, target_table } => {
                format!(
                    "ALTER TABLE {table} ADD FOREIGN KEY ({}) REFERENCES {}(`id`) ON UPDATE CASCADE",
                    quote(column),
                    quote(target_table)
                )
            }
            Operation::DropForeignKey { constraint, .. } => {
                format!("ALTER TABLE {table} DROP FOREIGN KEY {}", quote(constraint))
            }
            Operation::AddIndex { column } => {
                let col = quote(column);
                format!("ALTER TABLE {table} ADD INDEX {col}({col})")
            }
            Operation::DropIndex { column } => {
                format!("ALTER TABLE {table} DROP INDEX {}", quote(column))
            }
            Operation::SetDefault { column, value } => {
                format!(
                    "ALTER TABLE {table} ALTER COLUMN {} SET DEFAULT '{}'",
                    quote(column),
                    escape_value(value)
                )
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AddColumn { column, definition } => {
                write!(f, "+ {column}: {definition}")
            }
            Operation::ChangeType { column, definition } => {
                write!(f, "~ {column}: {definition}")
            }
            Operation::AddForeignKey { column, target_table } => {
                write!(f, "+ FK {column} -> {target_table}")
            }
            Operation::DropForeignKey { column, constraint } => {
                write!(f, "- FK {column} ({constraint})")
            }
            Operation::AddIndex { column } => write!(f, "+ INDEX {column}"),
            Operation::DropIndex { column } => write!(f, "- INDEX {column}"),
            Operation::SetDefault { column, value } => {
                write!(f, "~ {column} default: {value:?}")
            }
        }
    }
}

/// Sort operations into execution order, preserving diff order within a rank.
pub fn order_operations(ops: &mut Vec<Operation>) {
    ops.sort_by_key(|op| op.rank());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_column_sql() {
        let op = Operation::AddColumn {
            column: "priority".into(),
            definition: "int(11)".into(),
        };
        assert_eq!(
            op.to_sql("tabTask"),
            "ALTER TABLE `tabTask` ADD COLUMN `priority` int(11)"
        );
    }

    #[test]
    fn test_change_type_sql() {
        let op = Operation::ChangeType {
            column: "title".into(),
            definition: "text".into(),
        };
        assert_eq!(
            op.to_sql("tabTask"),
            "ALTER TABLE `tabTask` CHANGE `title` `title` text"
        );
    }

    #[test]
    fn test_index_sql() {
        let add = Operation::AddIndex { column: "priority".into() };
        assert_eq!(
            add.to_sql("tabTask"),
            "ALTER TABLE `tabTask` ADD INDEX `priority`(`priority`)"
        );
        let drop = Operation::DropIndex { column: "priority".into() };
        assert_eq!(
            drop.to_sql("tabTask"),
            "ALTER TABLE `tabTask` DROP INDEX `priority`"
        );
    }

    #[test]
    fn test_set_default_escapes_value() {
        let op = Operation::SetDefault {
            column: "status".into(),
            value: "O'Brien".into(),
        };
        assert_eq!(
            op.to_sql("tabTask"),
            "ALTER TABLE `tabTask` ALTER COLUMN `status` SET DEFAULT 'O''Brien'"
        );
    }

    #[test]
    fn test_foreign_key_sql() {
        let add = Operation::AddForeignKey {
            column: "project".into(),
            target_table: "tabProject".into(),
        };
        assert_eq!(
            add.to_sql("tabTask"),
            "ALTER TABLE `tabTask` ADD FOREIGN KEY (`project`) REFERENCES `tabProject`(`id`) ON UPDATE CASCADE"
        );
        let drop = Operation::DropForeignKey {
            column: "project".into(),
            constraint: "tabtask_ibfk_1".into(),
        };
        assert_eq!(
            drop.to_sql("tabTask"),
            "ALTER TABLE `tabTask` DROP FOREIGN KEY `tabtask_ibfk_1`"
        );
    }

    #[test]
    fn test_order_operations_is_structure_first() {
        let mut ops = vec![
            Operation::SetDefault { column: "a".into(), value: "1".into() },
            Operation::DropIndex { column: "b".into() },
            Operation::AddIndex { column: "c".into() },
            Operation::ChangeType { column: "d".into(), definition: "text".into() },
            Operation::AddColumn { column: "e".into(), definition: "int(11)".into() },
        ];
        order_operations(&mut ops);
        let cols: Vec<&str> = ops.iter().map(|op| op.column()).collect();
        assert_eq!(cols, vec!["e", "d", "c", "b", "a"]);
    }
}
