//! A managed table: reserved base columns plus the descriptor-driven rest.
//!
//! [`Table`] turns a record type's merged field descriptors into DDL. A
//! missing table is created in one statement; an existing one is diffed
//! column by column into a single ordered list of [`Operation`]s, which is
//! then applied statement by statement.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::column::Column;
use crate::config::SyncConfig;
use crate::db::{Database, LiveColumn};
use crate::error::{Result, SyncError};
use crate::identifier::{normalize, normalize_column_name, quote};
use crate::meta::{FieldDescriptor, FieldType};
use crate::ops::{order_operations, Operation};

/// Base columns present on every managed table. They are created once and
/// never diffed or altered afterwards.
pub const RESERVED_COLUMNS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "updated_by",
    "owner",
    "status",
    "parent",
    "parent_field",
    "parent_type",
    "idx",
];

/// MySQL error codes a sync may swallow when `ignore_ddl_errors` is set:
/// unknown column, duplicate column, duplicate key, unknown table.
const BENIGN_DDL_ERRORS: &[u16] = &[1054, 1060, 1061, 1146];

/// Outcome of syncing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The table did not exist and was created.
    Created,
    /// The table existed; this many statements were applied.
    Altered(usize),
    /// The table already matched its descriptors.
    Unchanged,
}

/// A foreign key constraint as parsed out of `SHOW CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub constraint: String,
}

/// The column diff for one table: operations to apply, plus the error that
/// stopped planning early, if any. Operations queued before the failure
/// are still applied.
pub struct Plan {
    pub ops: Vec<Operation>,
    pub failure: Option<SyncError>,
}

/// One record type's physical table.
pub struct Table {
    record_type: String,
    table_name: String,
    columns: Vec<Column>,
    sync: SyncConfig,
}

impl Table {
    /// Build a table from a record type's merged descriptors.
    ///
    /// Descriptors with no physical column are skipped, as are descriptors
    /// that collide with a reserved base column.
    pub fn new(record_type: &str, descriptors: Vec<FieldDescriptor>, sync: &SyncConfig) -> Self {
        let table_name = format!("{}{}", sync.table_prefix, record_type);
        let mut columns = Vec::new();
        for descriptor in descriptors {
            if RESERVED_COLUMNS.contains(&normalize(&descriptor.name).as_str()) {
                warn!(
                    "{}: field {:?} collides with a reserved column, skipping",
                    record_type, descriptor.name
                );
                continue;
            }
            match Column::new(descriptor.clone()) {
                Some(column) => columns.push(column),
                None => debug!(
                    "{}: field {:?} has no physical column, skipping",
                    record_type, descriptor.name
                ),
            }
        }
        Self {
            record_type: record_type.to_string(),
            table_name,
            columns,
            sync: sync.clone(),
        }
    }

    /// The record type this table stores.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// The physical table name, prefix included.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The managed (non-reserved) columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Render the CREATE TABLE statement: reserved columns, managed
    /// columns with their eligible defaults, index clauses, and the
    /// mandatory parent index.
    pub fn create_ddl(&self) -> Result<String> {
        let mut parts: Vec<String> = vec![
            "`id` varchar(120) PRIMARY KEY".into(),
            "`created_at` datetime".into(),
            "`updated_at` datetime".into(),
            "`updated_by` varchar(40)".into(),
            "`owner` varchar(40)".into(),
            "`status` int(1) DEFAULT '0'".into(),
            "`parent` varchar(120)".into(),
            "`parent_field` varchar(120)".into(),
            "`parent_type` varchar(120)".into(),
            "`idx` int(8)".into(),
        ];
        for column in &self.columns {
            let name = normalize_column_name(&column.descriptor().name)?;
            parts.push(format!("{} {}", quote(&name), column.definition(true)));
        }
        for column in &self.columns {
            if column.has_index() {
                let name = quote(column.name());
                parts.push(format!("INDEX {name}({name})"));
            }
        }
        parts.push("INDEX `parent`(`parent`)".into());
        Ok(format!(
            "CREATE TABLE {} (\n  {}\n) ENGINE=InnoDB",
            quote(&self.table_name),
            parts.join(",\n  ")
        ))
    }

    /// Create the table.
    pub async fn create(&self, db: &dyn Database) -> Result<()> {
        let ddl = self.create_ddl()?;
        info!("Creating table {}", self.table_name);
        db.execute_ddl(&ddl)
            .await
            .map_err(|err| SyncError::ddl(&ddl, err.to_string()))?;
        Ok(())
    }

    /// Diff the managed columns against the live columns.
    ///
    /// Planning stops at the first invalid field name; operations queued
    /// by fields processed before it are kept and the error is reported
    /// after they run.
    pub fn plan(&self, live: &[LiveColumn]) -> Plan {
        let live_by_name: HashMap<&str, &LiveColumn> =
            live.iter().map(|col| (col.name.as_str(), col)).collect();
        let mut ops = Vec::new();
        let mut failure = None;
        for column in &self.columns {
            match column.diff(live_by_name.get(column.name()).copied()) {
                Ok(mut column_ops) => ops.append(&mut column_ops),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        Plan { ops, failure }
    }

    /// The table's current foreign keys, parsed out of `SHOW CREATE TABLE`.
    pub async fn foreign_keys(&self, db: &dyn Database) -> Result<Vec<ForeignKey>> {
        let ddl = db.show_create_table(&self.table_name).await?;
        Ok(parse_foreign_keys(&ddl))
    }

    /// Plan foreign key adds and drops for link columns.
    ///
    /// A link whose target table does not exist yet is skipped, not an
    /// error; a later sync pass picks it up once the target is created.
    pub async fn plan_foreign_keys(&self, db: &dyn Database) -> Result<Vec<Operation>> {
        let existing = self.foreign_keys(db).await?;
        let mut desired: IndexMap<String, String> = IndexMap::new();
        for column in &self.columns {
            if column.descriptor().field_type != FieldType::Link {
                continue;
            }
            if let Some(target) = &column.descriptor().link_target {
                desired.insert(
                    column.name().to_string(),
                    format!("{}{}", self.sync.table_prefix, target),
                );
            }
        }

        let mut ops = Vec::new();
        for (column, target_table) in &desired {
            if existing.iter().any(|fk| &fk.column == column) {
                continue;
            }
            if !db.table_exists(target_table).await? {
                debug!(
                    "{}: link target table {} does not exist yet, skipping foreign key",
                    self.table_name, target_table
                );
                continue;
            }
            ops.push(Operation::AddForeignKey {
                column: column.clone(),
                target_table: target_table.clone(),
            });
        }
        for fk in &existing {
            if !desired.contains_key(&fk.column) && !RESERVED_COLUMNS.contains(&fk.column.as_str())
            {
                ops.push(Operation::DropForeignKey {
                    column: fk.column.clone(),
                    constraint: fk.constraint.clone(),
                });
            }
        }
        Ok(ops)
    }

    /// Bring an existing table up to date. Returns the number of
    /// statements applied.
    pub async fn alter(&self, db: &dyn Database) -> Result<usize> {
        let live = db.introspect_columns(&self.table_name).await?;
        let mut plan = self.plan(&live);
        if plan.failure.is_none() && self.sync.enforce_foreign_keys {
            let fk_ops = self.plan_foreign_keys(db).await?;
            plan.ops.extend(fk_ops);
        }
        order_operations(&mut plan.ops);

        let mut applied = 0;
        for op in &plan.ops {
            if matches!(op, Operation::DropIndex { column } if column == "id") {
                continue;
            }
            let sql = op.to_sql(&self.table_name);
            match db.execute_ddl(&sql).await {
                Ok(()) => {
                    info!("{}", sql);
                    applied += 1;
                }
                Err(err) => {
                    let benign = err
                        .mysql_code()
                        .is_some_and(|code| BENIGN_DDL_ERRORS.contains(&code));
                    if self.sync.ignore_ddl_errors && benign {
                        warn!("Ignoring DDL error: {} ({})", err, sql);
                        continue;
                    }
                    return Err(SyncError::ddl(&sql, err.to_string()));
                }
            }
        }
        if let Some(err) = plan.failure {
            return Err(err);
        }
        Ok(applied)
    }

    /// Create the table if it is missing, otherwise diff and alter it.
    pub async fn sync(&self, db: &dyn Database) -> Result<SyncOutcome> {
        if db.table_exists(&self.table_name).await? {
            match self.alter(db).await? {
                0 => Ok(SyncOutcome::Unchanged),
                n => Ok(SyncOutcome::Altered(n)),
            }
        } else {
            self.create(db).await?;
            Ok(SyncOutcome::Created)
        }
    }
}

fn first_backticked(s: &str) -> Option<&str> {
    let start = s.find('`')? + 1;
    let end = s[start..].find('`')? + start;
    Some(&s[start..end])
}

/// Pull `(column, constraint)` pairs out of `SHOW CREATE TABLE` text.
fn parse_foreign_keys(ddl: &str) -> Vec<ForeignKey> {
    ddl.lines()
        .filter_map(|line| {
            let line = line.trim();
            let fk_pos = line.find("FOREIGN KEY")?;
            let constraint = first_backticked(&line[..fk_pos])?;
            let column = first_backticked(&line[fk_pos..])?;
            Some(ForeignKey {
                column: column.to_string(),
                constraint: constraint.to_string(),
            })
        })
        .collect()
}
