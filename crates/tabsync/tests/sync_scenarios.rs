//! End-to-end sync behavior against a scripted in-memory database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tabsync::config::{Config, DatabaseConfig, SyncConfig};
use tabsync::db::{Database, LiveColumn};
use tabsync::error::{Result, SyncError};
use tabsync::meta::{FieldDescriptor, FieldType, StaticMetadataSource};
use tabsync::reconciler::Reconciler;
use tabsync::table::{SyncOutcome, Table};

/// Scripted [`Database`]: table state is fixed up front, every DDL
/// statement is recorded, and statements can be forced to fail with a
/// given MySQL error code.
#[derive(Default)]
struct FakeDatabase {
    columns: Mutex<HashMap<String, Vec<LiveColumn>>>,
    create_text: Mutex<HashMap<String, String>>,
    executed: Mutex<Vec<String>>,
    fail_matching: Mutex<Option<(String, u16)>>,
}

impl FakeDatabase {
    fn new() -> Self {
        Self::default()
    }

    fn with_table(self, table: &str, columns: Vec<LiveColumn>) -> Self {
        self.columns.lock().unwrap().insert(table.into(), columns);
        self
    }

    fn with_create_text(self, table: &str, ddl: &str) -> Self {
        self.create_text
            .lock()
            .unwrap()
            .insert(table.into(), ddl.into());
        self
    }

    fn fail_matching(self, fragment: &str, code: u16) -> Self {
        *self.fail_matching.lock().unwrap() = Some((fragment.into(), code));
        self
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        if let Some((fragment, code)) = self.fail_matching.lock().unwrap().as_ref() {
            if sql.contains(fragment.as_str()) {
                return Err(SyncError::Database(mysql_async::Error::Server(
                    mysql_async::ServerError {
                        code: *code,
                        message: format!("scripted failure for {fragment}"),
                        state: "HY000".into(),
                    },
                )));
            }
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<LiveColumn>> {
        Ok(self
            .columns
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut tables: Vec<String> = self.columns.lock().unwrap().keys().cloned().collect();
        tables.sort();
        Ok(tables)
    }

    async fn show_create_table(&self, table: &str) -> Result<String> {
        Ok(self
            .create_text
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }
}

fn field(name: &str, field_type: FieldType) -> FieldDescriptor {
    FieldDescriptor::new(name, field_type)
}

fn col(name: &str, column_type: &str) -> LiveColumn {
    LiveColumn {
        name: name.into(),
        column_type: column_type.into(),
        has_index: false,
        default_value: None,
    }
}

fn task_fields() -> Vec<FieldDescriptor> {
    let mut priority = field("priority", FieldType::Int);
    priority.indexed = true;
    vec![
        field("title", FieldType::Data),
        field("description", FieldType::LongText),
        priority,
    ]
}

#[tokio::test]
async fn missing_table_is_created_in_one_statement() {
    let db = FakeDatabase::new();
    let table = Table::new("Task", task_fields(), &SyncConfig::default());
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Created);
    let executed = db.executed();
    assert_eq!(executed.len(), 1);
    let ddl = &executed[0];
    assert!(ddl.starts_with("CREATE TABLE `tabTask`"));
    assert!(ddl.contains("`title` varchar(180)"));
    assert!(ddl.contains("`description` text"));
    assert!(ddl.contains("`priority` int(11)"));
    assert!(ddl.contains("INDEX `priority`(`priority`)"));
    assert!(ddl.contains("INDEX `parent`(`parent`)"));
    assert!(ddl.ends_with("ENGINE=InnoDB"));
}

#[tokio::test]
async fn new_indexed_column_adds_column_then_index() {
    let db = FakeDatabase::new().with_table(
        "tabTask",
        vec![col("title", "varchar(180)"), col("description", "text")],
    );
    let table = Table::new("Task", task_fields(), &SyncConfig::default());
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Altered(2));
    assert_eq!(
        db.executed(),
        vec![
            "ALTER TABLE `tabTask` ADD COLUMN `priority` int(11)",
            "ALTER TABLE `tabTask` ADD INDEX `priority`(`priority`)",
        ]
    );
}

#[tokio::test]
async fn type_change_is_a_single_change_statement() {
    // The live column still has the stale index; the type change wins
    // and no index work is queued in the same pass.
    let mut live_title = col("title", "varchar(180)");
    live_title.has_index = true;
    let db = FakeDatabase::new().with_table("tabTask", vec![live_title]);

    let table = Table::new(
        "Task",
        vec![field("title", FieldType::LongText)],
        &SyncConfig::default(),
    );
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Altered(1));
    assert_eq!(
        db.executed(),
        vec!["ALTER TABLE `tabTask` CHANGE `title` `title` text"]
    );
}

#[tokio::test]
async fn matching_table_is_untouched() {
    let mut live_priority = col("priority", "int(11)");
    live_priority.has_index = true;
    let db = FakeDatabase::new().with_table(
        "tabTask",
        vec![
            col("title", "varchar(180)"),
            col("description", "text"),
            live_priority,
        ],
    );
    let table = Table::new("Task", task_fields(), &SyncConfig::default());
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn operations_run_in_rank_order() {
    // One pass needing an add, an index drop, and a default set: the add
    // must run first, the default last.
    let mut status = field("status_label", FieldType::Data);
    status.default = Some("Open".into());
    let mut notes = col("notes", "varchar(180)");
    notes.has_index = true;
    let db = FakeDatabase::new()
        .with_table("tabTask", vec![col("status_label", "varchar(180)"), notes]);
    let table = Table::new(
        "Task",
        vec![field("extra", FieldType::Int), field("notes", FieldType::Data), status],
        &SyncConfig::default(),
    );
    table.sync(&db).await.unwrap();

    assert_eq!(
        db.executed(),
        vec![
            "ALTER TABLE `tabTask` ADD COLUMN `extra` int(11)",
            "ALTER TABLE `tabTask` DROP INDEX `notes`",
            "ALTER TABLE `tabTask` ALTER COLUMN `status_label` SET DEFAULT 'Open'",
        ]
    );
}

#[tokio::test]
async fn invalid_field_name_applies_earlier_work_then_fails() {
    let db = FakeDatabase::new().with_table("tabTask", vec![col("title", "varchar(180)")]);
    let table = Table::new(
        "Task",
        vec![
            field("title", FieldType::Data),
            field("priority", FieldType::Int),
            field("1bad", FieldType::Data),
            field("never_reached", FieldType::Data),
        ],
        &SyncConfig::default(),
    );
    let err = table.sync(&db).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidFieldName { .. }));
    assert_eq!(
        db.executed(),
        vec!["ALTER TABLE `tabTask` ADD COLUMN `priority` int(11)"]
    );
}

#[tokio::test]
async fn benign_ddl_errors_are_swallowed_when_configured() {
    let db = FakeDatabase::new()
        .with_table("tabTask", vec![col("title", "varchar(180)")])
        .fail_matching("ADD COLUMN `priority`", 1060);
    let sync = SyncConfig {
        ignore_ddl_errors: true,
        ..SyncConfig::default()
    };
    let table = Table::new("Task", task_fields(), &sync);
    let outcome = table.sync(&db).await.unwrap();

    // The duplicate-column failure is skipped; the rest still runs.
    assert_eq!(outcome, SyncOutcome::Altered(2));
    assert_eq!(
        db.executed(),
        vec![
            "ALTER TABLE `tabTask` ADD COLUMN `description` text",
            "ALTER TABLE `tabTask` ADD INDEX `priority`(`priority`)",
        ]
    );
}

#[tokio::test]
async fn ddl_errors_abort_by_default() {
    let db = FakeDatabase::new()
        .with_table("tabTask", vec![col("title", "varchar(180)")])
        .fail_matching("ADD COLUMN `description`", 1060);
    let table = Table::new("Task", task_fields(), &SyncConfig::default());
    let err = table.sync(&db).await.unwrap_err();

    assert!(matches!(err, SyncError::Ddl { .. }));
}

fn link_fields() -> Vec<FieldDescriptor> {
    let mut project = field("project", FieldType::Link);
    project.link_target = Some("Project".into());
    vec![field("title", FieldType::Data), project]
}

fn fk_sync() -> SyncConfig {
    SyncConfig {
        enforce_foreign_keys: true,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn link_column_gains_a_foreign_key() {
    let db = FakeDatabase::new()
        .with_table(
            "tabTask",
            vec![col("title", "varchar(180)"), col("project", "varchar(180)")],
        )
        .with_table("tabProject", vec![col("title", "varchar(180)")]);
    let table = Table::new("Task", link_fields(), &fk_sync());
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Altered(1));
    assert_eq!(
        db.executed(),
        vec![
            "ALTER TABLE `tabTask` ADD FOREIGN KEY (`project`) \
             REFERENCES `tabProject`(`id`) ON UPDATE CASCADE",
        ]
    );
}

#[tokio::test]
async fn missing_link_target_skips_the_foreign_key() {
    let db = FakeDatabase::new().with_table(
        "tabTask",
        vec![col("title", "varchar(180)"), col("project", "varchar(180)")],
    );
    let table = Table::new("Task", link_fields(), &fk_sync());
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Unchanged);
}

#[tokio::test]
async fn stale_foreign_key_is_dropped() {
    let db = FakeDatabase::new()
        .with_table(
            "tabTask",
            vec![col("title", "varchar(180)"), col("old_link", "varchar(180)")],
        )
        .with_create_text(
            "tabTask",
            "CREATE TABLE `tabTask` (\n\
             `old_link` varchar(180) DEFAULT NULL,\n\
             CONSTRAINT `tabTask_ibfk_1` FOREIGN KEY (`old_link`) \
             REFERENCES `tabThing` (`id`) ON UPDATE CASCADE\n\
             ) ENGINE=InnoDB",
        );
    let table = Table::new(
        "Task",
        vec![field("title", FieldType::Data)],
        &fk_sync(),
    );
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Altered(1));
    assert_eq!(
        db.executed(),
        vec!["ALTER TABLE `tabTask` DROP FOREIGN KEY `tabTask_ibfk_1`"]
    );
}

#[tokio::test]
async fn foreign_keys_stay_off_without_the_flag() {
    let db = FakeDatabase::new()
        .with_table(
            "tabTask",
            vec![col("title", "varchar(180)"), col("project", "varchar(180)")],
        )
        .with_table("tabProject", vec![]);
    let table = Table::new("Task", link_fields(), &SyncConfig::default());
    let outcome = table.sync(&db).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Unchanged);
}

fn test_config() -> Config {
    Config {
        database: DatabaseConfig {
            host: "localhost".into(),
            port: 3306,
            database: "test".into(),
            user: "root".into(),
            password: String::new(),
        },
        sync: SyncConfig::default(),
    }
}

#[tokio::test]
async fn sync_all_reports_per_type_outcomes() {
    let db = Arc::new(FakeDatabase::new().with_table(
        "tabProject",
        vec![col("title", "varchar(180)")],
    ));
    let meta = StaticMetadataSource::new()
        .with_record_type("Task", task_fields())
        .with_record_type("Project", vec![field("title", FieldType::Data)])
        .with_record_type("Broken", vec![field("1bad", FieldType::Data)]);
    let reconciler = Reconciler::new(test_config(), db.clone(), Arc::new(meta));

    let report = reconciler.sync_all().await.unwrap();
    assert_eq!(report.record_types, 3);
    assert_eq!(report.created, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].record_type, "Broken");
    assert!(!report.success());
}

#[tokio::test]
async fn custom_fields_override_base_fields() {
    let db = Arc::new(FakeDatabase::new().with_table(
        "tabTask",
        vec![col("title", "varchar(180)")],
    ));
    let meta = StaticMetadataSource::new()
        .with_record_type("Task", vec![field("title", FieldType::Data)])
        .with_custom_fields("Task", vec![field("title", FieldType::LongText)]);
    let reconciler = Reconciler::new(test_config(), db.clone(), Arc::new(meta));

    let outcome = reconciler.sync("Task").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Altered(1));
    assert_eq!(
        db.executed(),
        vec!["ALTER TABLE `tabTask` CHANGE `title` `title` text"]
    );
}

#[tokio::test]
async fn second_sync_after_convergence_is_a_no_op() {
    // Plan against live columns shaped exactly like the DDL the first
    // pass would have produced.
    let mut live_priority = col("priority", "int(11)");
    live_priority.has_index = true;
    let db = FakeDatabase::new().with_table(
        "tabTask",
        vec![
            col("title", "varchar(180)"),
            col("description", "text"),
            live_priority,
        ],
    );
    let table = Table::new("Task", task_fields(), &SyncConfig::default());
    assert_eq!(table.sync(&db).await.unwrap(), SyncOutcome::Unchanged);
    assert_eq!(table.sync(&db).await.unwrap(), SyncOutcome::Unchanged);
    assert!(db.executed().is_empty());
}
