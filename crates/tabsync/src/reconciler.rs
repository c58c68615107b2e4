//! The sync driver: record types in, converged tables out.
//!
//! [`Reconciler`] wires a [`MetadataSource`] to a [`Database`] and runs
//! the per-table engine over one record type or all of them, producing a
//! [`SyncReport`] suitable for logs or JSON output.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{Database, MysqlDatabase};
use crate::error::Result;
use crate::meta::{merge_descriptors, FileMetadataSource, MetadataSource};
use crate::table::{SyncOutcome, Table};

/// Summary of a full sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub record_types: usize,
    pub created: usize,
    pub altered: usize,
    pub unchanged: usize,
    pub failed: Vec<FailedSync>,
}

/// One record type that failed to sync, with the error text.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSync {
    pub record_type: String,
    pub error: String,
}

impl SyncReport {
    /// Whether every record type synced cleanly.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Drives table sync for a set of record types.
pub struct Reconciler {
    config: Config,
    db: Arc<dyn Database>,
    meta: Arc<dyn MetadataSource>,
}

impl Reconciler {
    /// Build a reconciler over explicit database and metadata handles.
    pub fn new(config: Config, db: Arc<dyn Database>, meta: Arc<dyn MetadataSource>) -> Self {
        Self { config, db, meta }
    }

    /// Connect to MySQL and load descriptors from the configured
    /// metadata directory.
    pub async fn connect(config: Config) -> Result<Self> {
        let db = MysqlDatabase::connect(&config.database).await?;
        let meta = FileMetadataSource::load(&config.sync.meta_dir)?;
        Ok(Self::new(config, Arc::new(db), Arc::new(meta)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the [`Table`] for a record type from its merged descriptors.
    pub async fn table(&self, record_type: &str) -> Result<Table> {
        let base = self.meta.fields(record_type).await?;
        let custom = self.meta.custom_fields(record_type).await?;
        let merged = merge_descriptors(base, custom);
        Ok(Table::new(record_type, merged, &self.config.sync))
    }

    /// Sync one record type's table.
    pub async fn sync(&self, record_type: &str) -> Result<SyncOutcome> {
        let table = self.table(record_type).await?;
        let outcome = table.sync(self.db.as_ref()).await?;
        match &outcome {
            SyncOutcome::Created => info!("{}: created {}", record_type, table.table_name()),
            SyncOutcome::Altered(n) => {
                info!("{}: applied {} statements", record_type, n)
            }
            SyncOutcome::Unchanged => info!("{}: up to date", record_type),
        }
        Ok(outcome)
    }

    /// Sync every record type the metadata source knows about.
    ///
    /// A failure in one record type is recorded and does not stop the
    /// others from syncing.
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let record_types = self.meta.record_types().await?;
        info!(
            "Sync run {} over {} record types",
            run_id,
            record_types.len()
        );

        let mut created = 0;
        let mut altered = 0;
        let mut unchanged = 0;
        let mut failed = Vec::new();
        for record_type in &record_types {
            match self.sync(record_type).await {
                Ok(SyncOutcome::Created) => created += 1,
                Ok(SyncOutcome::Altered(_)) => altered += 1,
                Ok(SyncOutcome::Unchanged) => unchanged += 1,
                Err(err) => {
                    error!("{}: {}", record_type, err);
                    failed.push(FailedSync {
                        record_type: record_type.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let completed_at = Utc::now();
        let report = SyncReport {
            run_id,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            record_types: record_types.len(),
            created,
            altered,
            unchanged,
            failed,
        };
        info!(
            "Sync run {} done: {} created, {} altered, {} unchanged, {} failed",
            report.run_id,
            report.created,
            report.altered,
            report.unchanged,
            report.failed.len()
        );
        Ok(report)
    }
}
