//! tabsync CLI - declarative schema synchronization for MySQL.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tabsync::{
    Config, FileMetadataSource, MetadataSource, MysqlDatabase, Reconciler, SchemaManager,
    SyncError, SyncOutcome,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "tabsync")]
#[command(about = "Sync record-type descriptors to live MySQL tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "tabsync.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one record type, or all of them
    Sync {
        /// Record type to sync
        record_type: Option<String>,

        /// Sync every record type in the metadata directory
        #[arg(long)]
        all: bool,
    },

    /// List the tables of the configured database
    ListTables,

    /// Test the database connection and metadata directory
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(SyncError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Sync { record_type, all } => {
            if record_type.is_none() && !all {
                return Err(SyncError::Config(
                    "a record type argument or --all is required".into(),
                ));
            }
            let reconciler = Reconciler::connect(config).await?;
            if let Some(record_type) = record_type {
                match reconciler.sync(&record_type).await? {
                    SyncOutcome::Created => println!("{record_type}: table created"),
                    SyncOutcome::Altered(n) => {
                        println!("{record_type}: {n} statements applied")
                    }
                    SyncOutcome::Unchanged => println!("{record_type}: up to date"),
                }
                Ok(ExitCode::SUCCESS)
            } else {
                let report = reconciler.sync_all().await?;
                if cli.output_json {
                    println!("{}", report.to_json()?);
                } else {
                    println!("Sync run {} completed", report.run_id);
                    println!("  Duration: {:.2}s", report.duration_seconds);
                    println!("  Record types: {}", report.record_types);
                    println!("  Created: {}", report.created);
                    println!("  Altered: {}", report.altered);
                    println!("  Unchanged: {}", report.unchanged);
                    for failure in &report.failed {
                        println!("  Failed: {} ({})", failure.record_type, failure.error);
                    }
                }
                if report.success() {
                    Ok(ExitCode::SUCCESS)
                } else {
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::ListTables => {
            let manager = SchemaManager::connect(&config.database);
            for table in manager.list_tables().await? {
                println!("{table}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::HealthCheck => {
            let db = MysqlDatabase::connect(&config.database).await?;
            println!("Database connection OK");
            db.disconnect().await?;

            let meta = FileMetadataSource::load(&config.sync.meta_dir)?;
            let record_types = meta.record_types().await?;
            println!(
                "Metadata directory OK ({} record types)",
                record_types.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
