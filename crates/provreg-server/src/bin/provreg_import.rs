//! Provreg import - load a registry extract into the record store
//!
//! Usage:
//!   provreg-import npidata.csv --preset nppes --region TX
//!   provreg-import providers.csv --dry-run --preview 5
//!
//! Database settings come from `DATABASE_*` and ingestion defaults from
//! `INGEST_*`; flags override the latter. Ctrl+C stops the run after the
//! current batch and reports the partial counts.

use anyhow::{Context, Result};
use clap::Parser;
use provreg_common::logging::{init_logging, LogConfig, LogLevel};
use provreg_server::config::DatabaseConfig;
use provreg_server::db;
use provreg_server::ingest::{ColumnPreset, IngestConfig, IngestError, IngestPipeline, IngestStats};
use provreg_server::store::{MemoryStore, PgRecordStore, RecordStore};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit status for a run stopped by Ctrl+C
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "provreg-import", version, about = "Load a provider extract into the registry")]
struct Args {
    /// CSV extract to load
    file: PathBuf,

    /// Column layout of the extract: simple or nppes
    #[arg(long)]
    preset: Option<String>,

    /// Only load rows from this region (two-letter code)
    #[arg(long)]
    region: Option<String>,

    /// Records per store transaction
    #[arg(long)]
    batch_size: Option<usize>,

    /// Log the first N normalized records before loading
    #[arg(long, value_name = "N")]
    preview: Option<usize>,

    /// Normalize and deduplicate against an empty in-memory store
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .level(if args.verbose { LogLevel::Debug } else { LogLevel::Info })
        .log_file_prefix("provreg-import")
        .filter_directives("sqlx=warn")
        .build();
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The import still runs if the log sink cannot be set up.
    let guard = init_logging(&log_config).ok();

    let code = match run(args).await {
        Ok(stats) => {
            print_stats(&stats);
            0
        },
        Err(e) => {
            let cancelled = matches!(
                e.downcast_ref::<IngestError>(),
                Some(IngestError::Cancelled { .. })
            );
            if let Some(partial) = e.downcast_ref::<IngestError>().and_then(IngestError::partial) {
                print_stats(partial);
            }
            error!(error = %e, "Import failed");
            eprintln!("Error: {:#}", e);
            if cancelled {
                EXIT_CANCELLED
            } else {
                1
            }
        },
    };

    // Flush the file appender before exiting.
    drop(guard);
    process::exit(code);
}

async fn run(args: Args) -> Result<IngestStats> {
    let config = ingest_config(&args)?;
    info!(
        file = %args.file.display(),
        batch_size = config.batch_size,
        dry_run = args.dry_run,
        "Starting import"
    );

    let store: Arc<dyn RecordStore> = if args.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        let database = DatabaseConfig::from_env();
        database.validate()?;
        let pool = db::create_pool(&database).await?;
        db::run_migrations(&pool).await?;
        Arc::new(PgRecordStore::new(pool))
    };

    let pipeline = IngestPipeline::new(store, config);

    if let Some(limit) = args.preview {
        let file = tokio::fs::File::open(&args.file)
            .await
            .with_context(|| format!("Failed to open {}", args.file.display()))?;
        for record in pipeline.preview(file, limit).await? {
            info!(
                natural_key = %record.natural_key,
                name = %record.display_name,
                phone = record.phone.as_deref().unwrap_or(""),
                specialty = record.specialty_code.as_deref().unwrap_or(""),
                region = record.region_code.as_deref().unwrap_or(""),
                "Preview"
            );
        }
    }

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = pipeline.run_path(&args.file, cancel).await;
    watcher.abort();

    Ok(result?)
}

fn ingest_config(args: &Args) -> Result<IngestConfig> {
    let mut config = IngestConfig::from_env()?;

    if let Some(preset) = &args.preset {
        let preset: ColumnPreset = preset.parse()?;
        let sizes = config.clone();
        config = IngestConfig::for_preset(preset);
        config.batch_size = sizes.batch_size;
        config.channel_capacity = sizes.channel_capacity;
        config.natural_key_length = sizes.natural_key_length;
    }
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(region) = &args.region {
        config = config.with_region(&region.to_uppercase());
    }

    config.validate()?;
    Ok(config)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Received Ctrl+C, stopping import");
            cancel.cancel();
        },
        Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
    }
}

fn print_stats(stats: &IngestStats) {
    match serde_json::to_string_pretty(stats) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize import stats: {}", e),
    }
}
