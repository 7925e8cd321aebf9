//! Provreg Server - Main entry point

use anyhow::Result;
use provreg_common::logging::{init_logging, LogConfig};
use std::sync::Arc;
use tracing::info;

use provreg_server::{api, config::Config, db, store::PgRecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("provreg-server")
        .filter_directives("provreg_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting provreg server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgRecordStore::new(pool));
    api::serve(config, store).await
}
