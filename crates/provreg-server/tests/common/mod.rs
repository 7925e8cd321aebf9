//! Common test utilities for provreg integration tests
//!
//! - CSV fixtures in the `simple` column layout and in a trimmed NPPES layout
//! - Record builders and store seeding
//! - A PostgreSQL container with migrations applied (`testcontainers`)
//!
//! Postgres-backed tests are `#[ignore]`d because they need Docker:
//!
//! ```text
//! cargo test -p provreg-server -- --ignored
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use provreg_server::store::{NewRecord, RecordStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::{Cursor, Write};
use std::time::Duration;
use tempfile::NamedTempFile;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

// ============================================================================
// CSV fixtures
// ============================================================================

pub const SIMPLE_HEADER: &str = "npi,name,phone,specialty,state";

pub const NPPES_HEADER: &str = "NPI,Entity Type Code,Provider First Name,\
Provider Last Name (Legal Name),\
Provider Business Practice Location Address Telephone Number,\
Healthcare Provider Taxonomy Code_1,\
Healthcare Provider Primary Taxonomy Switch_1,\
Provider Business Practice Location Address State Name";

/// Join a header and data lines into CSV text.
pub fn csv_text(header: &str, lines: &[&str]) -> String {
    let mut text = String::from(header);
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// `simple` layout CSV as an async reader.
pub fn simple_csv(lines: &[&str]) -> Cursor<Vec<u8>> {
    Cursor::new(csv_text(SIMPLE_HEADER, lines).into_bytes())
}

/// `n` valid rows with keys starting at `first_key`, alternating TX and CA.
pub fn generated_lines(first_key: u64, n: u64) -> Vec<String> {
    (0..n)
        .map(|i| {
            let region = if i % 2 == 0 { "TX" } else { "CA" };
            format!(
                "{},Provider {},5125550{:03},207Q00000X,{}",
                first_key + i,
                i,
                i % 1000,
                region
            )
        })
        .collect()
}

/// Write CSV text to a temporary file that lives as long as the handle.
pub fn write_csv(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().context("Failed to create temp file")?;
    file.write_all(contents.as_bytes())
        .context("Failed to write CSV fixture")?;
    file.flush()?;
    Ok(file)
}

// ============================================================================
// Records
// ============================================================================

pub fn record(key: &str, name: &str, region: Option<&str>, specialty: Option<&str>) -> NewRecord {
    NewRecord {
        natural_key: key.to_string(),
        display_name: name.to_string(),
        phone: None,
        specialty_code: specialty.map(str::to_string),
        region_code: region.map(str::to_string),
    }
}

/// Seed the scenario used by the query tests: 120 TX and 80 CA providers,
/// every third one named "Smith".
pub async fn seed_regions<S: RecordStore + ?Sized>(store: &S) -> Result<()> {
    let mut batch = Vec::with_capacity(200);
    for i in 0..200u64 {
        let region = if i < 120 { "TX" } else { "CA" };
        let name = if i % 3 == 0 {
            format!("Jane Smith {}", i)
        } else {
            format!("Ravi Patel {}", i)
        };
        batch.push(record(
            &format!("{}", 1_000_000_000 + i),
            &name,
            Some(region),
            Some("207Q00000X"),
        ));
    }
    store.insert_batch(&batch).await?;
    Ok(())
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL test container with migrations applied
pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        Self::start_with_options(PostgresOptions::default()).await
    }

    pub async fn start_with_options(options: PostgresOptions) -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag(&options.version)
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_secs))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        provreg_server::db::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

/// Configuration options for the PostgreSQL test container
pub struct PostgresOptions {
    /// PostgreSQL version/tag (default: "16-alpine")
    pub version: String,
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: u32,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            version: "16-alpine".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}
