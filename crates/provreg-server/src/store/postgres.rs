//! PostgreSQL record store
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles
//! without a live database. Filters use the nullable-parameter pattern
//! (`$1::TEXT IS NULL OR column = $1`) so one statement serves every
//! combination of predicates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use provreg_common::CanonicalRecord;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{InsertOutcome, NewRecord, RecordFilter, RecordStore, StoreError, StoreResult};

/// Rows buffered between the export cursor task and its consumer
const STREAM_BUFFER: usize = 256;

const SELECT_COLUMNS: &str =
    "id, natural_key, display_name, phone, specialty_code, region_code, created_at";

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::TEXT IS NULL OR region_code = $1)
      AND ($2::TEXT IS NULL OR specialty_code = $2)
      AND ($3::TEXT IS NULL OR LOWER(display_name) LIKE $3 ESCAPE '\')
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProviderRow {
    id: Uuid,
    natural_key: String,
    display_name: String,
    phone: Option<String>,
    specialty_code: Option<String>,
    region_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProviderRow> for CanonicalRecord {
    fn from(row: ProviderRow) -> Self {
        Self {
            id: row.id,
            natural_key: row.natural_key,
            display_name: row.display_name,
            phone: row.phone,
            specialty_code: row.specialty_code,
            region_code: row.region_code,
            created_at: row.created_at,
        }
    }
}

/// Bound values for [`FILTER_CLAUSE`]
struct FilterBinds {
    region_code: Option<String>,
    specialty_code: Option<String>,
    name_pattern: Option<String>,
}

impl From<&RecordFilter> for FilterBinds {
    fn from(filter: &RecordFilter) -> Self {
        Self {
            region_code: filter.region_code.clone(),
            specialty_code: filter.specialty_code.clone(),
            name_pattern: filter.like_pattern(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[tracing::instrument(skip(self, keys), fields(keys = keys.len()))]
    async fn existing_keys(&self, keys: &[String]) -> StoreResult<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<String> =
            sqlx::query_scalar("SELECT natural_key FROM providers WHERE natural_key = ANY($1)")
                .bind(keys)
                .fetch_all(&self.pool)
                .await?;

        Ok(found.into_iter().collect())
    }

    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    async fn insert_batch(&self, records: &[NewRecord]) -> StoreResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO providers (id, natural_key, display_name, phone, specialty_code, region_code) ",
        );
        builder.push_values(records, |mut row, record| {
            row.push_bind(Uuid::now_v7())
                .push_bind(&record.natural_key)
                .push_bind(&record.display_name)
                .push_bind(&record.phone)
                .push_bind(&record.specialty_code)
                .push_bind(&record.region_code);
        });

        let result = builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn insert_one(&self, record: &NewRecord) -> StoreResult<InsertOutcome> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO providers (id, natural_key, display_name, phone, specialty_code, region_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (natural_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&record.natural_key)
        .bind(&record.display_name)
        .bind(&record.phone)
        .bind(&record.specialty_code)
        .bind(&record.region_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(_) => InsertOutcome::Inserted,
            None => InsertOutcome::Conflict,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn count_and_page(
        &self,
        filter: &RecordFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(i64, Vec<CanonicalRecord>)> {
        let binds = FilterBinds::from(filter);

        // Count and page must observe the same snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM providers {FILTER_CLAUSE}"))
            .bind(&binds.region_code)
            .bind(&binds.specialty_code)
            .bind(&binds.name_pattern)
            .fetch_one(&mut *tx)
            .await?;

        let rows: Vec<ProviderRow> = if offset >= total {
            Vec::new()
        } else {
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM providers {FILTER_CLAUSE} ORDER BY id LIMIT $4 OFFSET $5"
            ))
            .bind(&binds.region_code)
            .bind(&binds.specialty_code)
            .bind(&binds.name_pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?
        };

        tx.commit().await?;

        Ok((total, rows.into_iter().map(CanonicalRecord::from).collect()))
    }

    fn stream(&self, filter: RecordFilter) -> BoxStream<'static, StoreResult<CanonicalRecord>> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(run_cursor(self.pool.clone(), filter, tx));

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }

    async fn find_by_natural_key(&self, natural_key: &str) -> StoreResult<Option<CanonicalRecord>> {
        let row: Option<ProviderRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM providers WHERE natural_key = $1"
        ))
        .bind(natural_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CanonicalRecord::from))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }
}

/// Drive one export cursor, forwarding rows until the consumer goes away.
///
/// The connection and its read-only transaction are owned by this task, so
/// they are released on every exit path: completion, error, or the receiver
/// being dropped. The cursor runs without a statement timeout; only pool
/// acquisition is bounded.
async fn run_cursor(
    pool: PgPool,
    filter: RecordFilter,
    tx: mpsc::Sender<StoreResult<CanonicalRecord>>,
) {
    if let Err(err) = forward_rows(&pool, &filter, &tx).await {
        warn!(error = %err, "Export cursor failed");
        let _ = tx.send(Err(err)).await;
    }
}

async fn forward_rows(
    pool: &PgPool,
    filter: &RecordFilter,
    tx: &mpsc::Sender<StoreResult<CanonicalRecord>>,
) -> StoreResult<()> {
    let binds = FilterBinds::from(filter);
    let mut txn = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *txn)
        .await?;
    // The SELECT stays open while the consumer drains it; no statement timeout
    // for this transaction.
    sqlx::query("SET LOCAL statement_timeout = 0")
        .execute(&mut *txn)
        .await?;

    let sql = format!("SELECT {SELECT_COLUMNS} FROM providers {FILTER_CLAUSE} ORDER BY id");
    let mut emitted = 0u64;
    {
        let mut rows = sqlx::query_as::<_, ProviderRow>(&sql)
            .bind(&binds.region_code)
            .bind(&binds.specialty_code)
            .bind(&binds.name_pattern)
            .fetch(&mut *txn);

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    debug!(emitted, "Export consumer went away, closing cursor");
                    return Ok(());
                }
                next = rows.next() => next,
            };

            match next {
                Some(row) => {
                    let record = CanonicalRecord::from(row?);
                    if tx.send(Ok(record)).await.is_err() {
                        return Ok(());
                    }
                    emitted += 1;
                },
                None => break,
            }
        }
    }

    txn.commit().await?;
    debug!(emitted, "Export cursor exhausted");
    Ok(())
}
