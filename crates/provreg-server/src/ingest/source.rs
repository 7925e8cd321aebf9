//! CSV source reader
//!
//! Streams rows out of a delimited extract with `csv-async`. The header row is
//! validated once against the columns the run needs; after that each record is
//! projected down to just those columns, so wide extracts (NPPES has over 300
//! columns) cost no more per row than narrow ones.

use csv_async::{AsyncReader, AsyncReaderBuilder, ByteRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::debug;

use super::models::RawRow;

const READ_BUFFER_CAPACITY: usize = 1 << 20;

/// Fatal problems with the source itself
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open source extract {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source extract is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Malformed CSV near line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv_async::Error,
    },
}

/// Row stream over one extract
pub struct CsvSource<R> {
    reader: AsyncReader<R>,
    /// (column name, index in the header row)
    projection: Vec<(String, usize)>,
    record: ByteRecord,
    rows_read: u64,
}

impl CsvSource<tokio::fs::File> {
    pub async fn open_path(
        path: impl AsRef<Path>,
        required: &[String],
    ) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::open(file, required).await
    }
}

impl<R> CsvSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Read the header row and resolve every required column.
    ///
    /// Fails with [`SourceError::MissingColumns`] listing all absent columns at
    /// once.
    pub async fn open(reader: R, required: &[String]) -> Result<Self, SourceError> {
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .buffer_capacity(READ_BUFFER_CAPACITY)
            .create_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .await
            .map_err(|source| SourceError::Csv { line: 1, source })?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut projection = Vec::with_capacity(required.len());
        let mut missing = Vec::new();
        for column in required {
            match headers.iter().position(|h| h == column) {
                Some(idx) => projection.push((column.clone(), idx)),
                None => missing.push(column.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(SourceError::MissingColumns(missing));
        }

        debug!(columns = headers.len(), projected = projection.len(), "Source header validated");

        Ok(Self {
            reader,
            projection,
            record: ByteRecord::new(),
            rows_read: 0,
        })
    }

    /// Next data row, or `None` at end of input.
    pub async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .await
            .map_err(|source| SourceError::Csv {
                line: self.rows_read + 2,
                source,
            })?;
        if !more {
            return Ok(None);
        }
        self.rows_read += 1;

        let line = self
            .record
            .position()
            .map(|p| p.line())
            .unwrap_or(self.rows_read + 1);

        let mut row = RawRow::new(line);
        for (column, idx) in &self.projection {
            if let Some(bytes) = self.record.get(*idx) {
                row.insert(column.clone(), String::from_utf8_lossy(bytes).into_owned());
            }
        }
        Ok(Some(row))
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}
