//! Ingestion configuration
//!
//! Which source columns feed which record fields, which rows are eligible,
//! and how large the load batches are. Read from `INGEST_*` environment
//! variables; the import CLI overrides individual values from its flags.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::models::RawRow;

/// Default number of candidates per store transaction
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Upper bound on batch size; keeps one INSERT under the bind-parameter limit
pub const MAX_BATCH_SIZE: usize = 5000;

/// Default capacity of the producer-to-loader channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 2000;

/// NPIs are ten digits
pub const DEFAULT_NATURAL_KEY_LENGTH: usize = 10;

/// Named column layouts for known extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnPreset {
    /// `npi,name,phone,specialty,state`
    #[default]
    Simple,
    /// The full NPPES dissemination file
    Nppes,
}

impl FromStr for ColumnPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(ColumnPreset::Simple),
            "nppes" => Ok(ColumnPreset::Nppes),
            _ => anyhow::bail!("Invalid column preset: {}. Must be 'simple' or 'nppes'", s),
        }
    }
}

/// Source column names for each record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub natural_key: String,
    /// Joined with single spaces to form the display name
    pub name: Vec<String>,
    pub phone: String,
    pub specialty: String,
    pub region: String,
}

impl ColumnMapping {
    pub fn simple() -> Self {
        Self {
            natural_key: "npi".to_string(),
            name: vec!["name".to_string()],
            phone: "phone".to_string(),
            specialty: "specialty".to_string(),
            region: "state".to_string(),
        }
    }

    pub fn nppes() -> Self {
        Self {
            natural_key: "NPI".to_string(),
            name: vec![
                "Provider First Name".to_string(),
                "Provider Last Name (Legal Name)".to_string(),
            ],
            phone: "Provider Business Practice Location Address Telephone Number".to_string(),
            specialty: "Healthcare Provider Taxonomy Code_1".to_string(),
            region: "Provider Business Practice Location Address State Name".to_string(),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.natural_key.as_str())
            .chain(self.name.iter().map(String::as_str))
            .chain([self.phone.as_str(), self.specialty.as_str(), self.region.as_str()])
    }
}

/// Keep a row only when `column` equals `value` (trimmed, ASCII case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityRule {
    pub column: String,
    pub value: String,
}

impl EligibilityRule {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn admits(&self, row: &RawRow) -> bool {
        row.get(&self.column)
            .map(|v| v.trim().eq_ignore_ascii_case(self.value.trim()))
            .unwrap_or(false)
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub channel_capacity: usize,
    pub natural_key_length: usize,
    pub columns: ColumnMapping,
    /// All rules must admit a row for it to be normalized
    pub eligibility: Vec<EligibilityRule>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::for_preset(ColumnPreset::Simple)
    }
}

impl IngestConfig {
    /// Columns and eligibility rules for a preset, with default sizes.
    ///
    /// The NPPES preset keeps individual providers (entity type 1) and only
    /// their primary taxonomy.
    pub fn for_preset(preset: ColumnPreset) -> Self {
        let (columns, eligibility) = match preset {
            ColumnPreset::Simple => (ColumnMapping::simple(), Vec::new()),
            ColumnPreset::Nppes => (
                ColumnMapping::nppes(),
                vec![
                    EligibilityRule::new("Entity Type Code", "1"),
                    EligibilityRule::new("Healthcare Provider Primary Taxonomy Switch_1", "Y"),
                ],
            ),
        };

        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            natural_key_length: DEFAULT_NATURAL_KEY_LENGTH,
            columns,
            eligibility,
        }
    }

    /// Load ingestion configuration from environment variables
    ///
    /// - `INGEST_COLUMN_PRESET`: simple, nppes
    /// - `INGEST_BATCH_SIZE`, `INGEST_CHANNEL_CAPACITY`, `INGEST_NATURAL_KEY_LENGTH`
    pub fn from_env() -> anyhow::Result<Self> {
        let preset = match std::env::var("INGEST_COLUMN_PRESET") {
            Ok(value) => value.parse()?,
            Err(_) => ColumnPreset::default(),
        };

        let mut config = Self::for_preset(preset);
        if let Ok(value) = std::env::var("INGEST_BATCH_SIZE") {
            config.batch_size = value.parse().context("INGEST_BATCH_SIZE must be an integer")?;
        }
        if let Ok(value) = std::env::var("INGEST_CHANNEL_CAPACITY") {
            config.channel_capacity = value
                .parse()
                .context("INGEST_CHANNEL_CAPACITY must be an integer")?;
        }
        if let Ok(value) = std::env::var("INGEST_NATURAL_KEY_LENGTH") {
            config.natural_key_length = value
                .parse()
                .context("INGEST_NATURAL_KEY_LENGTH must be an integer")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Restrict the run to rows whose region column matches `region`.
    pub fn with_region(mut self, region: &str) -> Self {
        let rule = EligibilityRule::new(self.columns.region.clone(), region.trim());
        self.eligibility.push(rule);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Every column the source must provide
    pub fn required_columns(&self) -> Vec<String> {
        let mut required: Vec<String> = Vec::new();
        let all = self
            .columns
            .columns()
            .chain(self.eligibility.iter().map(|r| r.column.as_str()));
        for column in all {
            if !required.iter().any(|c| c == column) {
                required.push(column.to_string());
            }
        }
        required
    }

    pub fn is_eligible(&self, row: &RawRow) -> bool {
        self.eligibility.iter().all(|rule| rule.admits(row))
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!(
                "INGEST_BATCH_SIZE must be between 1 and {}, got {}",
                MAX_BATCH_SIZE,
                self.batch_size
            );
        }
        if self.channel_capacity == 0 {
            anyhow::bail!("INGEST_CHANNEL_CAPACITY must be greater than 0");
        }
        if self.natural_key_length == 0 {
            anyhow::bail!("INGEST_NATURAL_KEY_LENGTH must be greater than 0");
        }
        if self.columns.name.is_empty() {
            anyhow::bail!("At least one name column must be mapped");
        }
        Ok(())
    }
}
