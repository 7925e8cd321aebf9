//! Row normalization
//!
//! Turns a [`RawRow`] into a [`NewRecord`] or a [`RejectReason`]. Pure and
//! deterministic; the same row always yields the same result.
//!
//! Field rules:
//!
//! | Field     | Rule                                                            |
//! |-----------|-----------------------------------------------------------------|
//! | key       | trimmed, exactly N ASCII digits, otherwise rejected             |
//! | name      | mapped parts trimmed and joined by one space; empty is rejected |
//! | region    | blank is absent; two letters uppercased; anything else rejected |
//! | phone     | digits only; 10 digits (or 11 with a leading 1) as NNN-NNN-NNNN |
//! | specialty | trimmed; blank is absent                                        |

use super::config::ColumnMapping;
use super::models::{RawRow, RejectReason};
use crate::store::NewRecord;

#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    columns: ColumnMapping,
    natural_key_length: usize,
}

impl RecordNormalizer {
    pub fn new(columns: ColumnMapping, natural_key_length: usize) -> Self {
        Self {
            columns,
            natural_key_length,
        }
    }

    pub fn normalize(&self, row: &RawRow) -> Result<NewRecord, RejectReason> {
        let natural_key = self.natural_key(row)?;
        let display_name = self.display_name(row)?;
        let region_code = normalize_region(field(row, &self.columns.region))?;

        Ok(NewRecord {
            natural_key,
            display_name,
            phone: normalize_phone(field(row, &self.columns.phone)),
            specialty_code: non_blank(field(row, &self.columns.specialty)).map(str::to_string),
            region_code,
        })
    }

    fn natural_key(&self, row: &RawRow) -> Result<String, RejectReason> {
        let key = field(row, &self.columns.natural_key).trim();
        if key.len() == self.natural_key_length && key.bytes().all(|b| b.is_ascii_digit()) {
            Ok(key.to_string())
        } else {
            Err(RejectReason::InvalidNaturalKey)
        }
    }

    fn display_name(&self, row: &RawRow) -> Result<String, RejectReason> {
        let parts: Vec<&str> = self
            .columns
            .name
            .iter()
            .filter_map(|column| non_blank(field(row, column)))
            .collect();
        if parts.is_empty() {
            return Err(RejectReason::MissingName);
        }
        Ok(parts.join(" "))
    }
}

fn field<'a>(row: &'a RawRow, column: &str) -> &'a str {
    row.get(column).unwrap_or("")
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn normalize_region(raw: &str) -> Result<Option<String>, RejectReason> {
    let Some(region) = non_blank(raw) else {
        return Ok(None);
    };
    if region.len() == 2 && region.bytes().all(|b| b.is_ascii_alphabetic()) {
        Ok(Some(region.to_ascii_uppercase()))
    } else {
        Err(RejectReason::InvalidRegionCode)
    }
}

/// Canonical phone form.
///
/// NPPES stores numbers as bare digits, sometimes with a trailing `.0` left by
/// spreadsheet exports; a fractional zero is dropped before extracting digits.
fn normalize_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let national = match digits.len() {
        0 => return None,
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => return Some(digits),
    };

    Some(format!(
        "{}-{}-{}",
        &national[0..3],
        &national[3..6],
        &national[6..10]
    ))
}
