//! CSV encoding for exports
//!
//! One header line, then one line per record. Absent optional fields are empty
//! cells; `created_at` is RFC 3339 in UTC. Quoting follows RFC 4180 and is
//! applied only when a field contains a delimiter, quote or line break.

use csv::{QuoteStyle, WriterBuilder};
use provreg_common::CanonicalRecord;

/// Export column order
pub const EXPORT_HEADER: [&str; 7] = [
    "id",
    "natural_key",
    "name",
    "phone",
    "specialty",
    "region",
    "created_at",
];

fn encode_line<I, T>(fields: I) -> Result<Vec<u8>, csv::Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::with_capacity(128));
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

pub fn encode_header() -> Result<Vec<u8>, csv::Error> {
    encode_line(EXPORT_HEADER)
}

pub fn encode_record(record: &CanonicalRecord) -> Result<Vec<u8>, csv::Error> {
    let id = record.id.to_string();
    let created_at = record.created_at.to_rfc3339();
    encode_line([
        id.as_str(),
        record.natural_key.as_str(),
        record.display_name.as_str(),
        record.phone.as_deref().unwrap_or(""),
        record.specialty_code.as_deref().unwrap_or(""),
        record.region_code.as_deref().unwrap_or(""),
        created_at.as_str(),
    ])
}
