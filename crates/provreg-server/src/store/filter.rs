//! Filter compilation
//!
//! A [`FilterSpec`] is what a caller asks for; a [`RecordFilter`] is what the
//! store executes. Compilation is pure: it normalizes case and prepares the
//! name fragment for a `LIKE` comparison, so the same filter means the same
//! thing to the PostgreSQL and in-memory stores.

use provreg_common::{CanonicalRecord, FilterSpec};

/// Store-ready form of a [`FilterSpec`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub region_code: Option<String>,
    pub specialty_code: Option<String>,
    /// Lowercased fragment, unescaped
    pub name_fragment: Option<String>,
}

impl RecordFilter {
    /// Compile a caller's filter into bound values for the store.
    pub fn compile(spec: &FilterSpec) -> Self {
        Self {
            region_code: spec
                .region_code
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_uppercase),
            specialty_code: spec
                .specialty_code
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            name_fragment: spec
                .name_contains
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
        }
    }

    /// `LIKE` pattern for the name fragment, with `%`, `_` and `\` escaped so
    /// they match literally under `ESCAPE '\'`.
    pub fn like_pattern(&self) -> Option<String> {
        self.name_fragment.as_deref().map(|fragment| {
            let mut pattern = String::with_capacity(fragment.len() + 2);
            pattern.push('%');
            for ch in fragment.chars() {
                if matches!(ch, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(ch);
            }
            pattern.push('%');
            pattern
        })
    }

    /// Evaluate the filter against a record in memory.
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if let Some(ref region) = self.region_code {
            if record.region_code.as_deref() != Some(region.as_str()) {
                return false;
            }
        }
        if let Some(ref specialty) = self.specialty_code {
            if record.specialty_code.as_deref() != Some(specialty.as_str()) {
                return false;
            }
        }
        if let Some(ref fragment) = self.name_fragment {
            if !record.display_name.to_lowercase().contains(fragment.as_str()) {
                return false;
            }
        }
        true
    }
}

impl From<&FilterSpec> for RecordFilter {
    fn from(spec: &FilterSpec) -> Self {
        Self::compile(spec)
    }
}
