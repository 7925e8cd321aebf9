//! Common types used across provreg

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CommonError, Result};

// ============================================================================
// Canonical Record
// ============================================================================

/// The single authoritative, deduplicated representation of a provider.
///
/// Records are created only by ingestion. `id` and `created_at` are assigned by
/// the store on first insert and never change afterwards; `natural_key` is unique
/// across the whole store.
///
/// # Examples
///
/// ```rust,ignore
/// use provreg_common::types::CanonicalRecord;
///
/// let json = serde_json::to_value(&record)?;
/// assert_eq!(json["natural_key"], "1234567890");
/// assert!(json["phone"].is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// System-assigned identifier
    pub id: Uuid,
    /// Externally-issued registry number (NPI)
    pub natural_key: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub specialty_code: Option<String>,
    pub region_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Query Values
// ============================================================================

/// Predicates for one query or export.
///
/// All present filters are combined with AND. Blank inputs count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Exact match, uppercased before comparison
    pub region_code: Option<String>,
    /// Exact match
    pub specialty_code: Option<String>,
    /// Case-insensitive substring of the display name
    pub name_contains: Option<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from the three raw optional inputs a caller accepts.
    pub fn from_parts(
        region: Option<&str>,
        specialty: Option<&str>,
        name_contains: Option<&str>,
    ) -> Self {
        let mut filter = Self::new();
        if let Some(region) = region {
            filter = filter.region(region);
        }
        if let Some(specialty) = specialty {
            filter = filter.specialty(specialty);
        }
        if let Some(search) = name_contains {
            filter = filter.name_contains(search);
        }
        filter
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region_code = non_blank(region).map(|r| r.to_ascii_uppercase());
        self
    }

    pub fn specialty(mut self, specialty: &str) -> Self {
        self.specialty_code = non_blank(specialty).map(str::to_string);
        self
    }

    pub fn name_contains(mut self, fragment: &str) -> Self {
        self.name_contains = non_blank(fragment).map(str::to_string);
        self
    }

    /// True when no predicate is set (matches every record)
    pub fn is_unfiltered(&self) -> bool {
        self.region_code.is_none() && self.specialty_code.is_none() && self.name_contains.is_none()
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Offset-addressed window over a filtered result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Validate the window and clamp `limit` to `max_limit`.
    ///
    /// A non-positive limit or a negative offset is rejected; an offset past the
    /// end of the result set is not an error.
    pub fn clamped(self, max_limit: i64) -> Result<Self> {
        if self.limit <= 0 {
            return Err(CommonError::invalid_page(format!(
                "limit must be positive, got {}",
                self.limit
            )));
        }
        if self.offset < 0 {
            return Err(CommonError::invalid_page(format!(
                "offset must not be negative, got {}",
                self.offset
            )));
        }
        Ok(Self {
            limit: self.limit.min(max_limit.max(1)),
            offset: self.offset,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_filter_region_is_uppercased() {
        let filter = FilterSpec::new().region(" tx ");
        assert_eq!(filter.region_code.as_deref(), Some("TX"));
    }

    #[test]
    fn test_filter_blank_inputs_are_absent() {
        let filter = FilterSpec::from_parts(Some("  "), Some(""), Some("\t"));
        assert!(filter.is_unfiltered());
    }

    #[test]
    fn test_filter_from_parts() {
        let filter = FilterSpec::from_parts(Some("ca"), Some("207RP1001X"), Some("Smith"));
        assert_eq!(filter.region_code.as_deref(), Some("CA"));
        assert_eq!(filter.specialty_code.as_deref(), Some("207RP1001X"));
        assert_eq!(filter.name_contains.as_deref(), Some("Smith"));
        assert!(!filter.is_unfiltered());
    }

    #[test]
    fn test_page_request_clamps_limit() {
        let page = PageRequest::new(5000, 10).clamped(1000).unwrap();
        assert_eq!(page.limit, 1000);
        assert_eq!(page.offset, 10);
    }

    #[test]
    fn test_page_request_rejects_negative_offset() {
        let err = PageRequest::new(10, -1).clamped(100).unwrap_err();
        assert!(matches!(err, CommonError::InvalidPageRequest(_)));
    }

    #[test]
    fn test_page_request_rejects_non_positive_limit() {
        assert!(PageRequest::new(0, 0).clamped(100).is_err());
        assert!(PageRequest::new(-5, 0).clamped(100).is_err());
    }

    #[test]
    fn test_record_serializes_absent_fields_as_null() {
        let record = CanonicalRecord {
            id: Uuid::nil(),
            natural_key: "1234567890".to_string(),
            display_name: "Jane Smith".to_string(),
            phone: None,
            specialty_code: None,
            region_code: Some("TX".to_string()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["phone"].is_null());
        assert_eq!(json["region_code"], "TX");
    }

    #[test]
    fn test_record_json_keys_are_snake_case() {
        let record = CanonicalRecord {
            id: Uuid::nil(),
            natural_key: "1234567890".to_string(),
            display_name: "Jane Smith".to_string(),
            phone: None,
            specialty_code: None,
            region_code: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        let mut keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "created_at",
                "display_name",
                "id",
                "natural_key",
                "phone",
                "region_code",
                "specialty_code"
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_clamped_limit_never_exceeds_max(limit in 1i64..100_000, max in 1i64..5_000) {
            let page = PageRequest::new(limit, 0).clamped(max).unwrap();
            prop_assert!(page.limit <= max);
            prop_assert!(page.limit >= 1);
        }
    }
}
