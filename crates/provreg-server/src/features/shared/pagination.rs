//! Shared pagination utilities
//!
//! Offset/limit windows over a filtered, id-ordered result set.
//!
//! # Examples
//!
//! ```rust,ignore
//! use provreg_server::features::shared::pagination::{Paginated, PaginationParams};
//!
//! let params = PaginationParams::new(Some(20), Some(40));
//! let page = params.to_page_request(50).clamped(1000)?;
//!
//! // After fetching data...
//! let response = Paginated::new(records, total, page);
//! ```

use provreg_common::PageRequest;
use serde::{Deserialize, Serialize};

/// Raw pagination request parameters
///
/// Both fields are optional on the wire; validation happens when the window is
/// clamped, so a negative offset is reported rather than silently corrected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PaginationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    /// Fill in defaults: `default_limit` rows starting at offset 0.
    pub fn to_page_request(&self, default_limit: i64) -> PageRequest {
        PageRequest::new(self.limit.unwrap_or(default_limit), self.offset.unwrap_or(0))
    }
}

/// One page of results together with the total match count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Records matching the filter, ignoring the window
    pub total: i64,
    /// Effective limit after clamping
    pub limit: i64,
    pub offset: i64,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: PageRequest) -> Self {
        Self {
            total,
            limit: page.limit,
            offset: page.offset,
            data,
        }
    }

    /// Offset of the following page, if any rows remain
    pub fn next_offset(&self) -> Option<i64> {
        let next = self.offset + self.data.len() as i64;
        (!self.data.is_empty() && next < self.total).then_some(next)
    }

    /// Map items to a different type
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Paginated<U> {
        Paginated {
            total: self.total,
            limit: self.limit,
            offset: self.offset,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults() {
        let page = PaginationParams::default().to_page_request(50);
        assert_eq!(page.limit, 50);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn test_params_keep_invalid_values_for_validation() {
        let page = PaginationParams::new(Some(0), Some(-3)).to_page_request(50);
        assert_eq!(page, PageRequest::new(0, -3));
        assert!(page.clamped(1000).is_err());
    }

    #[test]
    fn test_next_offset() {
        let page = Paginated::new(vec![1, 2], 5, PageRequest::new(2, 2));
        assert_eq!(page.next_offset(), Some(4));

        let last = Paginated::new(vec![5], 5, PageRequest::new(2, 4));
        assert_eq!(last.next_offset(), None);

        let past_end: Paginated<i32> = Paginated::new(vec![], 5, PageRequest::new(2, 10));
        assert_eq!(past_end.next_offset(), None);
    }

    #[test]
    fn test_map() {
        let page = Paginated::new(vec![1, 2], 2, PageRequest::new(10, 0)).map(|n| n * 10);
        assert_eq!(page.data, vec![10, 20]);
        assert_eq!(page.total, 2);
    }
}
