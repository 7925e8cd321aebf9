//! Provreg Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the provider registry.
//!
//! # Overview
//!
//! - **Types**: the canonical provider record and the per-request query values
//!   ([`FilterSpec`], [`PageRequest`])
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use provreg_common::{FilterSpec, PageRequest};
//!
//! let filter = FilterSpec::new().region("tx").name_contains("smith");
//! let page = PageRequest::new(50, 0);
//! assert_eq!(filter.region_code.as_deref(), Some("TX"));
//! assert_eq!(page.limit, 50);
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{CanonicalRecord, FilterSpec, PageRequest};
