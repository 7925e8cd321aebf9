//! Shared utilities and types for feature modules
//!
//! - **pagination**: offset/limit request parameters and the page envelope

pub mod pagination;

pub use pagination::{Paginated, PaginationParams};
