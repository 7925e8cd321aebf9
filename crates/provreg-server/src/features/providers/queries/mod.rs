pub mod export;
pub mod get_by_npi;
pub mod list;

pub use export::{csv_chunks, ExportCursor, ExportError, ExportProvidersQuery};
pub use get_by_npi::{GetProviderError, GetProviderQuery};
pub use list::{query_page, ListProvidersError, ListProvidersQuery, ListProvidersResponse};
