use provreg_common::CanonicalRecord;
use serde::{Deserialize, Serialize};

use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetProviderQuery {
    pub npi: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetProviderError {
    #[error("NPI is required")]
    NpiRequired,
    #[error("Provider '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GetProviderQuery {
    pub fn validate(&self) -> Result<(), GetProviderError> {
        if self.npi.trim().is_empty() {
            return Err(GetProviderError::NpiRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(store))]
pub async fn handle<S>(store: &S, query: GetProviderQuery) -> Result<CanonicalRecord, GetProviderError>
where
    S: RecordStore + ?Sized,
{
    query.validate()?;
    let npi = query.npi.trim();

    store
        .find_by_natural_key(npi)
        .await?
        .ok_or_else(|| GetProviderError::NotFound(npi.to_string()))
}
