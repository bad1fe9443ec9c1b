use super::validation::ValidationError;
use thiserror::Error;

/// Failures of catalog edits that callers map to distinct outcomes
/// (404, 400, validation message, 500).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Internal(err.into())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
