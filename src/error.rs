use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, RankingError>;

#[derive(Error, Debug)]
pub enum RankingError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for RankingError {
    fn from(err: anyhow::Error) -> Self {
        RankingError::Internal(err.to_string())
    }
}
