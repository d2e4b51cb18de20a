use thiserror::Error;

use crate::db::DatabaseError;
use crate::lock::LockError;
use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum TubesumError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, TubesumError>;
