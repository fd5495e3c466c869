use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum OfferbookError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Record {id} changed concurrently; gave up after {attempts} attempts")]
    Conflict { id: Uuid, attempts: u32 },

    #[error("Store operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
