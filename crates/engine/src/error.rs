use parley_core::CoreError;
use parley_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("history database is unavailable")]
    Unavailable,

    #[error("result buffer lock poisoned")]
    Poisoned,

    #[error("missing or malformed column {0}")]
    Column(usize),
}
