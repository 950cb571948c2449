use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database is closed")]
    Closed,

    #[error("database worker is unavailable")]
    WorkerUnavailable,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("statement failed: {0}")]
    StatementFailed(&'static str),
}
