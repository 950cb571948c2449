use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid file direction code: {0}")]
    InvalidDirection(i64),

    #[error("invalid file status code: {0}")]
    InvalidStatus(i64),
}
