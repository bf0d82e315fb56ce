use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("memory entry not found: {0}")]
    NotFound(String),

    #[error("search timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, MemoryError>;
