use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {key}")]
    NotFound { key: String },

    #[error("invalid session key: {0}")]
    InvalidKey(String),

    #[error("session limit exceeded: max {limit}")]
    LimitExceeded { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] basalt_core::error::BasaltError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for basalt_core::error::BasaltError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound { .. } | SessionError::InvalidKey(_) => {
                basalt_core::error::BasaltError::Input(e.to_string())
            }
            SessionError::LimitExceeded { .. } => {
                basalt_core::error::BasaltError::Integrity(e.to_string())
            }
            SessionError::Io(inner) => basalt_core::error::BasaltError::Io(inner),
            SessionError::Serialization(inner) => {
                basalt_core::error::BasaltError::Serialization(inner)
            }
            SessionError::Core(inner) => inner,
        }
    }
}
