use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("unknown sub-agent id: {0}")]
    UnknownAgent(String),

    #[error("sub-agent already finished: {0}")]
    AlreadyFinished(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
