use thiserror::Error;

/// The five error kinds from the runtime's error-handling design: input,
/// permission, transient-provider, stateful-integrity, and fatal. Every
/// crate's own error type converts into this one at its public boundary.
#[derive(Debug, Error)]
pub enum BasaltError {
    /// Malformed schedule, unparseable time expression, invalid chat id,
    /// unknown tool name — reported in-band, never raised further.
    #[error("input error: {0}")]
    Input(String),

    /// Path sandbox rejection, SSRF rejection, disallowed command.
    #[error("permission denied: {0}")]
    Permission(String),

    /// LLM 5xx, network timeout, channel rate-limit — retried by the caller.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// History token count exceeds budget after an append and compaction
    /// also failed, or another state invariant could not be restored.
    #[error("stateful integrity error: {0}")]
    Integrity(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BasaltError {
    /// Short error code used in logs and the `/health` surface.
    pub fn code(&self) -> &'static str {
        match self {
            BasaltError::Input(_) => "INPUT_ERROR",
            BasaltError::Permission(_) => "PERMISSION_ERROR",
            BasaltError::Transient(_) => "TRANSIENT_ERROR",
            BasaltError::Integrity(_) => "INTEGRITY_ERROR",
            BasaltError::Config(_) => "CONFIG_ERROR",
            BasaltError::Serialization(_) => "SERIALIZATION_ERROR",
            BasaltError::Io(_) => "IO_ERROR",
            BasaltError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller should retry this error per §5's retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, BasaltError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, BasaltError>;
