use thiserror::Error;

/// Application-wide error types for Trawl.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request to a collaborator failed before a response arrived.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The extraction worker answered with a non-success status.
    #[error("Extraction worker error (HTTP {status_code}): {message}")]
    WorkerError { message: String, status_code: u16 },

    /// The analysis worker answered with a non-success status.
    #[error("Analysis error (HTTP {status_code}): {message}")]
    AnalysisError { message: String, status_code: u16 },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request or job deadline elapsed.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Work was abandoned because its cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A registry update would break a job invariant (terminal finality,
    /// monotone progress).
    #[error("Invalid job transition: {0}")]
    InvalidTransition(String),

    /// Caller supplied a malformed request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A background task panicked before it could record an outcome.
    #[error("Pipeline task failed: {0}")]
    TaskFailed(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true for the "unknown id" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}
