use thiserror::Error;

#[derive(Error, Debug)]
pub enum AskDbError {
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("SQL generation failed: {0}")]
    GenerationFailed(String),

    /// Carries the database engine's message as-is.
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AskDbError {
    /// Whether the failure was caused by the caller rather than an upstream service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AskDbError::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, AskDbError>;
