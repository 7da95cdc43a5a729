use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Nothing to index, e.g. a document that produced no extractable text.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid passage: {0}")]
    InvalidPassage(String),

    /// Vectors of different lengths met where one dimension is required.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Answer generation failed: {0}")]
    GenerationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True for failures of an external model dependency; the same call may
    /// succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EncodingFailed(_) | Self::RetrievalUnavailable(_) | Self::GenerationFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
