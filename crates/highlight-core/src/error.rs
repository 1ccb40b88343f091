use thiserror::Error;

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page lookup failed: {0}")]
    PageError(String),

    #[error("Annotation could not be written: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
