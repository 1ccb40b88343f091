//! Error types for the highlight server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use highlight_core::HighlightError;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A document could not be parsed, annotated or saved
    #[error("Document error: {0}")]
    Document(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::Document(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DOCUMENT_ERROR"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<HighlightError> for ServerError {
    fn from(err: HighlightError) -> Self {
        match err {
            HighlightError::InvalidRequest(msg) => ServerError::InvalidRequest(msg),
            other => ServerError::Document(other.to_string()),
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        ServerError::InvalidRequest(format!("Malformed multipart body: {}", err))
    }
}

impl From<JoinError> for ServerError {
    fn from(err: JoinError) -> Self {
        ServerError::Internal(format!("Annotation task failed: {}", err))
    }
}
