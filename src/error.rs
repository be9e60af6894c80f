//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const INVALID_ID_MESSAGE: &str = "ID is invalid";
pub const NOT_FOUND_MESSAGE: &str = "No item with that identifier has been found";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Failures raised by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),
    #[error("document {0} does not exist")]
    MissingDocument(uuid::Uuid),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{}", INVALID_ID_MESSAGE)]
    InvalidIdentifier,
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound,
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// A list or save/delete failure, reported to the client with its message.
    #[error("{0}")]
    OperationFailed(String),
    /// Storage failure outside the list and save/delete paths.
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidIdentifier | AppError::OperationFailed(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound | AppError::UnknownModel(_) => StatusCode::NOT_FOUND,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::InvalidIdentifier => "invalid_identifier",
            AppError::NotFound | AppError::UnknownModel(_) => "not_found",
            AppError::OperationFailed(_) => "operation_failed",
            AppError::Store(_) => "storage_error",
            AppError::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
