use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Application errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_type = match self {
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Database(_) => "DatabaseError",
            AppError::Collaborator(_) => "CollaboratorError",
            AppError::Unavailable(_) => "Unavailable",
            AppError::Internal(_) => "InternalError",
        };

        let response = ErrorResponse {
            error: ErrorDetail {
                error_type: error_type.to_string(),
                message: self.to_string(),
            },
        };

        HttpResponse::build(self.status_code()).json(response)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
