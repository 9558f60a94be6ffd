//! Error handling middleware - RFC 7807 compliant responses.

use std::fmt;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use cadence_core::error::{DomainError, RepoError};
use cadence_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest { code: &'static str, detail: String },
    Forbidden,
    Conflict { code: &'static str, detail: String },
    Internal(String),
}

impl AppError {
    pub fn invalid_input(detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            code: "invalid_input",
            detail: detail.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest { code, .. } | AppError::Conflict { code, .. } => *code,
            AppError::Forbidden => "forbidden",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest { detail, .. } => write!(f, "Bad request: {}", detail),
            AppError::Forbidden => write!(f, "Forbidden"),
            AppError::Conflict { detail, .. } => write!(f, "Conflict: {}", detail),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::BadRequest { detail, .. } => ErrorResponse::bad_request(detail),
            AppError::Forbidden => ErrorResponse::forbidden(),
            AppError::Conflict { detail, .. } => ErrorResponse::conflict(detail),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
        };

        HttpResponse::build(self.status_code()).json(error.with_code(self.code()))
    }
}

// Conversion from domain errors
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let code = err.code();
        match err {
            DomainError::NotFound { entity_type, id } => {
                AppError::NotFound(format!("{} with id {} not found", entity_type, id))
            }
            DomainError::InvalidInput(detail) => AppError::BadRequest { code, detail },
            DomainError::InPast { .. } => AppError::BadRequest {
                code,
                detail: err.to_string(),
            },
            DomainError::InvalidTransition { .. } | DomainError::PublishInProgress(_) => {
                AppError::Conflict {
                    code,
                    detail: err.to_string(),
                }
            }
            DomainError::Forbidden => AppError::Forbidden,
            DomainError::Repository(e) => e.into(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("Resource not found".to_string()),
            RepoError::Constraint(detail) | RepoError::Conflict(detail) => AppError::Conflict {
                code: "conflict",
                detail,
            },
            RepoError::Connection(msg) => {
                tracing::error!("Database connection error: {}", msg);
                AppError::Internal("Database error".to_string())
            }
            RepoError::Query(msg) => {
                tracing::error!("Database query error: {}", msg);
                AppError::Internal("Database error".to_string())
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
