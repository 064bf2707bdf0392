use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::errors::DomainError;

/// Non-standard status returned for any storage fault.
pub const DATABASE_ERROR_STATUS: u16 = 725;
pub const DATABASE_ERROR_TITLE: &str = "Database Error";
pub const DATABASE_ERROR_DESCRIPTION: &str =
    "Sorry, couldn't write your thing to the database. It worked on my box.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::OutOfStock(_) | DomainError::InvalidSku(_) | DomainError::DuplicateBatch(_) => {
                AppError::BadRequest(e.to_string())
            }
            DomainError::NotFound(_) => AppError::NotFound(e.to_string()),
            DomainError::Storage(msg) => AppError::Storage(msg),
            DomainError::UnitOfWorkClosed => AppError::Internal(e.to_string()),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::from_u16(DATABASE_ERROR_STATUS)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::BadRequest(msg) | AppError::NotFound(msg) => {
                HttpResponse::build(self.status_code()).json(serde_json::json!({
                    "message": msg
                }))
            }
            AppError::Storage(cause) => {
                log::error!("Storage fault: {}", cause);
                HttpResponse::build(self.status_code()).json(serde_json::json!({
                    "title": DATABASE_ERROR_TITLE,
                    "description": DATABASE_ERROR_DESCRIPTION
                }))
            }
            AppError::Internal(cause) => {
                log::error!("Internal error: {}", cause);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }))
            }
        }
    }
}

/// Failures while bringing the service up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create database connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Failed to run database migrations: {0}")]
    Migrations(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
