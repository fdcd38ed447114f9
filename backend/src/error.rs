use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Every failure the desk can surface. Each one ends up as a single
/// user-visible notice; nothing is retried.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("{0}")]
    Validation(String),
    #[error("UserID {0} exists. Pick another.")]
    DuplicateUser(String),
    #[error("No local account found. Create one.")]
    Auth,
    #[error("Voice not supported by this browser")]
    PlatformUnavailable,
    #[error("Voice recognition error: {0}")]
    Recognition(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, HealthError>;

impl HealthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HealthError::Validation(msg.into())
    }
}

impl From<sqlx::Error> for HealthError {
    fn from(err: sqlx::Error) -> Self {
        HealthError::Storage(err.to_string())
    }
}

impl ResponseError for HealthError {
    fn status_code(&self) -> StatusCode {
        match self {
            HealthError::Validation(_) => StatusCode::BAD_REQUEST,
            HealthError::DuplicateUser(_) => StatusCode::CONFLICT,
            HealthError::Auth => StatusCode::UNAUTHORIZED,
            HealthError::PlatformUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            HealthError::Recognition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HealthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let HealthError::Storage(msg) = self {
            log::error!("❌ Storage failure: {}", msg);
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "notice": self.to_string() }))
    }
}
