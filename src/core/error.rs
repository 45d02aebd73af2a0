use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Malformed input, rejected before any state is touched
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invoice, line item or payment does not exist (or is soft-deleted)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mutation attempted against a lifecycle precondition violation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invoice changed between load and commit; retry against fresh state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Recomputed totals failed to reconcile; the write is aborted
    #[error("Arithmetic invariant violated: {0}")]
    InvariantViolation(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        // Internal failures are logged in full but never echoed to the caller
        let error_message = match self {
            AppError::InvariantViolation(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed with internal error");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AppError::InvalidState(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        AppError::InvariantViolation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Whether the caller may retry the whole operation against freshly-read state
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}
