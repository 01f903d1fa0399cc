use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// AppError
///
/// The single failure taxonomy shared by the repository, the services and the HTTP boundary.
/// Each service method fails fast with the most specific variant; only `into_response`
/// decides which status code and message the client sees.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input. Caller-fixable.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, expired or forged credential, or a credential whose account is gone.
    #[error("authentication required")]
    Unauthenticated,

    /// Login failed. Same message for an unknown email and a wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Authenticated, but not the owner of the resource.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation reported by the store.
    #[error("{0}")]
    Conflict(String),

    /// Underlying store or file stash failure. Never caller-fixable.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result alias used by every repository and service method.
pub type AppResult<T> = Result<T, AppError>;

/// ErrorBody
///
/// Wire shape of every failed request: `{ "message": "..." }`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store failures are logged in full but reported vaguely.
        let message = match &self {
            AppError::Storage(detail) => {
                tracing::error!(error = %detail, "storage error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

/// Flattens every field message into one sorted, comma-separated string.
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = e
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => error.code.to_string(),
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join(", "))
    }
}

/// Undecodable JSON bodies and wrong content types surface as 400 with the usual body.
impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Validation(format!("invalid multipart body: {}", e.body_text()))
    }
}

/// Maps a failed insert to `Conflict` when Postgres reports a unique violation (23505),
/// otherwise to `Storage`.
pub fn conflict_or_storage(e: sqlx::Error, conflict_message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(conflict_message.to_string())
        }
        _ => AppError::from(e),
    }
}
