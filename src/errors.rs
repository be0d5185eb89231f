use crate::db::StoreError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Request shape is wrong; lists every violated field.
    #[error("Invalid request: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("{0}")]
    BadInput(String),
    #[error("{0}")]
    UserAlreadyExists(String),
    #[error("User with username: '{0}' not found")]
    UserNotFound(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("Token is malformed: {0}")]
    TokenMalformed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to hash password: {0}")]
    PasswordHash(String),
    #[error("Failed to sign token: {0}")]
    TokenSigning(String),
}

impl AuthError {
    fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Store(_) | AuthError::PasswordHash(_) | AuthError::TokenSigning(_)
        )
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::BadInput(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken(_) | AuthError::TokenMalformed(_) => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
            AuthError::Store(_) | AuthError::PasswordHash(_) | AuthError::TokenSigning(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_internal() {
            error!(error = %self, "Request failed with internal error");
            return HttpResponse::build(self.status_code()).json(serde_json::json!({
                "error": "Internal server error"
            }));
        }

        let body = match self {
            AuthError::Validation(violations) => serde_json::json!({
                "error": "Invalid request",
                "violations": violations,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
