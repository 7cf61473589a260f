//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing authorization header.
    #[error("missing authorization header")]
    MissingAuthHeader,

    /// Invalid authorization header format.
    #[error("invalid authorization header format")]
    InvalidAuthHeader,

    /// Invalid token.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token expired.
    #[error("token expired")]
    TokenExpired,

    /// Insufficient permissions.
    #[error("insufficient permissions: {0}")]
    InsufficientPermissions(String),

    /// Dev user not found.
    #[error("user not found")]
    UserNotFound,

    /// Internal error.
    #[error("internal auth error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl AuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::MissingAuthHeader => (StatusCode::UNAUTHORIZED, "MISSING_AUTH_HEADER"),
            AuthError::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "INVALID_AUTH_HEADER"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::InsufficientPermissions(_) => {
                (StatusCode::FORBIDDEN, "INSUFFICIENT_PERMISSIONS")
            }
            AuthError::UserNotFound => (StatusCode::UNAUTHORIZED, "USER_NOT_FOUND"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error_code = code, error = %self, "Auth error");
        } else {
            tracing::debug!(error_code = code, error = %self, "Rejected request");
        }

        let body = Json(AuthErrorResponse {
            error: self.to_string(),
            code,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        let err = AuthError::MissingAuthHeader;
        assert_eq!(err.to_string(), "missing authorization header");

        let err = AuthError::InvalidToken("bad".to_string());
        assert_eq!(err.to_string(), "invalid token: bad");
    }

    #[test]
    fn test_auth_error_status() {
        assert_eq!(
            AuthError::TokenExpired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions("admin".into())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
    }
}
