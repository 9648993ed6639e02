//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::application::token_issuer::TokenError;
use crate::domain::collaborator::CollaboratorError;
use crate::domain::entity::SessionSummary;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input; every violated rule is listed
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Wrong email or wrong password, indistinguishable on purpose
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Single-session policy blocked a login
    #[error("An active session already exists for this account")]
    SessionConflict(Vec<SessionSummary>),

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Account not found")]
    AccountNotFound,

    /// Unknown, closed or expired session
    #[error("Session not found or no longer active")]
    SessionNotFound,

    #[error("Reset token not found")]
    ResetTokenNotFound,

    #[error(transparent)]
    Token(#[from] TokenError),

    /// No `Authorization: Bearer` header on a protected request
    #[error("Missing bearer token")]
    MissingToken,

    /// Session exists but the second factor is still pending
    #[error("Two-factor verification required")]
    SecondFactorRequired,

    #[error("Invalid two-factor verification code")]
    InvalidSecondFactorCode,

    /// Authenticated but role not allowed
    #[error("Insufficient permissions")]
    Forbidden,

    /// Email or geolocation collaborator failed
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) => ErrorKind::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::Token(_)
            | AuthError::MissingToken
            | AuthError::SessionNotFound
            | AuthError::InvalidSecondFactorCode => ErrorKind::Unauthorized,
            AuthError::SecondFactorRequired | AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::AccountNotFound | AuthError::ResetTokenNotFound => ErrorKind::NotFound,
            AuthError::SessionConflict(_) | AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::ExternalService(_) => ErrorKind::ServiceUnavailable,
            AuthError::Database(e) => database_kind(e),
            AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    ///
    /// Store and internal failures get a generic message; their detail only
    /// goes to the log.
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::Validation(errors) => AppError::bad_request("Validation failed")
                .with_details(serde_json::json!({ "errors": errors })),
            AuthError::SessionConflict(sessions) => AppError::conflict(self.to_string())
                .with_action("Close the existing session and sign in again")
                .with_details(serde_json::json!({ "activeSessions": sessions })),
            AuthError::SecondFactorRequired => AppError::forbidden(self.to_string())
                .with_action("Submit the verification code to /second-factor"),
            AuthError::ExternalService(_) => AppError::service_unavailable(self.to_string())
                .with_action("Retry the request later"),
            AuthError::Database(_) | AuthError::Internal(_) => {
                AppError::new(self.kind(), "Internal server error")
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::ExternalService(msg) => {
                tracing::warn!(message = %msg, "Auth collaborator failure");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::SessionConflict(sessions) => {
                tracing::warn!(active = sessions.len(), "Login blocked by active session");
            }
            AuthError::Forbidden => {
                tracing::warn!("Forbidden request");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

/// Connection-level failures are "unavailable", everything else is internal
fn database_kind(e: &sqlx::Error) -> ErrorKind {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            ErrorKind::ServiceUnavailable
        }
        _ => ErrorKind::InternalServerError,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

/// Consuming conversion; a database error stays attached as the source
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let app_error = err.to_app_error();
        match err {
            AuthError::Database(e) => app_error.with_source(e),
            _ => app_error,
        }
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err.kind() {
            ErrorKind::BadRequest => {
                AuthError::Validation(vec![err.message().to_string()])
            }
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<CollaboratorError> for AuthError {
    fn from(err: CollaboratorError) -> Self {
        AuthError::ExternalService(err.to_string())
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
