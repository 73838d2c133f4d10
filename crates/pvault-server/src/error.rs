//! HTTP error mapping.
//!
//! Every error response has the shape `{"error": "...", "constraint": "..."}`
//! where `constraint` is a stable machine-readable token. Anything not
//! enumerated collapses into `internal` with a constant message, so
//! cryptographic and storage failures are indistinguishable from outside.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use pvault_core::error::VaultError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Malformed JSON, missing fields, invalid identifier or tier.
    InvalidRequest(String),
    /// Missing or invalid credentials.
    Unauthenticated(String),
    /// The vault is locked.
    Locked,
    /// The token's scope does not cover the requested field.
    ScopeExceeded,
    /// The operation requires a session token, not a service token.
    SessionRequired,
    /// Requested resource not found.
    NotFound(String),
    /// A state conflict (for example, double unlock).
    Conflict(String),
    /// The vault has not been initialized.
    NotInitialized,
    /// Too many unlock attempts.
    RateLimited,
    /// Internal error. The message is constant by design.
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    constraint: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, constraint, message) = match self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            Self::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            Self::Locked => (
                StatusCode::FORBIDDEN,
                "vault_locked",
                "vault is locked".to_owned(),
            ),
            Self::ScopeExceeded => (
                StatusCode::FORBIDDEN,
                "scope_exceeded",
                "token scope does not allow access to this field".to_owned(),
            ),
            Self::SessionRequired => (
                StatusCode::FORBIDDEN,
                "session_required",
                "this operation requires a session token, not a service token".to_owned(),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::NotInitialized => (
                StatusCode::PRECONDITION_FAILED,
                "not_initialized",
                "vault is not initialized".to_owned(),
            ),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "too many unlock attempts, try again later".to_owned(),
            ),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error".to_owned(),
            ),
        };

        let body = ErrorBody {
            error: message,
            constraint,
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Locked => Self::Locked,
            VaultError::AlreadyUnlocked => Self::Conflict("vault is already unlocked".to_owned()),
            VaultError::NotInitialized => Self::NotInitialized,
            VaultError::AlreadyInitialized => {
                Self::Conflict("vault is already initialized".to_owned())
            }
            VaultError::WrongPassword => {
                Self::Unauthenticated("wrong password or secret key".to_owned())
            }
            VaultError::InvalidTier | VaultError::InvalidFieldId { .. } => {
                Self::InvalidRequest(err.to_string())
            }
            // Crypto, storage, metadata, and I/O failures all collapse into
            // the constant internal envelope.
            VaultError::Crypto(_)
            | VaultError::Store(_)
            | VaultError::Metadata { .. }
            | VaultError::Io(_) => Self::Internal,
        }
    }
}
