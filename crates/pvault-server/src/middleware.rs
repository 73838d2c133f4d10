//! Bearer-token authentication for protected routes.
//!
//! The `Authorization: Bearer <token>` value is tried first as the session
//! token (constant-time compare against the live session, full `*` scope),
//! then as a service token (hash → lookup → usage and expiry check, the
//! token's own scope). Either way the session idle timer is refreshed;
//! service-token access additionally records an `api_access` audit entry.
//! Double failure is `unauthenticated`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use pvault_core::store::AccessEvent;

use crate::error::AppError;
use crate::state::AppState;

/// How the request authenticated, injected into request extensions.
/// Handlers branch once on this variant and thereafter use only the scope.
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// Session token: full access.
    Session,
    /// Service token: access limited to the token's scope.
    Service { scope: String },
}

impl AuthContext {
    /// The effective scope string for this request.
    #[must_use]
    pub fn scope(&self) -> &str {
        match self {
            Self::Session => "*",
            Self::Service { scope } => scope,
        }
    }

    /// Whether the request authenticated with the session token.
    #[must_use]
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session)
    }
}

/// Middleware validating the `Authorization` header on protected routes.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(token) = header_value.strip_prefix("Bearer ") else {
        return AppError::Unauthenticated("missing authorization".to_owned()).into_response();
    };

    // Session token first — full access.
    if state.vault.validate_token(token).await {
        state.vault.touch_session().await;
        req.extensions_mut().insert(AuthContext::Session);
        return next.run(req).await;
    }

    // Then service token — scoped access.
    if let Some(record) = state.vault.validate_service_token(token) {
        state.vault.touch_session().await;
        state.vault.log_access(AccessEvent {
            consumer: record.consumer,
            scope: record.scope.clone(),
            action: "api_access".to_owned(),
            ..AccessEvent::default()
        });
        req.extensions_mut().insert(AuthContext::Service {
            scope: record.scope,
        });
        return next.run(req).await;
    }

    AppError::Unauthenticated("invalid or expired token".to_owned()).into_response()
}
