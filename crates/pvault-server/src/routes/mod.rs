//! Route table and router assembly.

pub mod tokens;
pub mod vault;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware as axum_mw;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Request bodies above this size are rejected (1 MiB).
const MAX_BODY_BYTES: usize = 1 << 20;

/// Build the full application router with all middleware layers.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Public endpoints: no authentication.
    let public = Router::new()
        .route("/vault/status", get(vault::status))
        .route("/vault/schema", get(vault::schema))
        .route("/vault/unlock", post(vault::unlock));

    // Everything else goes through the bearer-token gate.
    let protected = Router::new()
        .route("/vault/lock", post(vault::lock))
        .route("/vault/fields", get(vault::list_fields))
        .route("/vault/fields/category/{category}", get(vault::get_by_category))
        .route(
            "/vault/fields/{id}",
            get(vault::get_field)
                .put(vault::set_field)
                .delete(vault::delete_field),
        )
        .route("/vault/context", get(vault::get_context))
        .route("/vault/audit", get(vault::audit_log))
        .route("/vault/sensitivity/{id}", put(vault::set_sensitivity))
        .route(
            "/vault/tokens/service",
            post(tokens::create).get(tokens::list),
        )
        .route("/vault/tokens/service/{token}", delete(tokens::revoke))
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
