//! Vault routes: status, unlock/lock, fields, context, sensitivity, audit.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use pvault_core::schema::{self, Schema, RECOMMENDED_SCHEMA};
use pvault_core::scope;
use pvault_core::store::AuditEntry;
use pvault_core::suggest::{suggest_canonical, Suggestion};
use pvault_core::vault::{ContextBundle, FieldInfo, VaultStatus};

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::state::AppState;

/// Default and maximum audit page sizes.
const AUDIT_DEFAULT_LIMIT: i64 = 50;
const AUDIT_MAX_LIMIT: i64 = 1000;

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(inner)| inner)
        .map_err(|_| AppError::InvalidRequest("invalid JSON".to_owned()))
}

fn check_scope(auth: &AuthContext, field_id: &str) -> Result<(), AppError> {
    if scope::allows(auth.scope(), field_id) {
        Ok(())
    } else {
        Err(AppError::ScopeExceeded)
    }
}

fn require_session(auth: &AuthContext) -> Result<(), AppError> {
    if auth.is_session() {
        Ok(())
    } else {
        Err(AppError::SessionRequired)
    }
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub secret_key: String,
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SetFieldRequest {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub sensitivity: String,
}

#[derive(Debug, Serialize)]
pub struct SetFieldResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
}

#[derive(Debug, Deserialize)]
pub struct SetSensitivityRequest {
    #[serde(default)]
    pub tier: String,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /vault/status` — public.
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<VaultStatus>, AppError> {
    let status = state.vault.status().await?;
    Ok(Json(status))
}

/// `GET /vault/schema` — public, static recommended schema.
pub async fn schema() -> Json<&'static Schema> {
    Json(&RECOMMENDED_SCHEMA)
}

/// `POST /vault/unlock` — public, rate-limited.
pub async fn unlock(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UnlockRequest>, JsonRejection>,
) -> Result<Json<UnlockResponse>, AppError> {
    if !state.unlock_limiter.allow() {
        return Err(AppError::RateLimited);
    }

    let req = parse_body(body)?;
    if req.password.is_empty() || req.secret_key.is_empty() {
        return Err(AppError::InvalidRequest(
            "password and secret_key required".to_owned(),
        ));
    }

    // Keep the password in a buffer that zeroes on drop.
    let password = Zeroizing::new(req.password.into_bytes());
    let secret_key = Zeroizing::new(req.secret_key);

    let token = state.vault.unlock(&password, &secret_key).await?;
    state.write_session_file(&token);

    Ok(Json(UnlockResponse { token }))
}

/// `POST /vault/lock` — session only.
pub async fn lock(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<StatusMessage>, AppError> {
    require_session(&auth)?;
    state.vault.lock().await;
    state.remove_session_file();
    Ok(Json(StatusMessage { status: "locked" }))
}

/// `GET /vault/fields` — metadata list, filtered to the caller's scope.
pub async fn list_fields(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<FieldInfo>>, AppError> {
    let fields = state.vault.list().await?;
    let allowed = fields
        .into_iter()
        .filter(|f| scope::allows(auth.scope(), &f.id))
        .collect();
    Ok(Json(allowed))
}

/// `GET /vault/fields/{id}` — full field with decrypted value.
pub async fn get_field(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<FieldInfo>, AppError> {
    scope::validate_field_id(&id).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    check_scope(&auth, &id)?;

    let field = state
        .vault
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("field not found".to_owned()))?;
    Ok(Json(field))
}

/// `PUT /vault/fields/{id}` — encrypt and store a value.
pub async fn set_field(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Result<Json<SetFieldRequest>, JsonRejection>,
) -> Result<Json<SetFieldResponse>, AppError> {
    scope::validate_field_id(&id).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    check_scope(&auth, &id)?;

    let req = parse_body(body)?;
    if req.value.is_empty() {
        return Err(AppError::InvalidRequest("value required".to_owned()));
    }

    // Schema default sensitivity when none was provided.
    let sensitivity = if req.sensitivity.is_empty() {
        schema::default_sensitivity(&id).to_owned()
    } else {
        req.sensitivity
    };

    state.vault.set(&id, &req.value, &sensitivity).await?;

    Ok(Json(SetFieldResponse {
        status: "ok",
        suggestion: suggest_canonical(&id),
    }))
}

/// `DELETE /vault/fields/{id}`.
pub async fn delete_field(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, AppError> {
    scope::validate_field_id(&id).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    check_scope(&auth, &id)?;

    state.vault.delete(&id).await?;
    Ok(Json(StatusMessage { status: "deleted" }))
}

/// `GET /vault/fields/category/{category}` — decrypted fields of one
/// category, post-filtered per field for exact-pattern scopes.
pub async fn get_by_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(category): Path<String>,
) -> Result<Json<Vec<FieldInfo>>, AppError> {
    if !scope::valid_category_name(&category) {
        return Err(AppError::InvalidRequest(
            "invalid category name: only alphanumeric, underscore, hyphen allowed".to_owned(),
        ));
    }
    if !scope::allows_category(auth.scope(), &category) {
        return Err(AppError::ScopeExceeded);
    }

    let fields = state.vault.get_by_category(&category).await?;
    let allowed = fields
        .into_iter()
        .filter(|f| scope::allows(auth.scope(), &f.id))
        .collect();
    Ok(Json(allowed))
}

/// `GET /vault/context` — scope-filtered decrypted bundle.
pub async fn get_context(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ContextBundle>, AppError> {
    let mut bundle = state.vault.get_context().await?;

    if auth.scope() != "*" {
        let mut filtered = ContextBundle::default();
        for (category, fields) in bundle.categories {
            let allowed: Vec<FieldInfo> = fields
                .into_iter()
                .filter(|f| scope::allows(auth.scope(), &f.id))
                .collect();
            if !allowed.is_empty() {
                filtered.categories.insert(category, allowed);
            }
        }
        bundle = filtered;
    }

    Ok(Json(bundle))
}

/// `GET /vault/audit?limit=` — session only, newest first, limit clamped.
pub async fn audit_log(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    require_session(&auth)?;

    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(AUDIT_DEFAULT_LIMIT)
        .min(AUDIT_MAX_LIMIT);

    let entries = state.vault.audit_log(limit)?;
    Ok(Json(entries))
}

/// `PUT /vault/sensitivity/{id}`.
pub async fn set_sensitivity(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Result<Json<SetSensitivityRequest>, JsonRejection>,
) -> Result<Json<StatusMessage>, AppError> {
    scope::validate_field_id(&id).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    check_scope(&auth, &id)?;

    let req = parse_body(body)?;
    if req.tier.is_empty() {
        return Err(AppError::InvalidRequest("tier required".to_owned()));
    }

    state.vault.set_sensitivity(&id, &req.tier).await?;
    Ok(Json(StatusMessage { status: "ok" }))
}
