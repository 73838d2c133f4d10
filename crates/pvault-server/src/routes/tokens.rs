//! Service-token routes. All of them require the session token — a service
//! token cannot mint, list, or revoke tokens.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{Duration, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::state::AppState;

/// Default service-token lifetime: one year.
const DEFAULT_TTL_DAYS: i64 = 365;

/// Hash-prefix length shown in listings.
const PREFIX_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub consumer: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub ttl: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub token_prefix: String,
    pub consumer: String,
    pub scope: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub status: &'static str,
    pub count: usize,
}

fn require_session(auth: &AuthContext) -> Result<(), AppError> {
    if auth.is_session() {
        Ok(())
    } else {
        Err(AppError::SessionRequired)
    }
}

/// `POST /vault/tokens/service` — mint a scoped token; the raw value is
/// returned exactly once.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    body: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> Result<Json<CreateTokenResponse>, AppError> {
    require_session(&auth)?;

    let req = body
        .map(|Json(inner)| inner)
        .map_err(|_| AppError::InvalidRequest("invalid JSON".to_owned()))?;
    if req.consumer.is_empty() {
        return Err(AppError::InvalidRequest("consumer required".to_owned()));
    }
    let scope = if req.scope.is_empty() {
        "*".to_owned()
    } else {
        req.scope
    };

    let ttl = if req.ttl.is_empty() {
        Duration::days(DEFAULT_TTL_DAYS)
    } else {
        parse_duration(&req.ttl)?
    };

    let (token, expires_at) = state
        .vault
        .create_service_token(&req.consumer, &scope, ttl)
        .await?;

    Ok(Json(CreateTokenResponse {
        token,
        expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// `GET /vault/tokens/service` — list with hash prefixes, never raw values.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<TokenInfo>>, AppError> {
    require_session(&auth)?;

    let tokens = state.vault.list_service_tokens().await?;
    let result = tokens
        .into_iter()
        .map(|t| {
            let token_prefix = if t.token_hash.len() > PREFIX_LEN {
                format!("{}...", &t.token_hash[..PREFIX_LEN])
            } else {
                t.token_hash
            };
            TokenInfo {
                token_prefix,
                consumer: t.consumer,
                scope: t.scope,
                expires_at: t.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                created_at: t.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            }
        })
        .collect();
    Ok(Json(result))
}

/// `DELETE /vault/tokens/service/{token}` — revoke by raw token value.
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(token): Path<String>,
) -> Result<Json<RevokeResponse>, AppError> {
    require_session(&auth)?;

    if token.is_empty() {
        return Err(AppError::InvalidRequest("token required".to_owned()));
    }

    let count = state.vault.revoke_service_token(&token).await?;
    if count == 0 {
        return Err(AppError::NotFound("no matching token found".to_owned()));
    }
    Ok(Json(RevokeResponse {
        status: "revoked",
        count,
    }))
}

/// Parse a duration string like `"1h"`, `"30m"`, `"3600"`, `"90d"`.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] if the format is unrecognized.
fn parse_duration(s: &str) -> Result<Duration, AppError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AppError::InvalidRequest("empty ttl".to_owned()));
    }

    // Bare seconds first.
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(Duration::seconds(secs));
    }

    let (num_str, unit) = s.split_at(s.len().saturating_sub(1));
    let num: i64 = num_str
        .parse()
        .map_err(|_| AppError::InvalidRequest("invalid ttl duration".to_owned()))?;

    match unit {
        "s" => Ok(Duration::seconds(num)),
        "m" => Ok(Duration::minutes(num)),
        "h" => Ok(Duration::hours(num)),
        "d" => Ok(Duration::days(num)),
        _ => Err(AppError::InvalidRequest(
            "invalid ttl duration: expected s/m/h/d".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("24h").unwrap(), Duration::hours(24));
        assert_eq!(parse_duration("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_duration("3600").unwrap(), Duration::seconds(3600));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("10y").is_err());
    }
}
