//! Service-token rows. The `token` column always holds a SHA-256 hash —
//! raw token values never reach this layer.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, parse_ts, Store};
use crate::error::StoreError;

/// A stored token. `token_hash` is hex SHA-256 of the raw value.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub token_hash: String,
    pub consumer: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub usage: String,
    pub created_at: DateTime<Utc>,
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<TokenRecord> {
    let expires_at: String = row.get(3)?;
    let created_at: String = row.get(5)?;
    Ok(TokenRecord {
        token_hash: row.get(0)?,
        consumer: row.get(1)?,
        scope: row.get(2)?,
        expires_at: parse_ts(&expires_at),
        usage: row.get(4)?,
        created_at: parse_ts(&created_at),
    })
}

impl Store {
    /// Insert a token record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails (including a duplicate
    /// hash, which cannot happen for honestly generated tokens).
    pub fn create_token(&self, token: &TokenRecord) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO vault_tokens (token, consumer, scope, expires_at, usage, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.token_hash,
                token.consumer,
                token.scope,
                format_ts(token.expires_at),
                token.usage,
                format_ts(token.created_at),
            ],
        )?;
        Ok(())
    }

    /// Look up a token by hash. Expiry is enforced here: an expired row
    /// reads as absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn get_token(&self, token_hash: &str) -> Result<Option<TokenRecord>, StoreError> {
        let token = self
            .conn()
            .query_row(
                "SELECT token, consumer, scope, expires_at, usage, created_at
                 FROM vault_tokens WHERE token = ?1",
                params![token_hash],
                token_from_row,
            )
            .optional()?;

        match token {
            Some(t) if Utc::now() > t.expires_at => Ok(None),
            other => Ok(other),
        }
    }

    /// Delete a token by hash. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    pub fn delete_token(&self, token_hash: &str) -> Result<usize, StoreError> {
        let n = self
            .conn()
            .execute("DELETE FROM vault_tokens WHERE token = ?1", params![token_hash])?;
        Ok(n)
    }

    /// Delete all expired tokens. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    pub fn delete_expired_tokens(&self) -> Result<usize, StoreError> {
        let n = self.conn().execute(
            "DELETE FROM vault_tokens WHERE expires_at < ?1",
            params![format_ts(Utc::now())],
        )?;
        Ok(n)
    }

    /// Delete every token. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    pub fn delete_all_tokens(&self) -> Result<usize, StoreError> {
        let n = self.conn().execute("DELETE FROM vault_tokens", [])?;
        Ok(n)
    }

    /// Tokens with the given usage class, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn list_tokens_by_usage(&self, usage: &str) -> Result<Vec<TokenRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT token, consumer, scope, expires_at, usage, created_at
             FROM vault_tokens WHERE usage = ?1 ORDER BY created_at DESC",
        )?;
        let tokens = stmt
            .query_map(params![usage], token_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }
}
