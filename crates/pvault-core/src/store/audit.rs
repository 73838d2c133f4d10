//! Append-only audit log. Every effectful vault operation lands here.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::params;
use serde::Serialize;

use super::{format_ts, parse_ts, Store};
use crate::error::StoreError;

/// A persisted audit entry, as returned to readers.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub consumer: String,
    pub scope: String,
    pub action: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}

/// An audit event to record. The id and timestamp may be omitted; the store
/// synthesizes a random 128-bit id and the current time.
#[derive(Debug, Clone, Default)]
pub struct AccessEvent {
    pub id: Option<String>,
    pub consumer: String,
    pub scope: String,
    pub action: String,
    pub purpose: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Store {
    /// Append an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    pub fn log_access(&self, event: AccessEvent) -> Result<(), StoreError> {
        let id = event.id.unwrap_or_else(|| {
            let mut bytes = [0u8; 16];
            rand::rngs::OsRng.fill_bytes(&mut bytes);
            hex::encode(bytes)
        });
        let created_at = event.created_at.unwrap_or_else(Utc::now);

        self.conn().execute(
            "INSERT INTO vault_access_log (id, consumer, scope, action, purpose, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                event.consumer,
                event.scope,
                event.action,
                event.purpose,
                format_ts(created_at),
            ],
        )?;
        Ok(())
    }

    /// Recent audit entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn get_audit_log(&self, limit: i64) -> Result<Vec<AuditEntry>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, consumer, scope, action, purpose, created_at
             FROM vault_access_log ORDER BY created_at DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                let created_at: String = row.get(5)?;
                Ok(AuditEntry {
                    id: row.get(0)?,
                    consumer: row.get(1)?,
                    scope: row.get(2)?,
                    action: row.get(3)?,
                    purpose: row.get(4)?,
                    created_at: parse_ts(&created_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::open_test_store;
    use super::*;

    #[test]
    fn log_access_synthesizes_id_and_timestamp() {
        let (store, _dir) = open_test_store();
        store
            .log_access(AccessEvent {
                consumer: "vault".to_owned(),
                scope: "*".to_owned(),
                action: "unlock".to_owned(),
                ..AccessEvent::default()
            })
            .unwrap();

        let entries = store.get_audit_log(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.len(), 32);
        assert!(entries[0].created_at.timestamp() > 0);
    }

    #[test]
    fn audit_log_is_newest_first_and_limited() {
        let (store, _dir) = open_test_store();
        let base = Utc::now();
        for i in 0..5 {
            store
                .log_access(AccessEvent {
                    consumer: "vault".to_owned(),
                    scope: format!("identity.f{i}"),
                    action: "write".to_owned(),
                    created_at: Some(base + chrono::Duration::seconds(i)),
                    ..AccessEvent::default()
                })
                .unwrap();
        }

        let entries = store.get_audit_log(3).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].scope, "identity.f4");
        assert!(entries[0].created_at >= entries[1].created_at);
        assert!(entries[1].created_at >= entries[2].created_at);
    }

    #[test]
    fn explicit_id_is_preserved() {
        let (store, _dir) = open_test_store();
        store
            .log_access(AccessEvent {
                id: Some("fixed-id".to_owned()),
                consumer: "vault".to_owned(),
                scope: "*".to_owned(),
                action: "lock".to_owned(),
                ..AccessEvent::default()
            })
            .unwrap();

        let entries = store.get_audit_log(1).unwrap();
        assert_eq!(entries[0].id, "fixed-id");
    }
}
