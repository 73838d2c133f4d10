//! Durable storage for fields, metadata, tokens, and the audit log.
//!
//! One embedded SQLite database with four tables. The connection runs in
//! WAL mode with a 5-second busy timeout and normal-synchronous durability;
//! WAL serializes writers and permits concurrent readers. Every statement
//! issued here is single and atomic, so callers never need rollback logic.
//!
//! Timestamps are stored as textual UTC in a fixed ISO-8601 second-precision
//! format; this module normalizes them on both read and write. Ciphertext
//! reaches this layer already sealed — the store never sees plaintext field
//! values.

mod audit;
mod fields;
mod meta;
mod tokens;

pub use audit::{AccessEvent, AuditEntry};
pub use fields::Field;
pub use tokens::TokenRecord;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use crate::error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vault_fields (
    id          TEXT PRIMARY KEY,
    category    TEXT NOT NULL,
    field_name  TEXT NOT NULL,
    value       TEXT NOT NULL,
    sensitivity TEXT NOT NULL DEFAULT 'standard',
    updated_at  TEXT NOT NULL,
    version     INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS vault_access_log (
    id         TEXT PRIMARY KEY,
    consumer   TEXT NOT NULL,
    scope      TEXT NOT NULL,
    action     TEXT NOT NULL,
    purpose    TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vault_tokens (
    token      TEXT PRIMARY KEY,
    consumer   TEXT NOT NULL,
    scope      TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    usage      TEXT NOT NULL DEFAULT 'multi',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vault_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fields_category ON vault_fields(category);
CREATE INDEX IF NOT EXISTS idx_fields_sensitivity ON vault_fields(sensitivity);
CREATE INDEX IF NOT EXISTS idx_tokens_expires ON vault_tokens(expires_at);
CREATE INDEX IF NOT EXISTS idx_access_log_created ON vault_access_log(created_at);
";

/// Handle to the vault database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the vault database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened, a pragma is
    /// rejected, or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // journal_mode returns the resulting mode as a row.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned mutex still holds a usable connection; recover it.
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

/// Format a timestamp in the fixed on-disk form (UTC, second precision).
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp. Unparseable values normalize to the epoch
/// rather than failing the read.
pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn open_test_store() -> (Store, tempfile::TempDir) {
    #[allow(clippy::unwrap_used)]
    let dir = tempfile::tempdir().unwrap();
    #[allow(clippy::unwrap_used)]
    let store = Store::open(&dir.path().join("vault.db")).unwrap();
    (store, dir)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema() {
        let (store, _dir) = open_test_store();
        assert_eq!(store.field_count().unwrap(), 0);
        assert!(!store.is_initialized().unwrap());
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");
        {
            let store = Store::open(&path).unwrap();
            store.set_meta("salt", "abc").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.get_meta("salt").unwrap(), "abc");
    }

    #[test]
    fn timestamps_roundtrip_at_second_precision() {
        let now = Utc::now();
        let parsed = parse_ts(&format_ts(now));
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn bad_timestamps_normalize_to_epoch() {
        assert_eq!(parse_ts("not-a-time").timestamp(), 0);
    }
}
