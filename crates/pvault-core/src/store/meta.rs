//! Vault metadata singletons: salt, secret-key hash, verification ciphertext.

use rusqlite::{params, OptionalExtension};

use super::Store;
use crate::error::StoreError;

impl Store {
    /// Upsert a metadata key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a metadata value. Absent keys read as the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn get_meta(&self, key: &str) -> Result<String, StoreError> {
        let value: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM vault_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or_default())
    }

    /// Whether the vault has been initialized (a salt is present).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        Ok(!self.get_meta("salt")?.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::open_test_store;

    #[test]
    fn get_missing_meta_is_empty() {
        let (store, _dir) = open_test_store();
        assert_eq!(store.get_meta("salt").unwrap(), "");
    }

    #[test]
    fn set_meta_upserts() {
        let (store, _dir) = open_test_store();
        store.set_meta("salt", "first").unwrap();
        store.set_meta("salt", "second").unwrap();
        assert_eq!(store.get_meta("salt").unwrap(), "second");
    }

    #[test]
    fn initialized_iff_salt_present() {
        let (store, _dir) = open_test_store();
        assert!(!store.is_initialized().unwrap());
        store.set_meta("salt", "c2FsdA==").unwrap();
        assert!(store.is_initialized().unwrap());
    }
}
