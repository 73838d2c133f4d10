//! Field rows: encrypted values with category, sensitivity, and versioning.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, parse_ts, Store};
use crate::error::StoreError;

/// A row in `vault_fields`. `value` is the base64 ciphertext envelope;
/// metadata-only queries leave it empty.
#[derive(Debug, Clone)]
pub struct Field {
    pub id: String,
    pub category: String,
    pub field_name: String,
    pub value: String,
    pub sensitivity: String,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<Field> {
    let updated_at: String = row.get(5)?;
    Ok(Field {
        id: row.get(0)?,
        category: row.get(1)?,
        field_name: row.get(2)?,
        value: row.get(3)?,
        sensitivity: row.get(4)?,
        updated_at: parse_ts(&updated_at),
        version: row.get(6)?,
    })
}

fn field_meta_from_row(row: &Row<'_>) -> rusqlite::Result<Field> {
    let updated_at: String = row.get(4)?;
    Ok(Field {
        id: row.get(0)?,
        category: row.get(1)?,
        field_name: row.get(2)?,
        value: String::new(),
        sensitivity: row.get(3)?,
        updated_at: parse_ts(&updated_at),
        version: row.get(5)?,
    })
}

impl Store {
    /// Upsert a field. Inserts at version 1; on conflict updates the value,
    /// refreshes the timestamp, bumps the version, and refreshes sensitivity
    /// only when the caller supplied a non-empty tier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    pub fn set_field(&self, field: &Field) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO vault_fields (id, category, field_name, value, sensitivity, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
             ON CONFLICT(id) DO UPDATE SET
                value = excluded.value,
                sensitivity = CASE WHEN excluded.sensitivity != '' THEN excluded.sensitivity ELSE vault_fields.sensitivity END,
                updated_at = excluded.updated_at,
                version = vault_fields.version + 1",
            params![
                field.id,
                field.category,
                field.field_name,
                field.value,
                field.sensitivity,
                format_ts(field.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single field by id, ciphertext included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn get_field(&self, id: &str) -> Result<Option<Field>, StoreError> {
        let field = self
            .conn()
            .query_row(
                "SELECT id, category, field_name, value, sensitivity, updated_at, version
                 FROM vault_fields WHERE id = ?1",
                params![id],
                field_from_row,
            )
            .optional()?;
        Ok(field)
    }

    /// All field metadata, no ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn list_fields(&self) -> Result<Vec<Field>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, field_name, sensitivity, updated_at, version
             FROM vault_fields ORDER BY category, field_name",
        )?;
        let fields = stmt
            .query_map([], field_meta_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Field metadata for one category, no ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn list_fields_by_category(&self, category: &str) -> Result<Vec<Field>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, field_name, sensitivity, updated_at, version
             FROM vault_fields WHERE category = ?1 ORDER BY field_name",
        )?;
        let fields = stmt
            .query_map(params![category], field_meta_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Fields for one category, ciphertext included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn get_fields_by_category(&self, category: &str) -> Result<Vec<Field>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, field_name, value, sensitivity, updated_at, version
             FROM vault_fields WHERE category = ?1 ORDER BY field_name",
        )?;
        let fields = stmt
            .query_map(params![category], field_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// All fields, ciphertext included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn get_all_fields(&self) -> Result<Vec<Field>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, field_name, value, sensitivity, updated_at, version
             FROM vault_fields ORDER BY category, field_name",
        )?;
        let fields = stmt
            .query_map([], field_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Remove a field by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    pub fn delete_field(&self, id: &str) -> Result<(), StoreError> {
        self.conn()
            .execute("DELETE FROM vault_fields WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Update the sensitivity tier of a field, refreshing its timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    pub fn set_sensitivity(&self, id: &str, tier: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "UPDATE vault_fields SET sensitivity = ?1, updated_at = ?2 WHERE id = ?3",
            params![tier, format_ts(Utc::now()), id],
        )?;
        Ok(())
    }

    /// Total number of fields.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn field_count(&self) -> Result<i64, StoreError> {
        let count =
            self.conn()
                .query_row("SELECT COUNT(*) FROM vault_fields", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Field count per category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn category_counts(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT category, COUNT(*) FROM vault_fields GROUP BY category")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }
}
