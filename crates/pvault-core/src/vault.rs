//! The vault orchestrator.
//!
//! `Vault` is the only entry point external callers use. It owns the store,
//! the cached salt, and the single live session, and glues the key
//! hierarchy, envelope, and audit log together.
//!
//! # Locking
//!
//! An async `RwLock` guards the session slot and the cached salt. Read
//! operations take it shared; unlock, lock, and auto-lock take it
//! exclusively. Argon2id runs under the exclusive lock at unlock time, so
//! concurrent unlock attempts serialize — intentionally, as part of the
//! brute-force cost.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, EncryptionKey};
use crate::envelope;
use crate::error::VaultError;
use crate::scope::validate_field_id;
use crate::session::{Session, DEFAULT_AUTO_LOCK_TTL};
use crate::store::{AccessEvent, AuditEntry, Field, Store, TokenRecord};

/// Database file name inside the vault directory.
const DB_FILE: &str = "vault.db";

/// Secret-key file name inside the vault directory.
const SECRET_KEY_FILE: &str = "secret.key";

const VALID_TIERS: [&str; 4] = ["public", "standard", "sensitive", "critical"];

/// Whether a sensitivity tier is one of the four valid values.
#[must_use]
pub fn valid_tier(tier: &str) -> bool {
    VALID_TIERS.contains(&tier)
}

/// Current state of the vault, as reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct VaultStatus {
    pub initialized: bool,
    pub locked: bool,
    pub field_count: i64,
    pub categories: BTreeMap<String, i64>,
}

/// A field returned to callers. `value` is present only for operations that
/// decrypt.
#[derive(Debug, Clone, Serialize)]
pub struct FieldInfo {
    pub id: String,
    pub category: String,
    pub field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub sensitivity: String,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl FieldInfo {
    fn from_field(f: Field, value: Option<String>) -> Self {
        Self {
            id: f.id,
            category: f.category,
            field_name: f.field_name,
            value,
            sensitivity: f.sensitivity,
            updated_at: f.updated_at,
            version: f.version,
        }
    }
}

/// A full decrypted dump grouped by category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextBundle {
    pub categories: BTreeMap<String, Vec<FieldInfo>>,
}

#[derive(Default)]
struct VaultState {
    session: Option<Session>,
    /// Loaded at unlock, used for HKDF subkey derivation.
    salt: Option<Vec<u8>>,
}

/// The vault. One per process, shared across request handlers via `Arc`.
pub struct Vault {
    db: Store,
    dir: PathBuf,
    state: Arc<RwLock<VaultState>>,
    auto_lock_ttl: Duration,
}

impl Vault {
    /// Open an existing vault directory.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] if the database cannot be opened.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let dir = dir.into();
        let db = Store::open(&dir.join(DB_FILE))?;
        Ok(Self {
            db,
            dir,
            state: Arc::new(RwLock::new(VaultState::default())),
            auto_lock_ttl: DEFAULT_AUTO_LOCK_TTL,
        })
    }

    /// Override the idle auto-lock TTL. Must be called before sharing the
    /// vault; existing sessions keep their original TTL.
    pub fn set_auto_lock_ttl(&mut self, ttl: Duration) {
        self.auto_lock_ttl = ttl;
    }

    /// The vault directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Initialize a new vault: generate the salt and device secret key,
    /// persist the verification ciphertext, and write `secret.key`.
    ///
    /// Returns the hex-encoded secret key. It is shown once and never
    /// stored in recoverable form.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyInitialized`] if the database file exists.
    /// - [`VaultError::Io`] / [`VaultError::Store`] on filesystem or
    ///   database failures.
    pub fn init(dir: &Path, password: &[u8]) -> Result<String, VaultError> {
        create_vault_dir(dir)?;
        let db_path = dir.join(DB_FILE);
        if db_path.exists() {
            return Err(VaultError::AlreadyInitialized);
        }

        let db = Store::open(&db_path)?;

        let salt = crypto::generate_salt();
        let secret_key = Zeroizing::new(crypto::generate_secret_key());

        db.set_meta("salt", &BASE64.encode(salt))?;
        db.set_meta(
            "secret_key_hash",
            &hex::encode(crypto::hash_secret(secret_key.as_slice())),
        )?;

        // The master key drops (and zeroizes) as soon as the verification
        // ciphertext is written.
        let master = crypto::derive_master(password, secret_key.as_slice(), &salt)?;
        db.set_meta("verification", &envelope::make_verification(&master)?)?;
        drop(master);

        let secret_key_hex = hex::encode(secret_key.as_slice());
        write_secret_key_file(&dir.join(SECRET_KEY_FILE), &secret_key_hex)?;

        info!(dir = %dir.display(), "vault initialized");
        Ok(secret_key_hex)
    }

    /// Unlock the vault: verify credentials, derive the master key, and
    /// create the session. Returns the session token.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyUnlocked`] if a session exists.
    /// - [`VaultError::NotInitialized`] if the vault has no salt.
    /// - [`VaultError::WrongPassword`] for any credential failure.
    pub async fn unlock(&self, password: &[u8], secret_key_hex: &str) -> Result<String, VaultError> {
        let mut state = self.state.write().await;

        if state.session.is_some() {
            return Err(VaultError::AlreadyUnlocked);
        }
        if !self.db.is_initialized()? {
            return Err(VaultError::NotInitialized);
        }

        let salt = BASE64
            .decode(self.db.get_meta("salt")?)
            .map_err(|e| VaultError::Metadata {
                reason: format!("salt is not valid base64: {e}"),
            })?;

        // Malformed hex is reported exactly like a wrong key.
        let secret_key = Zeroizing::new(
            hex::decode(secret_key_hex.trim()).map_err(|_| VaultError::WrongPassword)?,
        );

        // Cheap fail-fast before the expensive KDF. Does not replace the
        // verification-ciphertext check below.
        let stored_hash = self.db.get_meta("secret_key_hash")?;
        let actual_hash = hex::encode(crypto::hash_secret(&secret_key));
        if !crypto::constant_time_eq(stored_hash.as_bytes(), actual_hash.as_bytes()) {
            return Err(VaultError::WrongPassword);
        }

        let master = crypto::derive_master(password, &secret_key, &salt)?;

        if !envelope::verify(&master, &self.db.get_meta("verification")?) {
            return Err(VaultError::WrongPassword);
        }

        state.salt = Some(salt);

        // The expiry future holds only a weak reference, so the session
        // never keeps the vault state alive.
        let weak = Arc::downgrade(&self.state);
        let session = Session::new(&master, self.auto_lock_ttl, async move {
            if let Some(state) = weak.upgrade() {
                state.write().await.session = None;
            }
        });
        let token = session.token();
        state.session = Some(session);
        drop(state);

        self.audit("vault", "*", "unlock", "");
        info!("vault unlocked");
        Ok(token)
    }

    /// Lock the vault, destroying the session and zeroizing the key.
    /// Idempotent.
    pub async fn lock(&self) {
        let mut state = self.state.write().await;
        if let Some(session) = state.session.take() {
            self.audit("vault", "*", "lock", "");
            session.destroy();
            info!("vault locked");
        }
    }

    /// Current initialization and lock state, with field counts.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] if the database fails.
    pub async fn status(&self) -> Result<VaultStatus, VaultError> {
        let initialized = self.db.is_initialized()?;
        let locked = self.state.read().await.session.is_none();

        let (field_count, categories) = if initialized {
            (self.db.field_count()?, self.db.category_counts()?)
        } else {
            (0, BTreeMap::new())
        };

        Ok(VaultStatus {
            initialized,
            locked,
            field_count,
            categories,
        })
    }

    /// Encrypt and store a field value.
    ///
    /// An empty sensitivity normalizes to `standard`; anything outside the
    /// four-tier enum is rejected.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidFieldId`] on bad identifier syntax.
    /// - [`VaultError::Locked`] if no session exists.
    /// - [`VaultError::InvalidTier`] on an unknown sensitivity.
    pub async fn set(&self, id: &str, value: &str, sensitivity: &str) -> Result<(), VaultError> {
        validate_field_id(id)?;
        let (master, salt) = self.require_unlocked().await?;

        // validate_field_id guarantees the separator exists.
        let (category, field_name) = id.split_once('.').ok_or(VaultError::InvalidFieldId {
            reason: format!("field id must be category.field_name, got {id:?}"),
        })?;

        let sealed = envelope::seal(&master, &salt, category, value.as_bytes())?;

        let sensitivity = if sensitivity.is_empty() {
            "standard"
        } else {
            sensitivity
        };
        if !valid_tier(sensitivity) {
            return Err(VaultError::InvalidTier);
        }

        self.db.set_field(&Field {
            id: id.to_owned(),
            category: category.to_owned(),
            field_name: field_name.to_owned(),
            value: sealed,
            sensitivity: sensitivity.to_owned(),
            updated_at: Utc::now(),
            version: 1,
        })?;

        self.audit("vault", id, "write", "");
        Ok(())
    }

    /// Decrypt and return a field, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Locked`] if no session exists.
    /// - [`VaultError::Crypto`] if the stored ciphertext fails to open —
    ///   a storage-integrity event, not an authentication event.
    pub async fn get(&self, id: &str) -> Result<Option<FieldInfo>, VaultError> {
        let (master, salt) = self.require_unlocked().await?;

        let Some(field) = self.db.get_field(id)? else {
            return Ok(None);
        };

        let plaintext = envelope::open(&master, &salt, &field.category, &field.value)?;
        self.audit("vault", id, "read", "");

        let value = String::from_utf8_lossy(&plaintext).into_owned();
        Ok(Some(FieldInfo::from_field(field, Some(value))))
    }

    /// All field metadata, without values.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] or [`VaultError::Store`].
    pub async fn list(&self) -> Result<Vec<FieldInfo>, VaultError> {
        self.require_unlocked().await?;
        let fields = self.db.list_fields()?;
        Ok(fields
            .into_iter()
            .map(|f| FieldInfo::from_field(f, None))
            .collect())
    }

    /// Field metadata for one category, without values.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] or [`VaultError::Store`].
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<FieldInfo>, VaultError> {
        self.require_unlocked().await?;
        let fields = self.db.list_fields_by_category(category)?;
        Ok(fields
            .into_iter()
            .map(|f| FieldInfo::from_field(f, None))
            .collect())
    }

    /// All decrypted fields of one category.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`], [`VaultError::Crypto`], or
    /// [`VaultError::Store`].
    pub async fn get_by_category(&self, category: &str) -> Result<Vec<FieldInfo>, VaultError> {
        let (master, salt) = self.require_unlocked().await?;

        let fields = self.db.get_fields_by_category(category)?;
        let subkey = crypto::derive_subkey(&master, &salt, category)?;

        let mut result = Vec::with_capacity(fields.len());
        for field in fields {
            let plaintext = envelope::open_with(&subkey, &field.value)?;
            let value = String::from_utf8_lossy(&plaintext).into_owned();
            result.push(FieldInfo::from_field(field, Some(value)));
        }

        self.audit("vault", &format!("{category}.*"), "read", "");
        Ok(result)
    }

    /// All decrypted fields grouped by category. Subkeys are derived once
    /// per category for the duration of the call and never cached beyond it.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`], [`VaultError::Crypto`], or
    /// [`VaultError::Store`].
    pub async fn get_context(&self) -> Result<ContextBundle, VaultError> {
        let (master, salt) = self.require_unlocked().await?;

        let fields = self.db.get_all_fields()?;
        let mut subkeys: HashMap<String, EncryptionKey> = HashMap::new();
        let mut bundle = ContextBundle::default();

        for field in fields {
            let subkey = match subkeys.get(&field.category) {
                Some(k) => k.clone(),
                None => {
                    let k = crypto::derive_subkey(&master, &salt, &field.category)?;
                    subkeys.insert(field.category.clone(), k.clone());
                    k
                }
            };
            let plaintext = envelope::open_with(&subkey, &field.value)?;
            let value = String::from_utf8_lossy(&plaintext).into_owned();
            bundle
                .categories
                .entry(field.category.clone())
                .or_default()
                .push(FieldInfo::from_field(field, Some(value)));
        }

        self.audit("vault", "*", "context", "");
        Ok(bundle)
    }

    /// Remove a field.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] or [`VaultError::Store`].
    pub async fn delete(&self, id: &str) -> Result<(), VaultError> {
        self.require_unlocked().await?;
        self.db.delete_field(id)?;
        self.audit("vault", id, "delete", "");
        Ok(())
    }

    /// Update a field's sensitivity tier.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`], [`VaultError::InvalidTier`], or
    /// [`VaultError::Store`].
    pub async fn set_sensitivity(&self, id: &str, tier: &str) -> Result<(), VaultError> {
        self.require_unlocked().await?;
        if !valid_tier(tier) {
            return Err(VaultError::InvalidTier);
        }
        self.db.set_sensitivity(id, tier)?;
        self.audit("vault", id, "sensitivity", "");
        Ok(())
    }

    /// Recent audit entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`].
    pub fn audit_log(&self, limit: i64) -> Result<Vec<AuditEntry>, VaultError> {
        Ok(self.db.get_audit_log(limit)?)
    }

    /// Validate a session token in constant time.
    pub async fn validate_token(&self, token: &str) -> bool {
        match &self.state.read().await.session {
            Some(session) => session.validate_token(token),
            None => false,
        }
    }

    /// Reset the session's idle timer, if a session exists.
    pub async fn touch_session(&self) {
        if let Some(session) = &self.state.read().await.session {
            session.touch();
        }
    }

    /// Create a long-lived scoped service token. Returns the raw token
    /// (shown once — only its SHA-256 hash is persisted) and its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] or [`VaultError::Store`].
    pub async fn create_service_token(
        &self,
        consumer: &str,
        scope: &str,
        ttl: chrono::Duration,
    ) -> Result<(String, DateTime<Utc>), VaultError> {
        self.require_unlocked().await?;

        let mut token_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut token_bytes);
        let raw = hex::encode(token_bytes);

        let now = Utc::now();
        let expires_at = now + ttl;
        self.db.create_token(&TokenRecord {
            token_hash: hash_service_token(&raw),
            consumer: consumer.to_owned(),
            scope: scope.to_owned(),
            expires_at,
            usage: "service".to_owned(),
            created_at: now,
        })?;

        self.audit(
            "vault",
            scope,
            "create_service_token",
            &format!("consumer: {consumer}"),
        );

        Ok((raw, expires_at))
    }

    /// Look up a service token by its raw value. Returns `None` for unknown,
    /// expired, or non-service tokens — and on store errors, which must not
    /// be distinguishable from a bad token by the caller.
    pub fn validate_service_token(&self, raw: &str) -> Option<TokenRecord> {
        let record = match self.db.get_token(&hash_service_token(raw)) {
            Ok(record) => record?,
            Err(e) => {
                warn!(error = %e, "service token lookup failed");
                return None;
            }
        };
        (record.usage == "service").then_some(record)
    }

    /// All service tokens (stored form: hashes only).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] or [`VaultError::Store`].
    pub async fn list_service_tokens(&self) -> Result<Vec<TokenRecord>, VaultError> {
        self.require_unlocked().await?;
        Ok(self.db.list_tokens_by_usage("service")?)
    }

    /// Revoke a service token by its raw value. Returns the number of rows
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] or [`VaultError::Store`].
    pub async fn revoke_service_token(&self, raw: &str) -> Result<usize, VaultError> {
        self.require_unlocked().await?;
        let n = self.db.delete_token(&hash_service_token(raw))?;
        if n > 0 {
            self.audit("vault", "*", "revoke_service_token", "");
        }
        Ok(n)
    }

    /// Append an audit entry on behalf of the request gate.
    pub fn log_access(&self, event: AccessEvent) {
        if let Err(e) = self.db.log_access(event) {
            warn!(error = %e, "audit write failed");
        }
    }

    fn audit(&self, consumer: &str, scope: &str, action: &str, purpose: &str) {
        self.log_access(AccessEvent {
            consumer: consumer.to_owned(),
            scope: scope.to_owned(),
            action: action.to_owned(),
            purpose: purpose.to_owned(),
            ..AccessEvent::default()
        });
    }

    /// Return a master-key copy and the salt, refreshing the idle timer.
    /// Fails with [`VaultError::Locked`] when no session exists.
    async fn require_unlocked(&self) -> Result<(EncryptionKey, Vec<u8>), VaultError> {
        let state = self.state.read().await;
        let session = state.session.as_ref().ok_or(VaultError::Locked)?;
        session.touch();
        let master = session.master_key().ok_or(VaultError::Locked)?;
        let salt = state.salt.clone().ok_or(VaultError::Locked)?;
        Ok((master, salt))
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// Hex SHA-256 of a raw service token.
#[must_use]
pub fn hash_service_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn create_vault_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true).mode(0o700);
        builder.create(dir)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
    }
}

fn write_secret_key_file(path: &Path, secret_key_hex: &str) -> std::io::Result<()> {
    use std::io::Write;

    let contents = format!("{secret_key_hex}\n");
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents.as_bytes())
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, contents)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    const PASSWORD: &[u8] = b"hunter2hunter2";

    fn init_vault() -> (Vault, String, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".pvault");
        let secret_key = Vault::init(&dir, PASSWORD).unwrap();
        let vault = Vault::open(&dir).unwrap();
        (vault, secret_key, tmp)
    }

    async fn unlocked_vault() -> (Vault, String, tempfile::TempDir) {
        let (vault, secret_key, tmp) = init_vault();
        vault.unlock(PASSWORD, &secret_key).await.unwrap();
        (vault, secret_key, tmp)
    }

    // ── init ─────────────────────────────────────────────────────────

    #[test]
    fn init_returns_hex_secret_key_and_writes_file() {
        let (vault, secret_key, _tmp) = init_vault();
        assert_eq!(secret_key.len(), 32); // 16 bytes hex
        assert!(secret_key.bytes().all(|b| b.is_ascii_hexdigit()));

        let on_disk = std::fs::read_to_string(vault.dir().join("secret.key")).unwrap();
        assert_eq!(on_disk, format!("{secret_key}\n"));
    }

    #[test]
    fn init_twice_fails() {
        let (vault, _sk, _tmp) = init_vault();
        let err = Vault::init(vault.dir(), PASSWORD).unwrap_err();
        assert!(matches!(err, VaultError::AlreadyInitialized));
    }

    #[cfg(unix)]
    #[test]
    fn init_sets_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let (vault, _sk, _tmp) = init_vault();
        let dir_mode = std::fs::metadata(vault.dir()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        let key_mode = std::fs::metadata(vault.dir().join("secret.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(key_mode & 0o777, 0o600);
    }

    // ── unlock / lock ────────────────────────────────────────────────

    #[tokio::test]
    async fn unlock_returns_64_hex_token() {
        let (vault, secret_key, _tmp) = init_vault();
        let token = vault.unlock(PASSWORD, &secret_key).await.unwrap();
        assert_eq!(token.len(), 64);
        assert!(vault.validate_token(&token).await);
    }

    #[tokio::test]
    async fn unlock_with_wrong_password_fails() {
        let (vault, secret_key, _tmp) = init_vault();
        let err = vault.unlock(b"not-the-password", &secret_key).await.unwrap_err();
        assert!(matches!(err, VaultError::WrongPassword));
        assert!(vault.status().await.unwrap().locked);
    }

    #[tokio::test]
    async fn unlock_with_wrong_secret_key_fails_without_audit() {
        let (vault, _sk, _tmp) = init_vault();
        let err = vault
            .unlock(PASSWORD, &"00".repeat(16))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::WrongPassword));

        let entries = vault.audit_log(100).unwrap();
        assert!(entries.iter().all(|e| e.action != "unlock"));
        assert!(vault.status().await.unwrap().locked);
    }

    #[tokio::test]
    async fn unlock_with_malformed_secret_key_fails_as_wrong_password() {
        let (vault, _sk, _tmp) = init_vault();
        let err = vault.unlock(PASSWORD, "zz-not-hex").await.unwrap_err();
        assert!(matches!(err, VaultError::WrongPassword));
    }

    #[tokio::test]
    async fn double_unlock_conflicts() {
        let (vault, secret_key, _tmp) = unlocked_vault().await;
        let err = vault.unlock(PASSWORD, &secret_key).await.unwrap_err();
        assert!(matches!(err, VaultError::AlreadyUnlocked));
    }

    #[tokio::test]
    async fn unlock_uninitialized_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".pvault");
        std::fs::create_dir_all(&dir).unwrap();
        let vault = Vault::open(&dir).unwrap();
        let err = vault.unlock(PASSWORD, "00").await.unwrap_err();
        assert!(matches!(err, VaultError::NotInitialized));
    }

    #[tokio::test]
    async fn lock_invalidates_token_and_is_idempotent() {
        let (vault, secret_key, _tmp) = init_vault();
        let token = vault.unlock(PASSWORD, &secret_key).await.unwrap();
        vault.lock().await;
        assert!(!vault.validate_token(&token).await);
        assert!(matches!(vault.get("identity.x").await, Err(VaultError::Locked)));
        vault.lock().await; // idempotent
    }

    #[tokio::test]
    async fn relock_and_reunlock_reads_data() {
        let (vault, secret_key, _tmp) = unlocked_vault().await;
        vault.set("identity.full_name", "Cool Cucumber", "").await.unwrap();
        vault.lock().await;
        vault.unlock(PASSWORD, &secret_key).await.unwrap();
        let field = vault.get("identity.full_name").await.unwrap().unwrap();
        assert_eq!(field.value.as_deref(), Some("Cool Cucumber"));
    }

    // ── fields ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn set_get_roundtrip_with_defaults() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.full_name", "Cool Cucumber", "").await.unwrap();

        let field = vault.get("identity.full_name").await.unwrap().unwrap();
        assert_eq!(field.value.as_deref(), Some("Cool Cucumber"));
        assert_eq!(field.category, "identity");
        assert_eq!(field.sensitivity, "standard");
        assert_eq!(field.version, 1);
    }

    #[tokio::test]
    async fn set_twice_bumps_version_and_timestamp() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.email", "a@example.com", "").await.unwrap();
        let first = vault.get("identity.email").await.unwrap().unwrap();
        vault.set("identity.email", "b@example.com", "").await.unwrap();
        let second = vault.get("identity.email").await.unwrap().unwrap();

        assert_eq!(second.version, 2);
        assert_eq!(second.value.as_deref(), Some("b@example.com"));
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn set_rejects_invalid_tier_and_id() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        let err = vault.set("identity.x", "v", "ultra").await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidTier));
        let err = vault.set("no-dot", "v", "").await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidFieldId { .. }));
    }

    #[tokio::test]
    async fn operations_before_unlock_fail_locked() {
        let (vault, _sk, _tmp) = init_vault();
        assert!(matches!(vault.set("a.b", "v", "").await, Err(VaultError::Locked)));
        assert!(matches!(vault.get("a.b").await, Err(VaultError::Locked)));
        assert!(matches!(vault.list().await, Err(VaultError::Locked)));
        assert!(matches!(vault.get_context().await, Err(VaultError::Locked)));
        assert!(matches!(vault.delete("a.b").await, Err(VaultError::Locked)));
        assert!(matches!(
            vault.create_service_token("c", "*", chrono::Duration::hours(1)).await,
            Err(VaultError::Locked)
        ));
    }

    #[tokio::test]
    async fn get_missing_field_is_none() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        assert!(vault.get("identity.nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_omits_values() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.full_name", "Jane", "").await.unwrap();
        let fields = vault.list().await.unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields[0].value.is_none());
    }

    #[tokio::test]
    async fn context_groups_by_category() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.full_name", "Jane", "").await.unwrap();
        vault.set("identity.email", "jane@example.com", "").await.unwrap();
        vault.set("financial.income", "100k", "sensitive").await.unwrap();

        let bundle = vault.get_context().await.unwrap();
        assert_eq!(bundle.categories.len(), 2);
        assert_eq!(bundle.categories["identity"].len(), 2);
        assert_eq!(
            bundle.categories["financial"][0].value.as_deref(),
            Some("100k")
        );
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_decrypt() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.full_name", "Cool Cucumber", "").await.unwrap();

        // Corrupt the last byte of the stored envelope, out of band.
        let conn = Connection::open(vault.dir().join("vault.db")).unwrap();
        let stored: String = conn
            .query_row(
                "SELECT value FROM vault_fields WHERE id = 'identity.full_name'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let mut raw = BASE64.decode(&stored).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        conn.execute(
            "UPDATE vault_fields SET value = ?1 WHERE id = 'identity.full_name'",
            [BASE64.encode(&raw)],
        )
        .unwrap();

        let err = vault.get("identity.full_name").await.unwrap_err();
        assert!(matches!(err, VaultError::Crypto(_)));
    }

    #[tokio::test]
    async fn delete_removes_field() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.full_name", "Jane", "").await.unwrap();
        vault.delete("identity.full_name").await.unwrap();
        assert!(vault.get("identity.full_name").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_sensitivity_validates_tier() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.ssn", "123-45-6789", "").await.unwrap();
        vault.set_sensitivity("identity.ssn", "critical").await.unwrap();
        let field = vault.get("identity.ssn").await.unwrap().unwrap();
        assert_eq!(field.sensitivity, "critical");

        let err = vault.set_sensitivity("identity.ssn", "INVALID").await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidTier));
    }

    // ── auto-lock ────────────────────────────────────────────────────

    #[tokio::test]
    async fn auto_lock_zeroizes_after_idle_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".pvault");
        let secret_key = Vault::init(&dir, PASSWORD).unwrap();
        let mut vault = Vault::open(&dir).unwrap();
        vault.set_auto_lock_ttl(Duration::from_millis(50));

        let token = vault.unlock(PASSWORD, &secret_key).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!vault.validate_token(&token).await);
        assert!(matches!(vault.get("identity.x").await, Err(VaultError::Locked)));
        assert!(vault.status().await.unwrap().locked);
    }

    // ── service tokens ───────────────────────────────────────────────

    #[tokio::test]
    async fn service_token_lifecycle() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        let (raw, expires_at) = vault
            .create_service_token("agent", "identity.*", chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(raw.len(), 64);
        assert!(expires_at > Utc::now());

        let record = vault.validate_service_token(&raw).unwrap();
        assert_eq!(record.consumer, "agent");
        assert_eq!(record.scope, "identity.*");

        let tokens = vault.list_service_tokens().await.unwrap();
        assert_eq!(tokens.len(), 1);

        assert_eq!(vault.revoke_service_token(&raw).await.unwrap(), 1);
        assert!(vault.validate_service_token(&raw).is_none());
        assert_eq!(vault.revoke_service_token(&raw).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn raw_service_token_never_persisted() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        let (raw, _) = vault
            .create_service_token("agent", "*", chrono::Duration::hours(1))
            .await
            .unwrap();

        let conn = Connection::open(vault.dir().join("vault.db")).unwrap();
        let mut stmt = conn.prepare("SELECT token FROM vault_tokens").unwrap();
        let stored: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(!stored.is_empty());
        assert!(stored.iter().all(|s| s != &raw));
        assert!(stored.contains(&hash_service_token(&raw)));
    }

    #[tokio::test]
    async fn expired_service_token_does_not_validate() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        let (raw, _) = vault
            .create_service_token("agent", "*", chrono::Duration::seconds(-1))
            .await
            .unwrap();
        assert!(vault.validate_service_token(&raw).is_none());
    }

    // ── audit ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn operations_append_audit_entries() {
        let (vault, _sk, _tmp) = unlocked_vault().await;
        vault.set("identity.full_name", "Jane", "").await.unwrap();
        vault.get("identity.full_name").await.unwrap();
        vault.get_context().await.unwrap();

        let entries = vault.audit_log(10).unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert!(actions.contains(&"unlock"));
        assert!(actions.contains(&"write"));
        assert!(actions.contains(&"read"));
        assert!(actions.contains(&"context"));
    }
}
