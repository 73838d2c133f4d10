//! Error types for `pvault-core`.
//!
//! One enum per subsystem. Crypto errors never include key material or
//! plaintext — only operation descriptions. Credential failures collapse
//! into a single [`VaultError::WrongPassword`] so callers cannot tell which
//! check failed.

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// Decryption failed: wrong key, tampered ciphertext, or truncated input.
    /// Deliberately carries no detail — the causes must be indistinguishable.
    #[error("decryption failed")]
    Decryption,

    /// Key derivation (Argon2id or HKDF) failed.
    #[error("key derivation failed for '{context}': {reason}")]
    KeyDerivation { context: String, reason: String },
}

/// Errors from the SQLite field store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database returned an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Errors from vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The vault is locked — no key material is resident.
    #[error("vault is locked")]
    Locked,

    /// The vault is already unlocked.
    #[error("vault is already unlocked")]
    AlreadyUnlocked,

    /// The vault has not been initialized yet.
    #[error("vault is not initialized")]
    NotInitialized,

    /// The vault has already been initialized.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// The password or secret key is wrong. Covers the secret-key hash
    /// mismatch, the verification-ciphertext failure, and malformed
    /// secret-key input — callers must not be able to tell them apart.
    #[error("wrong password or secret key")]
    WrongPassword,

    /// The sensitivity tier is not one of the four valid values.
    #[error("invalid sensitivity tier: must be public, standard, sensitive, or critical")]
    InvalidTier,

    /// The field identifier failed syntactic validation.
    #[error("invalid field id: {reason}")]
    InvalidFieldId { reason: String },

    /// Persisted vault metadata is missing or malformed.
    #[error("vault metadata corrupted: {reason}")]
    Metadata { reason: String },

    /// A cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The store returned an error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
