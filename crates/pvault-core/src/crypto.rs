//! Cryptographic primitives for `pvault`.
//!
//! Provides the Argon2id master-key derivation, HKDF-SHA256 category
//! subkeys, AES-256-GCM authenticated encryption, SHA-256 hashing, and
//! constant-time comparison. All key material is wrapped in zeroize-on-drop
//! types and cleared from memory when dropped.
//!
//! # Security model
//!
//! - The master key is derived from `password || secret_key` with Argon2id
//!   using fixed parameters (m=64 MiB, t=3, p=1, 32-byte tag). The
//!   parameters are not configurable: derivation must be deterministic
//!   across machines and versions.
//! - Every encryption generates a fresh 96-bit nonce via `OsRng`.
//! - Ciphertext format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! - Decryption failures are uniform — wrong key, tampered data, and
//!   truncated input are indistinguishable to the caller.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

/// Argon2id time cost.
const ARGON_TIME: u32 = 3;

/// Argon2id memory cost in KiB (64 MiB).
const ARGON_MEMORY_KIB: u32 = 64 * 1024;

/// Argon2id lanes. Sequential: deterministic performance across machines.
const ARGON_PARALLELISM: u32 = 1;

/// Length of all derived keys (256-bit).
pub const KEY_LEN: usize = 32;

/// Length of the KDF/HKDF salt.
pub const SALT_LEN: usize = 32;

/// Length of the device secret key (128-bit).
pub const SECRET_KEY_LEN: usize = 16;

/// Nonce length for AES-256-GCM (96 bits).
const NONCE_LEN: usize = 12;

/// Minimum ciphertext length: a nonce plus at least one byte.
const MIN_CIPHERTEXT_LEN: usize = NONCE_LEN + 1;

/// A 256-bit encryption key that is zeroized on drop.
///
/// Used for the master key and for per-category derived subkeys. The inner
/// bytes are never exposed in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    ///
    /// Use with care — the caller must not log or persist these bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the 256-bit master key from `password || secret_key` and the vault
/// salt using Argon2id.
///
/// The concatenation scratch buffer is zeroized before returning.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the Argon2 parameters are
/// rejected or derivation fails.
pub fn derive_master(
    password: &[u8],
    secret_key: &[u8],
    salt: &[u8],
) -> Result<EncryptionKey, CryptoError> {
    let params = Params::new(ARGON_MEMORY_KIB, ARGON_TIME, ARGON_PARALLELISM, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivation {
            context: "argon2id".to_owned(),
            reason: e.to_string(),
        })?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut combined = Zeroizing::new(Vec::with_capacity(password.len() + secret_key.len()));
    combined.extend_from_slice(password);
    combined.extend_from_slice(secret_key);

    let mut derived = [0u8; KEY_LEN];
    argon2
        .hash_password_into(&combined, salt, &mut derived)
        .map_err(|e| CryptoError::KeyDerivation {
            context: "argon2id".to_owned(),
            reason: e.to_string(),
        })?;

    Ok(EncryptionKey::from_bytes(derived))
}

/// Derive a per-category subkey from the master key using HKDF-SHA256.
///
/// The `salt` is the vault salt; the category name is the `info` parameter,
/// so each category gets its own key and no subkey is ever persisted.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if HKDF expansion fails.
pub fn derive_subkey(
    master: &EncryptionKey,
    salt: &[u8],
    category: &str,
) -> Result<EncryptionKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master.as_bytes());
    let mut derived = [0u8; KEY_LEN];
    hk.expand(category.as_bytes(), &mut derived)
        .map_err(|e| CryptoError::KeyDerivation {
            context: category.to_owned(),
            reason: e.to_string(),
        })?;
    Ok(EncryptionKey::from_bytes(derived))
}

/// Encrypt plaintext with AES-256-GCM using a fresh random nonce.
///
/// Returns `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    // nonce || ciphertext (tag appended by aes-gcm)
    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt data produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] for any failure: wrong key, tampered
/// ciphertext or tag, or input shorter than 13 bytes.
pub fn decrypt(key: &EncryptionKey, combined: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if combined.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::Decryption);
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// SHA-256 of the device secret key, used for the fail-fast check at unlock.
#[must_use]
pub fn hash_secret(secret_key: &[u8]) -> [u8; 32] {
    Sha256::digest(secret_key).into()
}

/// Constant-time byte comparison. False for slices of different lengths.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Generate the 32-byte vault salt from the OS CSPRNG.
#[must_use]
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Generate the 16-byte device secret key from the OS CSPRNG.
#[must_use]
pub fn generate_secret_key() -> [u8; SECRET_KEY_LEN] {
    let mut key = [0u8; SECRET_KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}
