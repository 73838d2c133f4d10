//! Per-field encryption envelope.
//!
//! A sealed field value is `base64(nonce || ciphertext || tag)` under the
//! AES-256-GCM subkey derived for the field's category. Subkey derivation is
//! deterministic, so no subkey is ever persisted — an attacker who recovers
//! one subkey is confined to one category.
//!
//! The verification ciphertext is the one exception: it is sealed directly
//! under the master key (no subkey) and decrypting it is the authoritative
//! proof that password + secret key + salt produced the right master key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::crypto::{self, EncryptionKey};
use crate::error::CryptoError;

/// Fixed plaintext sealed at init time. Changing this value invalidates
/// every existing vault — do not rotate it without a migration.
pub const VERIFICATION_PLAINTEXT: &[u8] = b"personal-vault-verification";

/// Derive the category subkey and seal `plaintext` into a base64 envelope.
///
/// # Errors
///
/// Returns [`CryptoError`] if subkey derivation or encryption fails.
pub fn seal(
    master: &EncryptionKey,
    salt: &[u8],
    category: &str,
    plaintext: &[u8],
) -> Result<String, CryptoError> {
    let subkey = crypto::derive_subkey(master, salt, category)?;
    seal_with(&subkey, plaintext)
}

/// Derive the category subkey and open a base64 envelope.
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] if the envelope is not valid base64
/// or fails authentication.
pub fn open(
    master: &EncryptionKey,
    salt: &[u8],
    category: &str,
    encoded: &str,
) -> Result<Vec<u8>, CryptoError> {
    let subkey = crypto::derive_subkey(master, salt, category)?;
    open_with(&subkey, encoded)
}

/// Seal under an already-derived subkey. Used when a caller decrypts many
/// fields of one category and caches the subkey for the duration of the call.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn seal_with(subkey: &EncryptionKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    let sealed = crypto::encrypt(subkey, plaintext)?;
    Ok(BASE64.encode(sealed))
}

/// Open under an already-derived subkey.
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] on bad base64 or failed
/// authentication.
pub fn open_with(subkey: &EncryptionKey, encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let data = BASE64.decode(encoded).map_err(|_| CryptoError::Decryption)?;
    crypto::decrypt(subkey, &data)
}

/// Produce the verification ciphertext, sealed directly under the master key.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn make_verification(master: &EncryptionKey) -> Result<String, CryptoError> {
    let sealed = crypto::encrypt(master, VERIFICATION_PLAINTEXT)?;
    Ok(BASE64.encode(sealed))
}

/// Check a stored verification ciphertext against the master key.
///
/// Returns `true` only if the envelope decrypts and the recovered plaintext
/// matches the fixed constant byte-for-byte.
#[must_use]
pub fn verify(master: &EncryptionKey, encoded: &str) -> bool {
    let Ok(data) = BASE64.decode(encoded) else {
        return false;
    };
    match crypto::decrypt(master, &data) {
        Ok(plaintext) => crypto::constant_time_eq(&plaintext, VERIFICATION_PLAINTEXT),
        Err(_) => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn test_key() -> EncryptionKey {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        EncryptionKey::from_bytes(bytes)
    }

    #[test]
    fn seal_open_roundtrip() {
        let master = test_key();
        let salt = b"salt";
        let sealed = seal(&master, salt, "identity", b"Jane Smith").unwrap();
        let opened = open(&master, salt, "identity", &sealed).unwrap();
        assert_eq!(opened, b"Jane Smith");
    }

    #[test]
    fn open_with_wrong_category_fails() {
        let master = test_key();
        let salt = b"salt";
        let sealed = seal(&master, salt, "identity", b"Jane Smith").unwrap();
        let result = open(&master, salt, "financial", &sealed);
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn open_rejects_invalid_base64() {
        let master = test_key();
        let result = open(&master, b"salt", "identity", "not base64!!!");
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn sealed_output_is_base64_text() {
        let master = test_key();
        let sealed = seal(&master, b"salt", "identity", b"v").unwrap();
        assert!(BASE64.decode(&sealed).is_ok());
    }

    #[test]
    fn verification_roundtrip() {
        let master = test_key();
        let encoded = make_verification(&master).unwrap();
        assert!(verify(&master, &encoded));
    }

    #[test]
    fn verification_fails_with_wrong_master() {
        let encoded = make_verification(&test_key()).unwrap();
        assert!(!verify(&test_key(), &encoded));
    }

    #[test]
    fn verification_fails_on_garbage() {
        let master = test_key();
        assert!(!verify(&master, "??not-base64??"));
        assert!(!verify(&master, &BASE64.encode(b"short")));
    }
}
