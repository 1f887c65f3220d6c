use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::instrument;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const SALT_LEN: usize = 24;
pub const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretStoreError {
    InvalidSalt,
    InvalidNonce,
    KeyDerivationFailed,
    EncryptionFailed,
    /// Ciphertext is not valid base64.
    MalformedCiphertext,
    /// Authentication tag mismatch: the stored value was tampered with or
    /// encrypted under different parameters.
    DecryptionFailed,
    InvalidPlaintext,
}

impl std::fmt::Display for SecretStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSalt => write!(f, "invalid salt length"),
            Self::InvalidNonce => write!(f, "invalid nonce length"),
            Self::KeyDerivationFailed => write!(f, "key derivation failed"),
            Self::EncryptionFailed => write!(f, "encryption failed"),
            Self::MalformedCiphertext => write!(f, "ciphertext is not valid base64"),
            Self::DecryptionFailed => write!(f, "decryption failed"),
            Self::InvalidPlaintext => write!(f, "decrypted value is not valid utf-8"),
        }
    }
}

impl std::error::Error for SecretStoreError {}

#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKey([u8; 32]);

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerivedKey(REDACTED)")
    }
}

#[must_use]
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[must_use]
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Derives the per-context key. The context name is bound into the
/// derivation so a ciphertext copied between contexts never decrypts.
fn derive_key(context_name: &str, salt: &[u8]) -> Result<DerivedKey, SecretStoreError> {
    if salt.len() != SALT_LEN {
        return Err(SecretStoreError::InvalidSalt);
    }
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(context_name.as_bytes(), salt, &mut key)
        .map_err(|_| SecretStoreError::KeyDerivationFailed)?;
    Ok(DerivedKey(key))
}

#[instrument(level = "debug", skip_all, fields(context = %context_name))]
pub fn encrypt(
    context_name: &str,
    plaintext: &str,
    salt: &[u8],
    nonce: &[u8],
) -> Result<String, SecretStoreError> {
    if nonce.len() != NONCE_LEN {
        return Err(SecretStoreError::InvalidNonce);
    }
    let key = derive_key(context_name, salt)?;
    let cipher = ChaCha20Poly1305::new((&key.0).into());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
        .map_err(|_| SecretStoreError::EncryptionFailed)?;
    Ok(BASE64.encode(ciphertext))
}

#[instrument(level = "debug", skip_all, fields(context = %context_name))]
pub fn decrypt(
    context_name: &str,
    ciphertext: &str,
    salt: &[u8],
    nonce: &[u8],
) -> Result<String, SecretStoreError> {
    if nonce.len() != NONCE_LEN {
        return Err(SecretStoreError::InvalidNonce);
    }
    let key = derive_key(context_name, salt)?;
    let cipher = ChaCha20Poly1305::new((&key.0).into());
    let raw = BASE64
        .decode(ciphertext)
        .map_err(|_| SecretStoreError::MalformedCiphertext)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), raw.as_ref())
        .map_err(|_| SecretStoreError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| SecretStoreError::InvalidPlaintext)
}
