//! AES-256-GCM encryption for stored brokerage credentials.
//!
//! Every credential field is encrypted separately with a unique nonce.
//! The nonce is prepended to the ciphertext so each field round-trips as
//! a single base64 string.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Cipher errors
#[derive(Debug, PartialEq, Clone)]
pub enum CipherError {
    /// Encryption failed (cipher construction or AEAD failure)
    EncryptionFailed,
    /// Ciphertext could not be decrypted (tampered, truncated, or wrong key)
    DecryptionFailed,
}

impl std::fmt::Display for CipherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CipherError::EncryptionFailed => write!(f, "Encryption failed"),
            CipherError::DecryptionFailed => {
                write!(f, "Decryption failed (tampered data or wrong key)")
            }
        }
    }
}

impl std::error::Error for CipherError {}

/// Normalizes an arbitrary configured secret into a 32-byte key.
///
/// Secrets shorter than 32 bytes are right-padded with ASCII '0';
/// longer secrets are truncated. This matches the key handling of
/// already-deployed installations, so it must not change: doing so
/// would make every stored credential undecryptable.
fn normalize_key(secret: &str) -> [u8; KEY_SIZE] {
    let mut key = [b'0'; KEY_SIZE];
    let bytes = secret.as_bytes();
    let len = bytes.len().min(KEY_SIZE);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Symmetric cipher for credential fields.
///
/// Key material is derived once at construction from the configured
/// secret. Empty strings pass through unencrypted in both directions:
/// optional credential fields are stored as empty, not as ciphertext.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_SIZE],
}

impl TokenCipher {
    pub fn new(secret: &str) -> Self {
        Self {
            key: normalize_key(secret),
        }
    }

    /// Encrypts a plaintext string to `base64(nonce || ciphertext)`.
    ///
    /// Empty input maps to empty output.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::EncryptionFailed)?;

        // Random nonce, never reused
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Decrypts a `base64(nonce || ciphertext)` string.
    ///
    /// Empty input maps to empty output. Any malformed or tampered
    /// input fails with `DecryptionFailed` — authenticated encryption
    /// guarantees tampering is detected rather than producing garbage.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let combined = BASE64
            .decode(ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)?;

        if combined.len() <= NONCE_SIZE {
            return Err(CipherError::DecryptionFailed);
        }

        let (nonce_bytes, encrypted) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::DecryptionFailed)?;

        let plaintext = cipher
            .decrypt(nonce, encrypted)
            .map_err(|_| CipherError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::DecryptionFailed)
    }
}
