//! Encrypted brokerage credential storage.
//!
//! One credential record per user: the brokerage API key plus the
//! access/refresh tokens obtained through the login flow. Every field
//! is encrypted with AES-256-GCM before it reaches SQLite; a record
//! with no access token is treated as "not connected" even when an
//! API key is present.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore                    │
//! │  - upsert / get / delete by user_id      │
//! │  - ciphertext in, ciphertext out         │
//! └─────────────────────────────────────────┘
//!          ↑                    ↑
//!    (encrypt)            (decrypt)
//!          │                    │
//! ┌─────────────────────────────────────────┐
//! │       TokenCipher                        │
//! │  - AES-256-GCM, nonce-per-field          │
//! │  - key normalized from configured secret │
//! └─────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

mod encryption;
mod store;

pub use encryption::{CipherError, TokenCipher};
pub use store::CredentialStore;

/// One user's persisted brokerage credentials, as stored (ciphertext).
#[derive(Clone, Debug)]
pub struct CredentialRecord {
    pub user_id: i64,

    /// Brokerage API key (ciphertext)
    pub api_key: String,

    /// Access token (ciphertext). `None` means the user never completed
    /// a login exchange, or was disconnected.
    pub access_token: Option<String>,

    /// Refresh token (ciphertext, optional)
    pub refresh_token: Option<String>,

    /// When the access token expires (UTC). Set by policy at exchange
    /// time; the provider does not report its own expiry.
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// A record without an access token is not a usable connection.
    pub fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }
}
