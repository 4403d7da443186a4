//! Per-call session reconstruction.
//!
//! A live session is rebuilt from the encrypted credential record on
//! every gateway invocation. There is no cross-request session cache:
//! a reconnect is observed immediately by the next call, at the cost of
//! one decrypt per operation.

use crate::credentials::{CredentialStore, TokenCipher};
use std::sync::Arc;
use tracing::warn;

use super::BrokerError;

/// Transient, call-scoped authorization for one provider invocation.
///
/// Holds decrypted credentials; owned by the calling stack and dropped
/// at call return. Never persist or cache one of these.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveSession {
    pub user_id: i64,
    pub api_key: String,
    pub access_token: String,
}

/// Rebuilds live sessions from stored encrypted credentials.
#[derive(Clone)]
pub struct SessionMaterializer {
    credentials: Arc<CredentialStore>,
    cipher: TokenCipher,
}

impl SessionMaterializer {
    pub fn new(credentials: Arc<CredentialStore>, cipher: TokenCipher) -> Self {
        Self {
            credentials,
            cipher,
        }
    }

    /// Reconstructs a [`LiveSession`] for the user, or reports why one
    /// cannot exist.
    ///
    /// Fails with `NotConnected` when no record exists, the record has
    /// no access token, or decryption fails. Corrupted ciphertext is
    /// indistinguishable from absent credentials for business purposes,
    /// but is logged as a security-relevant event.
    pub fn materialize(&self, user_id: i64) -> Result<LiveSession, BrokerError> {
        let record = self
            .credentials
            .get(user_id)
            .map_err(|e| BrokerError::Internal(format!("Credential lookup failed: {}", e)))?
            .ok_or(BrokerError::NotConnected)?;

        let Some(access_token_cipher) = record.access_token else {
            return Err(BrokerError::NotConnected);
        };

        let api_key = self.cipher.decrypt(&record.api_key).map_err(|e| {
            warn!(user_id, error = %e, "Credential decryption failed (api_key)");
            BrokerError::NotConnected
        })?;
        let access_token = self.cipher.decrypt(&access_token_cipher).map_err(|e| {
            warn!(user_id, error = %e, "Credential decryption failed (access_token)");
            BrokerError::NotConnected
        })?;

        if api_key.is_empty() || access_token.is_empty() {
            return Err(BrokerError::NotConnected);
        }

        Ok(LiveSession {
            user_id,
            api_key,
            access_token,
        })
    }
}
