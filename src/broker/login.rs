//! Broker login flow.
//!
//! Correlates "user initiates login" with "provider redirects back"
//! through a single-use random token passed as the OAuth `state`
//! parameter. Pending attempts live only in memory; losing them on
//! restart just fails in-flight logins.

use crate::config::{LoginConfig, ProviderConfig};
use crate::credentials::{CredentialStore, TokenCipher};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::provider::ProviderClient;
use super::BrokerError;

/// Pending login attempt, keyed by correlation token.
#[derive(Clone, Debug)]
struct LoginAttempt {
    user_id: i64,
    created_at: DateTime<Utc>,
}

/// Manages the handshake between login initiation and the provider's
/// redirect callback.
pub struct LoginBroker {
    attempts: Mutex<HashMap<String, LoginAttempt>>,
    correlation_ttl: Duration,
    token_ttl: Duration,
    provider_config: ProviderConfig,
    provider: Arc<dyn ProviderClient>,
    credentials: Arc<CredentialStore>,
    cipher: TokenCipher,
}

impl LoginBroker {
    pub fn new(
        login_config: &LoginConfig,
        provider_config: ProviderConfig,
        provider: Arc<dyn ProviderClient>,
        credentials: Arc<CredentialStore>,
        cipher: TokenCipher,
    ) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            correlation_ttl: Duration::seconds(login_config.correlation_ttl_seconds),
            token_ttl: Duration::hours(login_config.token_ttl_hours),
            provider_config,
            provider,
            credentials,
            cipher,
        }
    }

    /// Starts a login attempt for a user.
    ///
    /// Returns the correlation token and the provider login URL with
    /// the token embedded as the `state` parameter.
    pub fn begin_login(&self, user_id: i64) -> Result<(String, String), BrokerError> {
        if self.provider_config.api_key.is_empty() || self.provider_config.api_secret.is_empty() {
            return Err(BrokerError::ProviderNotConfigured);
        }

        let token = generate_correlation_token();
        let attempt = LoginAttempt {
            user_id,
            created_at: Utc::now(),
        };
        self.attempts.lock().unwrap().insert(token.clone(), attempt);

        let login_url = self
            .provider
            .login_url(&self.provider_config.api_key, &token);

        debug!(user_id, "Login attempt initiated");

        Ok((token, login_url))
    }

    /// Resolves a provider callback: identifies the initiating user,
    /// exchanges the request token for durable tokens, and persists
    /// them encrypted.
    ///
    /// The correlation entry is removed before the exchange is
    /// attempted, so a failed exchange never leaves a redeemable token
    /// behind.
    pub async fn resolve_callback(
        &self,
        correlation_token: &str,
        request_token: &str,
    ) -> Result<i64, BrokerError> {
        let user_id = self
            .consume(correlation_token)
            .ok_or(BrokerError::SessionExpiredOrInvalid)?;

        debug!(user_id, "Correlation token redeemed, exchanging request token");

        let tokens = self
            .provider
            .exchange_request_token(
                &self.provider_config.api_key,
                &self.provider_config.api_secret,
                request_token,
            )
            .await
            .map_err(|e| {
                warn!(user_id, error = %e, "Request token exchange failed");
                match e {
                    super::ProviderError::Auth(_) => BrokerError::SessionExpiredOrInvalid,
                    super::ProviderError::Network(msg) => BrokerError::Unavailable(msg),
                    super::ProviderError::Api(msg) => BrokerError::ProviderRejected(msg),
                    super::ProviderError::Unexpected(msg) => BrokerError::Internal(msg),
                }
            })?;

        let api_key_cipher = self
            .cipher
            .encrypt(&self.provider_config.api_key)
            .map_err(|e| BrokerError::Internal(format!("Failed to encrypt api key: {}", e)))?;
        let access_token_cipher = self
            .cipher
            .encrypt(&tokens.access_token)
            .map_err(|e| BrokerError::Internal(format!("Failed to encrypt access token: {}", e)))?;
        let refresh_token_cipher = match &tokens.refresh_token {
            Some(token) => Some(self.cipher.encrypt(token).map_err(|e| {
                BrokerError::Internal(format!("Failed to encrypt refresh token: {}", e))
            })?),
            None => None,
        };

        // Fixed-duration expiry from issuance; the provider does not
        // report its own.
        let expires_at = Utc::now() + self.token_ttl;

        self.credentials
            .upsert(
                user_id,
                &api_key_cipher,
                Some(&access_token_cipher),
                refresh_token_cipher.as_deref(),
                Some(expires_at),
            )
            .map_err(|e| BrokerError::Internal(format!("Failed to store credentials: {}", e)))?;

        info!(
            user_id,
            has_refresh_token = tokens.refresh_token.is_some(),
            "Broker login completed"
        );

        Ok(user_id)
    }

    /// Atomically removes and returns the attempt for a token.
    ///
    /// Expired entries are dropped on read, so a sweep that has not run
    /// yet cannot extend a token's life.
    fn consume(&self, correlation_token: &str) -> Option<i64> {
        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts.remove(correlation_token)?;

        if Utc::now() - attempt.created_at > self.correlation_ttl {
            return None;
        }

        Some(attempt.user_id)
    }

    /// Drops expired login attempts.
    pub fn sweep_expired(&self) {
        let mut attempts = self.attempts.lock().unwrap();
        let now = Utc::now();
        attempts.retain(|_, attempt| now - attempt.created_at <= self.correlation_ttl);
    }

    /// Number of pending login attempts (monitoring/tests).
    pub fn pending_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

/// Generates a 256-bit correlation token, hex-encoded.
fn generate_correlation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Background task that periodically purges abandoned login attempts.
pub async fn run_login_sweeper(broker: Arc<LoginBroker>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        broker.sweep_expired();
        tracing::debug!(
            pending = broker.pending_count(),
            "Login attempt sweep complete"
        );
    }
}
