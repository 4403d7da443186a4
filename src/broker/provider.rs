//! Provider client capability.
//!
//! The gateway depends only on this trait, never on a concrete wire
//! client, so every operation can be exercised against a test double.

use super::session::LiveSession;
use async_trait::async_trait;
use serde_json::Value;

/// Provider-level failure classification.
///
/// Produced by `ProviderClient` implementations; the gateway translates
/// these into the [`BrokerError`](super::BrokerError) taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Token/authentication rejected by the provider
    Auth(String),
    /// Network failure or timeout reaching the provider
    Network(String),
    /// Provider-reported API error (validation, funds, order state)
    Api(String),
    /// Anything the implementation could not classify
    Unexpected(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Provider auth error: {}", msg),
            ProviderError::Network(msg) => write!(f, "Provider network error: {}", msg),
            ProviderError::Api(msg) => write!(f, "Provider API error: {}", msg),
            ProviderError::Unexpected(msg) => write!(f, "Unexpected provider error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Durable tokens returned by the provider's token exchange.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Order parameters in the provider's expected shape.
///
/// The gateway performs the domain-to-provider translation; by the time
/// params reach a `ProviderClient`, the compound instrument is already
/// split and `price` is only present for LIMIT orders.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOrderParams {
    pub exchange: String,
    pub tradingsymbol: String,
    pub transaction_type: String,
    pub order_type: String,
    pub quantity: u32,
    pub product: String,
    pub validity: String,
    pub price: Option<f64>,
}

/// External brokerage API surface.
///
/// Each authenticated method receives a [`LiveSession`] materialized for
/// this single call; implementations must not cache it.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Builds the provider's login page URL with the correlation token
    /// embedded as a passthrough `state` parameter.
    fn login_url(&self, api_key: &str, state: &str) -> String;

    /// Exchanges a one-time request token for durable tokens.
    async fn exchange_request_token(
        &self,
        api_key: &str,
        api_secret: &str,
        request_token: &str,
    ) -> Result<TokenBundle, ProviderError>;

    async fn profile(&self, session: &LiveSession) -> Result<Value, ProviderError>;
    async fn margins(&self, session: &LiveSession) -> Result<Value, ProviderError>;
    async fn holdings(&self, session: &LiveSession) -> Result<Value, ProviderError>;
    async fn positions(&self, session: &LiveSession) -> Result<Value, ProviderError>;
    async fn orders(&self, session: &LiveSession) -> Result<Value, ProviderError>;

    async fn order_history(
        &self,
        session: &LiveSession,
        order_id: &str,
    ) -> Result<Value, ProviderError>;

    async fn order_trades(
        &self,
        session: &LiveSession,
        order_id: &str,
    ) -> Result<Value, ProviderError>;

    async fn quote(
        &self,
        session: &LiveSession,
        instruments: &[String],
    ) -> Result<Value, ProviderError>;

    async fn auction_instruments(&self, session: &LiveSession) -> Result<Value, ProviderError>;

    /// Places an order and returns the provider-assigned order id.
    async fn place_order(
        &self,
        session: &LiveSession,
        params: &ProviderOrderParams,
    ) -> Result<String, ProviderError>;

    /// Cancels an order by its provider-assigned id.
    async fn cancel_order(
        &self,
        session: &LiveSession,
        order_id: &str,
    ) -> Result<String, ProviderError>;

    async fn mf_orders(&self, session: &LiveSession) -> Result<Value, ProviderError>;
    async fn mf_holdings(&self, session: &LiveSession) -> Result<Value, ProviderError>;
    async fn mf_sips(&self, session: &LiveSession) -> Result<Value, ProviderError>;
    async fn mf_instruments(&self, session: &LiveSession) -> Result<Value, ProviderError>;
}
