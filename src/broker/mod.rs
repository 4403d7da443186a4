//! Brokerage integration core.
//!
//! Everything that talks to the external brokerage flows through this
//! module: the login flow that turns a one-time request token into
//! stored encrypted credentials, the per-call session materializer,
//! and the gateway that wraps every provider operation with consistent
//! authentication and error classification.

pub mod gateway;
pub mod kite;
pub mod login;
pub mod provider;
pub mod session;

pub use gateway::{BrokerGateway, OrderRequest, PlacedOrder};
pub use kite::KiteClient;
pub use login::{run_login_sweeper, LoginBroker};
pub use provider::{ProviderClient, ProviderError, ProviderOrderParams, TokenBundle};
pub use session::{LiveSession, SessionMaterializer};

/// Failure taxonomy for broker operations.
///
/// Provider and cryptographic failures are caught at the gateway
/// boundary and re-emitted as one of these variants; nothing below the
/// gateway leaks provider-specific error types upward.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerError {
    /// Provider application key/secret missing from configuration
    ProviderNotConfigured,
    /// Login correlation token absent, already consumed, or expired
    SessionExpiredOrInvalid,
    /// No usable credentials for this user
    NotConnected,
    /// Stored token rejected by the provider; user must reconnect
    AuthExpired,
    /// Transient network condition; safe for the caller to retry
    Unavailable(String),
    /// Business-rule rejection reported by the provider
    ProviderRejected(String),
    /// Local order exists but was never acknowledged by the provider
    OrderNotSynced,
    /// No local order with the given id for this user
    OrderNotFound,
    /// Unclassified internal failure
    Internal(String),
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerError::ProviderNotConfigured => {
                write!(f, "Broker provider credentials are not configured")
            }
            BrokerError::SessionExpiredOrInvalid => {
                write!(f, "Login session expired or invalid. Please restart the login flow")
            }
            BrokerError::NotConnected => {
                write!(f, "Broker not connected. Please connect your account")
            }
            BrokerError::AuthExpired => {
                write!(f, "Broker session expired. Please reconnect your account")
            }
            BrokerError::Unavailable(msg) => write!(f, "Broker unavailable: {}", msg),
            BrokerError::ProviderRejected(msg) => write!(f, "Broker rejected request: {}", msg),
            BrokerError::OrderNotSynced => {
                write!(f, "Order has no broker order id and cannot be cancelled upstream")
            }
            BrokerError::OrderNotFound => write!(f, "Order not found"),
            BrokerError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for BrokerError {}
