//! Brokerage gateway — the single choke point for provider operations.
//!
//! Every external-API operation follows the same template: materialize
//! a session for the user, translate domain parameters into the
//! provider's shape, invoke the provider, and classify any failure into
//! the [`BrokerError`](super::BrokerError) taxonomy. If materialization
//! fails the provider is never called.

use crate::orders::OrderStore;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::provider::{ProviderClient, ProviderError, ProviderOrderParams};
use super::session::SessionMaterializer;
use super::BrokerError;

/// Domain-level order placement request.
#[derive(Clone, Debug, Deserialize)]
pub struct OrderRequest {
    /// Compound instrument identifier, "EXCHANGE:TRADINGSYMBOL"
    pub instrument: String,
    /// "BUY" or "SELL"
    pub transaction_type: String,
    /// "MARKET", "LIMIT", "SL", "SL-M"
    pub order_type: String,
    pub quantity: u32,
    /// Only forwarded to the provider for LIMIT orders
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_validity")]
    pub validity: String,
}

fn default_product() -> String {
    "MIS".to_string()
}

fn default_validity() -> String {
    "DAY".to_string()
}

/// Result of a successful order placement.
#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub local_order_id: i64,
    pub provider_order_id: String,
}

pub struct BrokerGateway {
    provider: Arc<dyn ProviderClient>,
    sessions: SessionMaterializer,
    orders: Arc<OrderStore>,
}

impl BrokerGateway {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        sessions: SessionMaterializer,
        orders: Arc<OrderStore>,
    ) -> Self {
        Self {
            provider,
            sessions,
            orders,
        }
    }

    /// Maps provider-level failures into the gateway taxonomy.
    fn classify(user_id: i64, err: ProviderError) -> BrokerError {
        match err {
            ProviderError::Auth(msg) => {
                // Logged distinctly from NotConnected so a refresh flow
                // can be triggered on it
                warn!(user_id, message = %msg, "Provider rejected stored token");
                BrokerError::AuthExpired
            }
            ProviderError::Network(msg) => BrokerError::Unavailable(msg),
            ProviderError::Api(msg) => BrokerError::ProviderRejected(msg),
            ProviderError::Unexpected(msg) => BrokerError::Internal(msg),
        }
    }

    /// Performs one lightweight authenticated call to confirm the
    /// stored credentials are live, not merely present.
    pub async fn verify(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .profile(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn profile(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .profile(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn margins(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .margins(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn holdings(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .holdings(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn positions(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .positions(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn orders(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .orders(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn order_history(
        &self,
        user_id: i64,
        provider_order_id: &str,
    ) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .order_history(&session, provider_order_id)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn order_trades(
        &self,
        user_id: i64,
        provider_order_id: &str,
    ) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .order_trades(&session, provider_order_id)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn quote(&self, user_id: i64, instruments: &[String]) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .quote(&session, instruments)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn auction_instruments(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .auction_instruments(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn mf_orders(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .mf_orders(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn mf_holdings(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .mf_holdings(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn mf_sips(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .mf_sips(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    pub async fn mf_instruments(&self, user_id: i64) -> Result<Value, BrokerError> {
        let session = self.sessions.materialize(user_id)?;
        self.provider
            .mf_instruments(&session)
            .await
            .map_err(|e| Self::classify(user_id, e))
    }

    /// Places an order with the provider and mirrors it locally.
    ///
    /// The mirror row is inserted before the provider call and stamped
    /// with the provider order id on acknowledgement; a row that never
    /// receives one stays local-only and cannot be cancelled upstream.
    pub async fn place_order(
        &self,
        user_id: i64,
        request: &OrderRequest,
    ) -> Result<PlacedOrder, BrokerError> {
        let session = self.sessions.materialize(user_id)?;

        let (exchange, tradingsymbol) =
            request.instrument.split_once(':').ok_or_else(|| {
                BrokerError::ProviderRejected(format!(
                    "Invalid instrument '{}': expected EXCHANGE:TRADINGSYMBOL",
                    request.instrument
                ))
            })?;
        if exchange.is_empty() || tradingsymbol.is_empty() {
            return Err(BrokerError::ProviderRejected(format!(
                "Invalid instrument '{}': expected EXCHANGE:TRADINGSYMBOL",
                request.instrument
            )));
        }

        // Price is ambiguous for anything but a LIMIT order; drop it
        // even when the caller supplied one.
        let price = if request.order_type == "LIMIT" {
            request.price
        } else {
            None
        };

        let params = ProviderOrderParams {
            exchange: exchange.to_string(),
            tradingsymbol: tradingsymbol.to_string(),
            transaction_type: request.transaction_type.clone(),
            order_type: request.order_type.clone(),
            quantity: request.quantity,
            product: request.product.clone(),
            validity: request.validity.clone(),
            price,
        };

        let local_order_id = self
            .orders
            .insert(
                user_id,
                &request.instrument,
                &request.transaction_type,
                &request.order_type,
                request.quantity,
                price,
                &request.product,
                &request.validity,
            )
            .map_err(|e| BrokerError::Internal(format!("Failed to mirror order: {}", e)))?;

        let provider_order_id = self
            .provider
            .place_order(&session, &params)
            .await
            .map_err(|e| Self::classify(user_id, e))?;

        self.orders
            .mark_acknowledged(local_order_id, &provider_order_id)
            .map_err(|e| BrokerError::Internal(format!("Failed to record order id: {}", e)))?;

        info!(
            user_id,
            local_order_id,
            provider_order_id = %provider_order_id,
            "Order placed"
        );

        Ok(PlacedOrder {
            local_order_id,
            provider_order_id,
        })
    }

    /// Cancels a mirrored order via its provider-assigned id.
    ///
    /// The local database id is never sent to the provider. A row
    /// without a provider id fails with `OrderNotSynced` and leaves all
    /// stores untouched.
    pub async fn cancel_order(&self, user_id: i64, local_order_id: i64) -> Result<(), BrokerError> {
        let order = self
            .orders
            .get(user_id, local_order_id)
            .map_err(|e| BrokerError::Internal(format!("Order lookup failed: {}", e)))?
            .ok_or(BrokerError::OrderNotFound)?;

        let Some(provider_order_id) = order.provider_order_id else {
            return Err(BrokerError::OrderNotSynced);
        };

        let session = self.sessions.materialize(user_id)?;
        self.provider
            .cancel_order(&session, &provider_order_id)
            .await
            .map_err(|e| Self::classify(user_id, e))?;

        self.orders
            .mark_cancelled(local_order_id)
            .map_err(|e| BrokerError::Internal(format!("Failed to mark cancelled: {}", e)))?;

        info!(user_id, local_order_id, provider_order_id = %provider_order_id, "Order cancelled");

        Ok(())
    }
}
