//! Kite Connect wire client.
//!
//! Implements [`ProviderClient`] against the Kite Connect v3 REST API.
//! All responses arrive in the provider envelope
//! `{"status": "success", "data": ...}` /
//! `{"status": "error", "message": ..., "error_type": ...}`; this module
//! unwraps the envelope and classifies failures so nothing above it
//! needs to know the wire format.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use super::provider::{ProviderClient, ProviderError, ProviderOrderParams, TokenBundle};
use super::session::LiveSession;

const KITE_VERSION_HEADER: &str = "X-Kite-Version";
const KITE_VERSION: &str = "3";

pub struct KiteClient {
    http: reqwest::Client,
    base_url: String,
    login_base_url: String,
}

impl KiteClient {
    pub fn new(base_url: &str, login_base_url: &str, timeout_seconds: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            login_base_url: login_base_url.to_string(),
        })
    }

    fn authorization(session: &LiveSession) -> String {
        format!("token {}:{}", session.api_key, session.access_token)
    }

    fn classify_transport(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() || e.is_connect() {
            ProviderError::Network(e.to_string())
        } else {
            ProviderError::Unexpected(e.to_string())
        }
    }

    /// Unwraps the provider envelope, classifying error responses.
    fn unwrap_envelope(status: StatusCode, body: Value) -> Result<Value, ProviderError> {
        if body["status"] == "success" {
            return Ok(body["data"].clone());
        }

        let message = body["message"]
            .as_str()
            .unwrap_or("Unknown provider error")
            .to_string();
        let error_type = body["error_type"].as_str().unwrap_or("");

        if status == StatusCode::FORBIDDEN
            || status == StatusCode::UNAUTHORIZED
            || error_type == "TokenException"
        {
            return Err(ProviderError::Auth(message));
        }
        if error_type == "NetworkException" {
            return Err(ProviderError::Network(message));
        }
        Err(ProviderError::Api(message))
    }

    async fn get(
        &self,
        session: &LiveSession,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ProviderError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(KITE_VERSION_HEADER, KITE_VERSION)
            .header("Authorization", Self::authorization(session))
            .query(query)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::classify_transport)?;

        // A few endpoints (instrument dumps) respond with CSV, not the
        // JSON envelope.
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Self::unwrap_envelope(status, body),
            Err(_) if status.is_success() => Ok(Value::String(text)),
            Err(e) => Err(ProviderError::Unexpected(format!(
                "Malformed provider response: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl ProviderClient for KiteClient {
    fn login_url(&self, api_key: &str, state: &str) -> String {
        format!(
            "{}?v={}&api_key={}&state={}",
            self.login_base_url,
            KITE_VERSION,
            urlencoding::encode(api_key),
            urlencoding::encode(state)
        )
    }

    async fn exchange_request_token(
        &self,
        api_key: &str,
        api_secret: &str,
        request_token: &str,
    ) -> Result<TokenBundle, ProviderError> {
        // checksum = sha256(api_key + request_token + api_secret)
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        hasher.update(request_token.as_bytes());
        hasher.update(api_secret.as_bytes());
        let checksum = hex::encode(hasher.finalize());

        let mut form = HashMap::new();
        form.insert("api_key", api_key);
        form.insert("request_token", request_token);
        form.insert("checksum", checksum.as_str());

        let response = self
            .http
            .post(format!("{}/session/token", self.base_url))
            .header(KITE_VERSION_HEADER, KITE_VERSION)
            .form(&form)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Malformed token response: {}", e)))?;

        let data = Self::unwrap_envelope(status, body)?;

        let access_token = data["access_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ProviderError::Unexpected("Token response missing access_token".to_string())
            })?
            .to_string();
        let refresh_token = data["refresh_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string());

        Ok(TokenBundle {
            access_token,
            refresh_token,
        })
    }

    async fn profile(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/user/profile", &[]).await
    }

    async fn margins(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/user/margins", &[]).await
    }

    async fn holdings(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/portfolio/holdings", &[]).await
    }

    async fn positions(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/portfolio/positions", &[]).await
    }

    async fn orders(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/orders", &[]).await
    }

    async fn order_history(
        &self,
        session: &LiveSession,
        order_id: &str,
    ) -> Result<Value, ProviderError> {
        self.get(session, &format!("/orders/{}", order_id), &[])
            .await
    }

    async fn order_trades(
        &self,
        session: &LiveSession,
        order_id: &str,
    ) -> Result<Value, ProviderError> {
        self.get(session, &format!("/orders/{}/trades", order_id), &[])
            .await
    }

    async fn quote(
        &self,
        session: &LiveSession,
        instruments: &[String],
    ) -> Result<Value, ProviderError> {
        let query: Vec<(&str, &str)> = instruments.iter().map(|i| ("i", i.as_str())).collect();
        self.get(session, "/quote", &query).await
    }

    async fn auction_instruments(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/portfolio/holdings/auctions", &[]).await
    }

    async fn place_order(
        &self,
        session: &LiveSession,
        params: &ProviderOrderParams,
    ) -> Result<String, ProviderError> {
        let quantity = params.quantity.to_string();
        let mut form: Vec<(&str, String)> = vec![
            ("exchange", params.exchange.clone()),
            ("tradingsymbol", params.tradingsymbol.clone()),
            ("transaction_type", params.transaction_type.clone()),
            ("order_type", params.order_type.clone()),
            ("quantity", quantity),
            ("product", params.product.clone()),
            ("validity", params.validity.clone()),
        ];
        if let Some(price) = params.price {
            form.push(("price", price.to_string()));
        }

        let response = self
            .http
            .post(format!("{}/orders/regular", self.base_url))
            .header(KITE_VERSION_HEADER, KITE_VERSION)
            .header("Authorization", Self::authorization(session))
            .form(&form)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Malformed order response: {}", e)))?;

        let data = Self::unwrap_envelope(status, body)?;
        data["order_id"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| {
                ProviderError::Unexpected("Order response missing order_id".to_string())
            })
    }

    async fn cancel_order(
        &self,
        session: &LiveSession,
        order_id: &str,
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .delete(format!("{}/orders/regular/{}", self.base_url, order_id))
            .header(KITE_VERSION_HEADER, KITE_VERSION)
            .header("Authorization", Self::authorization(session))
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Malformed cancel response: {}", e)))?;

        let data = Self::unwrap_envelope(status, body)?;
        data["order_id"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| {
                ProviderError::Unexpected("Cancel response missing order_id".to_string())
            })
    }

    async fn mf_orders(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/mf/orders", &[]).await
    }

    async fn mf_holdings(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/mf/holdings", &[]).await
    }

    async fn mf_sips(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/mf/sips", &[]).await
    }

    async fn mf_instruments(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.get(session, "/mf/instruments", &[]).await
    }
}
