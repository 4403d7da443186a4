// Shared test double for the provider capability

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use tradelink::broker::{LiveSession, ProviderClient, ProviderError, ProviderOrderParams, TokenBundle};

/// In-memory provider stub.
///
/// Succeeds by default; `fail_next` injects one failure into the next
/// authenticated call. Records the last order params and every
/// cancelled provider order id.
#[derive(Default)]
pub struct StubProvider {
    pub last_order: Mutex<Option<ProviderOrderParams>>,
    pub cancelled: Mutex<Vec<String>>,
    fail_with: Mutex<Option<ProviderError>>,
}

impl StubProvider {
    pub fn fail_next(&self, err: ProviderError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    fn take_failure(&self) -> Result<(), ProviderError> {
        match self.fail_with.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProviderClient for StubProvider {
    fn login_url(&self, api_key: &str, state: &str) -> String {
        format!(
            "https://broker.test/login?v=3&api_key={}&state={}",
            api_key, state
        )
    }

    async fn exchange_request_token(
        &self,
        _api_key: &str,
        _api_secret: &str,
        request_token: &str,
    ) -> Result<TokenBundle, ProviderError> {
        if request_token == "expired" {
            return Err(ProviderError::Auth("Request token expired".to_string()));
        }
        Ok(TokenBundle {
            access_token: format!("access-for-{}", request_token),
            refresh_token: None,
        })
    }

    async fn profile(&self, session: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!({"user_id": format!("U{}", session.user_id), "user_name": "Test User"}))
    }

    async fn margins(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!({"equity": {"available": {"cash": 10000.0}}}))
    }

    async fn holdings(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }

    async fn positions(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!({"net": [], "day": []}))
    }

    async fn orders(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }

    async fn order_history(&self, _: &LiveSession, id: &str) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([{"order_id": id, "status": "COMPLETE"}]))
    }

    async fn order_trades(&self, _: &LiveSession, _: &str) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }

    async fn quote(&self, _: &LiveSession, instruments: &[String]) -> Result<Value, ProviderError> {
        self.take_failure()?;
        let mut quotes = serde_json::Map::new();
        for instrument in instruments {
            quotes.insert(instrument.clone(), json!({"last_price": 100.0}));
        }
        Ok(Value::Object(quotes))
    }

    async fn auction_instruments(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }

    async fn place_order(
        &self,
        _: &LiveSession,
        params: &ProviderOrderParams,
    ) -> Result<String, ProviderError> {
        self.take_failure()?;
        *self.last_order.lock().unwrap() = Some(params.clone());
        Ok("prov-order-1".to_string())
    }

    async fn cancel_order(&self, _: &LiveSession, order_id: &str) -> Result<String, ProviderError> {
        self.take_failure()?;
        self.cancelled.lock().unwrap().push(order_id.to_string());
        Ok(order_id.to_string())
    }

    async fn mf_orders(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }

    async fn mf_holdings(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }

    async fn mf_sips(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }

    async fn mf_instruments(&self, _: &LiveSession) -> Result<Value, ProviderError> {
        self.take_failure()?;
        Ok(json!([]))
    }
}
