//! Proxied trading and market-data endpoints.
//!
//! Thin handlers: identify the user, delegate to the gateway, map the
//! error taxonomy onto status codes. All provider data passes through
//! unshaped.

use crate::auth::authenticate_user;
use crate::broker::{BrokerGateway, OrderRequest};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::AppError;

/// Shared application state for the trading router
#[derive(Clone)]
pub struct TradingAppState {
    pub gateway: Arc<BrokerGateway>,
}

/// Standard data envelope
#[derive(Serialize)]
pub struct DataResponse {
    pub success: bool,
    pub data: Value,
}

impl DataResponse {
    fn new(data: Value) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Deserialize)]
pub struct QuoteParams {
    /// Comma-separated compound instrument identifiers
    instruments: String,
}

#[derive(Serialize)]
pub struct PlaceOrderResponse {
    pub success: bool,
    pub local_order_id: i64,
    pub provider_order_id: String,
}

#[derive(Serialize)]
pub struct CancelOrderResponse {
    pub success: bool,
    pub message: String,
}

/// Create trading proxy router
pub fn create_trading_router(state: TradingAppState) -> Router {
    Router::new()
        .route("/api/trading/profile", get(profile))
        .route("/api/trading/margins", get(margins))
        .route("/api/trading/holdings", get(holdings))
        .route("/api/trading/positions", get(positions))
        .route("/api/trading/quote", get(quote))
        .route("/api/trading/auction-instruments", get(auction_instruments))
        .route("/api/trading/orders", get(orders).post(place_order))
        .route("/api/trading/orders/:order_id", delete(cancel_order))
        .route("/api/trading/orders/:order_id/history", get(order_history))
        .route("/api/trading/orders/:order_id/trades", get(order_trades))
        .route("/api/trading/mf/orders", get(mf_orders))
        .route("/api/trading/mf/holdings", get(mf_holdings))
        .route("/api/trading/mf/sips", get(mf_sips))
        .route("/api/trading/mf/instruments", get(mf_instruments))
        .with_state(Arc::new(state))
}

async fn profile(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.profile(user_id).await?))
}

async fn margins(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.margins(user_id).await?))
}

async fn holdings(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.holdings(user_id).await?))
}

async fn positions(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.positions(user_id).await?))
}

async fn quote(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
    Query(params): Query<QuoteParams>,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;

    let instruments: Vec<String> = params
        .instruments
        .split(',')
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    if instruments.is_empty() {
        return Err(AppError::BadRequest(
            "No instruments provided".to_string(),
        ));
    }

    Ok(DataResponse::new(
        state.gateway.quote(user_id, &instruments).await?,
    ))
}

async fn auction_instruments(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(
        state.gateway.auction_instruments(user_id).await?,
    ))
}

async fn orders(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.orders(user_id).await?))
}

async fn order_history(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(
        state.gateway.order_history(user_id, &order_id).await?,
    ))
}

async fn order_trades(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(
        state.gateway.order_trades(user_id, &order_id).await?,
    ))
}

/// POST /api/trading/orders — place an order (201 on success)
async fn place_order(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), AppError> {
    let user_id = authenticate_user(&headers)?;

    debug!(
        user_id,
        instrument = %request.instrument,
        order_type = %request.order_type,
        "Placing order"
    );

    let placed = state.gateway.place_order(user_id, &request).await?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            success: true,
            local_order_id: placed.local_order_id,
            provider_order_id: placed.provider_order_id,
        }),
    ))
}

/// DELETE /api/trading/orders/:order_id — cancel by local order id.
///
/// 404 when the local order is unknown; 400 when it exists but was
/// never acknowledged by the provider.
async fn cancel_order(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
) -> Result<Json<CancelOrderResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;

    state.gateway.cancel_order(user_id, order_id).await?;

    Ok(Json(CancelOrderResponse {
        success: true,
        message: "Order cancelled".to_string(),
    }))
}

async fn mf_orders(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.mf_orders(user_id).await?))
}

async fn mf_holdings(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.mf_holdings(user_id).await?))
}

async fn mf_sips(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(state.gateway.mf_sips(user_id).await?))
}

async fn mf_instruments(
    State(state): State<Arc<TradingAppState>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;
    Ok(DataResponse::new(
        state.gateway.mf_instruments(user_id).await?,
    ))
}
