// HTTP API routers

pub mod broker;
pub mod trading;

pub use broker::{create_broker_router, BrokerAppState};
pub use trading::{create_trading_router, TradingAppState};

use crate::auth::TokenError;
use crate::broker::BrokerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Error response body shared by all routers
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

/// Application error types for the HTTP surface
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    ServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Unauthorized(format!("Invalid token: {}", e))
    }
}

impl From<BrokerError> for AppError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::ProviderNotConfigured => AppError::ServerError(e.to_string()),
            BrokerError::OrderNotFound => AppError::NotFound(e.to_string()),
            // Everything else is a structured 400 with a user-readable
            // message, never a crash
            _ => AppError::BadRequest(e.to_string()),
        }
    }
}
