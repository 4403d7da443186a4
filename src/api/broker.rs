//! Broker connection endpoints.
//!
//! Covers the full credential lifecycle:
//! 1. GET /api/broker/login-url → frontend opens the provider login page
//! 2. Provider redirects to GET /api/broker/callback with a request
//!    token and our correlation `state`
//! 3. The login broker exchanges and stores encrypted credentials
//! 4. GET /api/broker/status verifies the connection live
//!
//! POST /api/broker/connect is the legacy manual path that accepts
//! already-obtained tokens directly.

use crate::auth::authenticate_user;
use crate::broker::{BrokerGateway, LoginBroker};
use crate::credentials::{CredentialStore, TokenCipher};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::AppError;

/// Shared application state for the broker router
#[derive(Clone)]
pub struct BrokerAppState {
    pub login: Arc<LoginBroker>,
    pub gateway: Arc<BrokerGateway>,
    pub credentials: Arc<CredentialStore>,
    pub cipher: TokenCipher,
    /// Where the OAuth callback sends the browser afterwards
    pub frontend_redirect_url: String,
}

#[derive(Serialize)]
pub struct LoginUrlResponse {
    pub success: bool,
    pub login_url: String,
}

/// Provider callback query parameters
#[derive(Deserialize)]
pub struct CallbackParams {
    request_token: Option<String>,
    state: Option<String>,
}

/// Request body for POST /api/broker/connect
#[derive(Deserialize)]
pub struct ConnectRequest {
    pub api_key: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
pub struct ConnectResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub message: String,
}

/// Create broker connection router
pub fn create_broker_router(state: BrokerAppState) -> Router {
    Router::new()
        .route("/api/broker/login-url", get(login_url))
        .route("/api/broker/callback", get(callback))
        .route("/api/broker/connect", post(connect))
        .route("/api/broker/status", get(status))
        .with_state(Arc::new(state))
}

/// GET /api/broker/login-url
///
/// Starts a login attempt and returns the provider login URL with the
/// correlation token embedded.
async fn login_url(
    State(state): State<Arc<BrokerAppState>>,
    headers: HeaderMap,
) -> Result<Json<LoginUrlResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;

    let (_token, login_url) = state.login.begin_login(user_id)?;

    Ok(Json(LoginUrlResponse {
        success: true,
        login_url,
    }))
}

/// GET /api/broker/callback?request_token=..&state=..
///
/// Handles the provider redirect. This lands in a browser, so the
/// outcome is always a redirect back to the frontend with a success or
/// error indicator — never a raw JSON error.
async fn callback(
    State(state): State<Arc<BrokerAppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let frontend = &state.frontend_redirect_url;

    let Some(request_token) = params.request_token.filter(|t| !t.is_empty()) else {
        warn!("Callback missing request_token");
        return redirect_with_error(frontend, "Missing request token");
    };
    let Some(correlation_token) = params.state.filter(|s| !s.is_empty()) else {
        warn!("Callback missing state parameter");
        return redirect_with_error(frontend, "Missing state parameter");
    };

    debug!("Broker callback received, resolving correlation token");

    match state
        .login
        .resolve_callback(&correlation_token, &request_token)
        .await
    {
        Ok(user_id) => {
            info!(user_id, "Broker connected via login flow");
            Redirect::temporary(&format!("{}?broker_success=true", frontend))
        }
        Err(e) => {
            warn!(error = %e, "Broker callback failed");
            redirect_with_error(frontend, &e.to_string())
        }
    }
}

fn redirect_with_error(frontend: &str, message: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}?broker_error={}",
        frontend,
        urlencoding::encode(message)
    ))
}

/// POST /api/broker/connect
///
/// Legacy manual path: the user supplies tokens obtained elsewhere and
/// we store them encrypted, bypassing the login flow.
async fn connect(
    State(state): State<Arc<BrokerAppState>>,
    headers: HeaderMap,
    Json(body): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;

    if body.api_key.is_empty() || body.access_token.is_empty() {
        return Err(AppError::BadRequest(
            "api_key and access_token are required".to_string(),
        ));
    }

    let api_key_cipher = state
        .cipher
        .encrypt(&body.api_key)
        .map_err(|e| AppError::ServerError(format!("Failed to encrypt credentials: {}", e)))?;
    let access_token_cipher = state
        .cipher
        .encrypt(&body.access_token)
        .map_err(|e| AppError::ServerError(format!("Failed to encrypt credentials: {}", e)))?;
    let refresh_token_cipher = match body.refresh_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Some(state.cipher.encrypt(token).map_err(|e| {
            AppError::ServerError(format!("Failed to encrypt credentials: {}", e))
        })?),
        None => None,
    };

    state
        .credentials
        .upsert(
            user_id,
            &api_key_cipher,
            Some(&access_token_cipher),
            refresh_token_cipher.as_deref(),
            None,
        )
        .map_err(|e| {
            warn!(user_id, error = %e, "Failed to store credentials");
            AppError::ServerError("Failed to store credentials".to_string())
        })?;

    info!(user_id, "Broker account connected manually");

    Ok(Json(ConnectResponse {
        message: "Broker account connected successfully".to_string(),
    }))
}

/// GET /api/broker/status
///
/// Reports `connected: true` only after a live verification call to the
/// provider succeeds — a stored record alone is not a connection.
async fn status(
    State(state): State<Arc<BrokerAppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    let user_id = authenticate_user(&headers)?;

    match state.gateway.verify(user_id).await {
        Ok(_) => Ok(Json(StatusResponse {
            connected: true,
            message: "Connected and verified".to_string(),
        })),
        Err(e) => {
            debug!(user_id, error = %e, "Broker status check failed");
            Ok(Json(StatusResponse {
                connected: false,
                message: e.to_string(),
            }))
        }
    }
}
