// Integration tests for the broker and trading HTTP surface

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::StubProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tradelink::api::{create_broker_router, create_trading_router, BrokerAppState, TradingAppState};
use tradelink::broker::{BrokerGateway, LoginBroker, ProviderClient, ProviderError, SessionMaterializer};
use tradelink::config::{LoginConfig, ProviderConfig};
use tradelink::credentials::{CredentialStore, TokenCipher};
use tradelink::orders::OrderStore;

struct TestApp {
    app: Router,
    provider: Arc<StubProvider>,
    credentials: Arc<CredentialStore>,
    orders: Arc<OrderStore>,
    cipher: TokenCipher,
}

fn create_test_app(provider_configured: bool) -> TestApp {
    let provider = Arc::new(StubProvider::default());
    let credentials = Arc::new(CredentialStore::open(":memory:").unwrap());
    let orders = Arc::new(OrderStore::open(":memory:").unwrap());
    let cipher = TokenCipher::new("api-test-secret");

    let provider_config = if provider_configured {
        ProviderConfig {
            api_key: "app-key".to_string(),
            api_secret: "app-secret".to_string(),
            ..ProviderConfig::default()
        }
    } else {
        ProviderConfig::default()
    };

    let login = Arc::new(LoginBroker::new(
        &LoginConfig::default(),
        provider_config,
        Arc::clone(&provider) as Arc<dyn ProviderClient>,
        Arc::clone(&credentials),
        cipher.clone(),
    ));
    let sessions = SessionMaterializer::new(Arc::clone(&credentials), cipher.clone());
    let gateway = Arc::new(BrokerGateway::new(
        Arc::clone(&provider) as Arc<dyn ProviderClient>,
        sessions,
        Arc::clone(&orders),
    ));

    let app = create_broker_router(BrokerAppState {
        login,
        gateway: Arc::clone(&gateway),
        credentials: Arc::clone(&credentials),
        cipher: cipher.clone(),
        frontend_redirect_url: "http://localhost:3000/broker/connect".to_string(),
    })
    .merge(create_trading_router(TradingAppState { gateway }));

    TestApp {
        app,
        provider,
        credentials,
        orders,
        cipher,
    }
}

fn get(uri: &str, user_id: Option<i64>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("authorization", format!("Bearer {}", id));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, user_id: i64, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", user_id))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Connect a user through the manual path helper
fn connect_user(test: &TestApp, user_id: i64) {
    let api_key = test.cipher.encrypt("user-api-key").unwrap();
    let token = test.cipher.encrypt("user-access-token").unwrap();
    test.credentials
        .upsert(user_id, &api_key, Some(&token), None, None)
        .unwrap();
}

#[tokio::test]
async fn test_login_url_requires_auth() {
    let test = create_test_app(true);

    let response = test
        .app
        .oneshot(get("/api/broker/login-url", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_url_unconfigured_provider() {
    let test = create_test_app(false);

    let response = test
        .app
        .oneshot(get("/api/broker/login-url", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn test_login_url_success() {
    let test = create_test_app(true);

    let response = test
        .app
        .oneshot(get("/api/broker/login-url", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let login_url = body["login_url"].as_str().unwrap();
    assert!(login_url.contains("api_key=app-key"));
    assert!(login_url.contains("state="));
}

#[tokio::test]
async fn test_callback_invalid_state_redirects_with_error() {
    let test = create_test_app(true);

    let response = test
        .app
        .oneshot(get(
            "/api/broker/callback?request_token=abc&state=never-issued",
            None,
        ))
        .await
        .unwrap();

    // Browser-facing endpoint: always a redirect, never raw JSON
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("http://localhost:3000/broker/connect"));
    assert!(location.contains("broker_error="));
}

#[tokio::test]
async fn test_callback_missing_params_redirects_with_error() {
    let test = create_test_app(true);

    let response = test
        .app
        .oneshot(get("/api/broker/callback?request_token=abc", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.contains("broker_error="));
}

#[tokio::test]
async fn test_full_login_flow_over_http() {
    let test = create_test_app(true);

    // Start login
    let response = test
        .app
        .clone()
        .oneshot(get("/api/broker/login-url", Some(42)))
        .await
        .unwrap();
    let body = body_json(response).await;
    let login_url = body["login_url"].as_str().unwrap().to_string();
    let state = login_url.split("state=").nth(1).unwrap().to_string();

    // Provider redirects back
    let response = test
        .app
        .clone()
        .oneshot(get(
            &format!("/api/broker/callback?request_token=rt123&state={}", state),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.contains("broker_success=true"));

    // The user is now connected end to end
    let response = test
        .app
        .clone()
        .oneshot(get("/api/trading/profile", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Replaying the same callback fails (single-use correlation token)
    let response = test
        .app
        .oneshot(get(
            &format!("/api/broker/callback?request_token=rt123&state={}", state),
            None,
        ))
        .await
        .unwrap();
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.contains("broker_error="));
}

#[tokio::test]
async fn test_manual_connect_and_status() {
    let test = create_test_app(true);

    let response = test
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/broker/connect",
            42,
            json!({"api_key": "manual-key", "access_token": "manual-token"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Stored encrypted, not plaintext
    let record = test.credentials.get(42).unwrap().unwrap();
    assert_ne!(record.api_key, "manual-key");
    assert_eq!(test.cipher.decrypt(&record.api_key).unwrap(), "manual-key");

    let response = test
        .app
        .oneshot(get("/api/broker/status", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["connected"], true);
}

#[tokio::test]
async fn test_status_not_connected() {
    let test = create_test_app(true);

    let response = test
        .app
        .oneshot(get("/api/broker/status", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["connected"], false);
}

#[tokio::test]
async fn test_status_reports_rejected_token() {
    let test = create_test_app(true);
    connect_user(&test, 42);
    test.provider
        .fail_next(ProviderError::Auth("token expired".to_string()));

    let response = test
        .app
        .oneshot(get("/api/broker/status", Some(42)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["connected"], false);
    assert!(body["message"].as_str().unwrap().contains("expired"));
}

#[tokio::test]
async fn test_trading_requires_connection() {
    let test = create_test_app(true);

    let response = test
        .app
        .oneshot(get("/api/trading/positions", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("connect"));
}

#[tokio::test]
async fn test_place_order_created() {
    let test = create_test_app(true);
    connect_user(&test, 42);

    let response = test
        .app
        .oneshot(json_request(
            "POST",
            "/api/trading/orders",
            42,
            json!({
                "instrument": "NSE:INFY",
                "transaction_type": "BUY",
                "order_type": "LIMIT",
                "quantity": 10,
                "price": 150.5
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["provider_order_id"], "prov-order-1");

    let sent = test.provider.last_order.lock().unwrap().clone().unwrap();
    assert_eq!(sent.price, Some(150.5));
}

#[tokio::test]
async fn test_market_order_price_omitted_over_http() {
    let test = create_test_app(true);
    connect_user(&test, 42);

    let response = test
        .app
        .oneshot(json_request(
            "POST",
            "/api/trading/orders",
            42,
            json!({
                "instrument": "NSE:INFY",
                "transaction_type": "BUY",
                "order_type": "MARKET",
                "quantity": 10,
                "price": 150.5
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let sent = test.provider.last_order.lock().unwrap().clone().unwrap();
    assert_eq!(sent.order_type, "MARKET");
    assert!(sent.price.is_none());
}

#[tokio::test]
async fn test_cancel_unknown_order_is_404() {
    let test = create_test_app(true);
    connect_user(&test, 42);

    let response = test
        .app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/trading/orders/9999")
                .header("authorization", "Bearer 42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_unsynced_order_is_400() {
    let test = create_test_app(true);
    connect_user(&test, 42);

    // Mirror row without a provider order id
    let local_id = test
        .orders
        .insert(42, "NSE:INFY", "BUY", "MARKET", 1, None, "MIS", "DAY")
        .unwrap();

    let response = test
        .app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/api/trading/orders/{}", local_id))
                .header("authorization", "Bearer 42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("cannot be cancelled"));
    assert!(test.provider.cancelled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_quote_requires_instruments() {
    let test = create_test_app(true);
    connect_user(&test, 42);

    let response = test
        .app
        .clone()
        .oneshot(get("/api/trading/quote?instruments=", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test
        .app
        .oneshot(get(
            "/api/trading/quote?instruments=NSE:INFY,NSE:TCS",
            Some(42),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["NSE:INFY"].is_object());
    assert!(body["data"]["NSE:TCS"].is_object());
}

#[tokio::test]
async fn test_provider_unavailable_surfaces_as_400() {
    let test = create_test_app(true);
    connect_user(&test, 42);
    test.provider
        .fail_next(ProviderError::Network("connection refused".to_string()));

    let response = test
        .app
        .oneshot(get("/api/trading/holdings", Some(42)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_mf_endpoints_proxy() {
    let test = create_test_app(true);
    connect_user(&test, 42);

    for uri in [
        "/api/trading/mf/orders",
        "/api/trading/mf/holdings",
        "/api/trading/mf/sips",
        "/api/trading/mf/instruments",
    ] {
        let response = test
            .app
            .clone()
            .oneshot(get(uri, Some(42)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "endpoint {}", uri);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
    }
}
