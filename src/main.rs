use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tradelink::api::{create_broker_router, create_trading_router, BrokerAppState, TradingAppState};
use tradelink::broker::{run_login_sweeper, BrokerGateway, KiteClient, LoginBroker, SessionMaterializer};
use tradelink::config::load_config;
use tradelink::credentials::{CredentialStore, TokenCipher};
use tradelink::orders::OrderStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradelink=info".into()),
        )
        .init();

    info!("Tradelink starting...");

    let config_path =
        std::env::var("TRADELINK_CONFIG").unwrap_or_else(|_| "tradelink.toml".to_string());
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!(path = %config_path, "Configuration loaded");
            config
        }
        Err(e) => {
            info!(path = %config_path, error = %e, "No config file, using defaults");
            tradelink::config::TradelinkConfig::default()
        }
    };

    let encryption_secret = std::env::var("TRADELINK_ENCRYPTION_SECRET")
        .context("TRADELINK_ENCRYPTION_SECRET is required")?;
    let cipher = TokenCipher::new(&encryption_secret);

    let credentials = Arc::new(
        CredentialStore::open(&config.storage.db_path)
            .context("Failed to initialize credential store")?,
    );
    let orders = Arc::new(
        OrderStore::open(&config.storage.db_path).context("Failed to initialize order store")?,
    );
    info!(db_path = %config.storage.db_path, "Stores initialized");

    let provider = Arc::new(
        KiteClient::new(
            &config.provider.base_url,
            &config.provider.login_url,
            config.provider.timeout_seconds,
        )
        .context("Failed to build provider client")?,
    );

    let login = Arc::new(LoginBroker::new(
        &config.login,
        config.provider.clone(),
        provider.clone(),
        Arc::clone(&credentials),
        cipher.clone(),
    ));
    let sessions = SessionMaterializer::new(Arc::clone(&credentials), cipher.clone());
    let gateway = Arc::new(BrokerGateway::new(provider, sessions, orders));

    // Purge abandoned login attempts in the background
    tokio::spawn(run_login_sweeper(
        Arc::clone(&login),
        config.login.sweep_interval_seconds,
    ));

    let broker_router = create_broker_router(BrokerAppState {
        login,
        gateway: Arc::clone(&gateway),
        credentials,
        cipher,
        frontend_redirect_url: config.login.frontend_redirect_url.clone(),
    });
    let trading_router = create_trading_router(TradingAppState { gateway });

    let app = broker_router
        .merge(trading_router)
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Tradelink listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
