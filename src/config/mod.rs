use serde::Deserialize;

/// Complete Tradelink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TradelinkConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// External brokerage provider configuration.
///
/// `api_key` and `api_secret` are the application credentials issued by
/// the provider. Both must be set for the OAuth login flow; the manual
/// `/connect` path works without them.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Per-call timeout for provider requests (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://api.kite.trade".to_string()
}

fn default_login_url() -> String {
    "https://kite.trade/connect/login".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: default_base_url(),
            login_url: default_login_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Login flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// How long a pending login correlation token remains redeemable (seconds)
    #[serde(default = "default_correlation_ttl")]
    pub correlation_ttl_seconds: i64,
    /// Sweep interval for abandoned login attempts (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// How long exchanged access tokens are considered valid (hours).
    /// The provider does not report its own expiry.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Frontend URL the OAuth callback redirects back to
    #[serde(default = "default_frontend_redirect")]
    pub frontend_redirect_url: String,
}

fn default_correlation_ttl() -> i64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_frontend_redirect() -> String {
    "http://localhost:3000/broker/connect".to_string()
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            correlation_ttl_seconds: default_correlation_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
            token_ttl_hours: default_token_ttl_hours(),
            frontend_redirect_url: default_frontend_redirect(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "tradelink.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for TradelinkConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            login: LoginConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<TradelinkConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: TradelinkConfig = toml::from_str(&contents)?;
    Ok(config)
}
