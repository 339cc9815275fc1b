use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub mpesa: MpesaConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origin allowed by CORS. Any origin when unset.
    pub cors_origin: Option<String>,
    /// Product images are written here and served under `/uploads`.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub issuer: String,
}

/// Safaricom Daraja (M-Pesa Express) settings.
#[derive(Debug, Deserialize, Clone)]
pub struct MpesaConfig {
    #[serde(default)]
    pub enabled: bool,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub shortcode: Option<String>,
    pub passkey: Option<String>,
    pub callback_url: Option<String>,
    #[serde(default = "default_oauth_url")]
    pub oauth_url: String,
    #[serde(default = "default_stk_push_url")]
    pub stk_push_url: String,
    #[serde(default = "default_stk_query_url")]
    pub stk_query_url: String,
    #[serde(default = "default_account_reference")]
    pub account_reference: String,
    #[serde(default = "default_transaction_desc")]
    pub transaction_desc: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Shared secret expected as `?token=` on the callback URL.
    pub callback_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentsConfig {
    /// Only allow Success -> Cleared when set.
    #[serde(default)]
    pub restrict_clear_to_success: bool,
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_oauth_url() -> String {
    "https://sandbox.safaricom.co.ke/oauth/v1/generate?grant_type=client_credentials".to_string()
}

fn default_stk_push_url() -> String {
    "https://sandbox.safaricom.co.ke/mpesa/stkpush/v1/processrequest".to_string()
}

fn default_stk_query_url() -> String {
    "https://sandbox.safaricom.co.ke/mpesa/stkpushquery/v1/query".to_string()
}

fn default_account_reference() -> String {
    "PES E-Shop".to_string()
}

fn default_transaction_desc() -> String {
    "Online Order".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            consumer_key: None,
            consumer_secret: None,
            shortcode: None,
            passkey: None,
            callback_url: None,
            oauth_url: default_oauth_url(),
            stk_push_url: default_stk_push_url(),
            stk_query_url: default_stk_query_url(),
            account_reference: default_account_reference(),
            transaction_desc: default_transaction_desc(),
            timeout_secs: default_timeout_secs(),
            callback_token: None,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("database.url", "sqlite://duka.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_ttl_minutes", 60)?
            .set_default("auth.issuer", "duka")?
            .set_default("mpesa.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with DUKA__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("DUKA").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                cors_origin: None,
                uploads_dir: default_uploads_dir(),
            },
            database: DatabaseConfig {
                url: "sqlite://duka.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_ttl_minutes: 60,
                issuer: "duka".to_string(),
            },
            mpesa: MpesaConfig::default(),
            payments: PaymentsConfig::default(),
        }
    }
}
