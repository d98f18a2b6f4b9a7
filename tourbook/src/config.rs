//! Configuration management using Figment
//!
//! Configuration is layered with the following precedence (highest to lowest):
//! 1. Environment variables (prefix `TOURBOOK_`, nesting with `__`, e.g.
//!    `TOURBOOK_JWT__SECRET`)
//! 2. Current working directory: `./tourbook.toml`
//! 3. XDG config directory: `~/.config/tourbook/tourbook.toml`
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::QueryLimits;

const CONFIG_FILE: &str = "tourbook.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Token signing configuration
    pub jwt: JwtConfig,

    /// Rate limiting on `/api`
    pub rate_limit: RateLimitConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// List query policy
    #[serde(default)]
    pub query: QueryConfig,

    /// MongoDB connection; the in-memory store is used when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Outgoing mail
    #[serde(default)]
    pub email: EmailConfig,

    /// Hosted checkout
    #[serde(default)]
    pub payments: PaymentsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (development, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Public base URL used in emails and checkout redirects
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl ServiceConfig {
    /// Whether the service runs in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HMAC secret
    pub secret: String,

    /// Token lifetime in days
    #[serde(default = "default_jwt_expires_in_days")]
    pub expires_in_days: i64,

    /// Lifetime of the `jwt` cookie in days
    #[serde(default = "default_jwt_expires_in_days")]
    pub cookie_expires_in_days: i64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per client within one window
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Disable the limiter entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Key clients by the first `X-Forwarded-For` hop; only safe behind a proxy
    #[serde(default)]
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Window as a [`Duration`]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request body size limit in KiB
    #[serde(default = "default_body_limit_kb")]
    pub body_limit_kb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS mode: `permissive`, `restrictive` or `disabled`
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,

    /// Generate and propagate `x-request-id`
    #[serde(default = "default_true")]
    pub request_id: bool,

    /// Add security response headers
    #[serde(default = "default_true")]
    pub security_headers: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_kb: default_body_limit_kb(),
            catch_panic: true,
            compression: true,
            cors_mode: default_cors_mode(),
            request_id: true,
            security_headers: true,
        }
    }
}

/// List query policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Clamp for caller-supplied `limit`; unbounded when absent
    #[serde(default)]
    pub max_limit: Option<u64>,
}

impl QueryConfig {
    /// Limits handed to the query builder
    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            max_limit: self.max_limit,
            ..QueryLimits::default()
        }
    }
}

/// MongoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; `<PASSWORD>` is replaced with `password`
    pub url: String,

    /// Substituted for `<PASSWORD>` in `url`
    #[serde(default)]
    pub password: Option<String>,

    /// Database name
    #[serde(default = "default_database_name")]
    pub name: String,
}

impl DatabaseConfig {
    /// Connection string with the password filled in
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => self.url.replace("<PASSWORD>", password),
            None => self.url.clone(),
        }
    }
}

/// Outgoing mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address
    #[serde(default = "default_email_from")]
    pub from: String,

    /// SMTP relay host; mail is only logged when absent
    #[serde(default)]
    pub host: Option<String>,

    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// SMTP user name
    #[serde(default)]
    pub username: Option<String>,

    /// SMTP password
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: default_email_from(),
            host: None,
            port: default_smtp_port(),
            username: None,
            password: None,
        }
    }
}

/// Hosted checkout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Secret API key; checkout is disabled when absent
    #[serde(default)]
    pub secret_key: Option<String>,

    /// API base URL
    #[serde(default = "default_payments_api")]
    pub api_base: String,

    /// Currency for line items
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            api_base: default_payments_api(),
            currency: default_currency(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_public_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_jwt_expires_in_days() -> i64 {
    90
}

fn default_rate_limit_max() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_body_limit_kb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_database_name() -> String {
    "tourbook".to_string()
}

fn default_email_from() -> String {
    "tourbook <hello@tourbook.io>".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_payments_api() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        for path in Self::find_config_paths().iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        Ok(figment.merge(Env::prefixed("TOURBOOK_").split("__")).extract()?)
    }

    /// Load configuration from a specific file, still honouring the environment
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TOURBOOK_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Config file candidates, highest priority first
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tourbook");
        if let Some(path) = xdg_dirs.find_config_file(CONFIG_FILE) {
            paths.push(path);
        }
        paths
    }

    /// MongoDB connection string, if a database is configured
    pub fn database_url(&self) -> Option<String> {
        self.database.as_ref().map(DatabaseConfig::connection_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "tourbook".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
                public_url: default_public_url(),
            },
            jwt: JwtConfig {
                secret: "change-me-to-a-long-random-secret-of-32-chars".to_string(),
                expires_in_days: default_jwt_expires_in_days(),
                cookie_expires_in_days: default_jwt_expires_in_days(),
            },
            rate_limit: RateLimitConfig {
                max_requests: default_rate_limit_max(),
                window_secs: default_window_secs(),
                enabled: true,
                trust_proxy: false,
            },
            middleware: MiddlewareConfig::default(),
            query: QueryConfig::default(),
            database: None,
            email: EmailConfig::default(),
            payments: PaymentsConfig::default(),
        }
    }
}
