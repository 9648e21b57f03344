use std::env;
use std::net::IpAddr;
use std::time::Duration;

use axum_extra::extract::cookie::SameSite;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::domain::rate_limit::models::RateLimitPolicy;
use crate::domain::session::models::SessionPolicy;
use crate::inbound::http::cookies::RefreshCookie;
use crate::inbound::http::router::RateLimits;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub stores: StoresConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoresConfig {
    /// Deadline for every store round trip
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_ttl_minutes")]
    pub access_token_ttl_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    #[serde(default = "default_max_per_user")]
    pub max_per_user: usize,
    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: i64,
    /// How long expired or revoked records are kept before deletion
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub fail_open: bool,
    /// Count all route classes in one namespace
    #[serde(default)]
    pub shared_counters: bool,
    #[serde(default = "default_login_limits")]
    pub login: LimitConfig,
    #[serde(default = "default_refresh_limits")]
    pub refresh: LimitConfig,
    /// Peers whose `X-Forwarded-For` is trusted; empty keys on the socket address
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default = "default_same_site")]
    pub same_site: String,
}

// Keep the signing secret out of logs.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .finish()
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_access_token_ttl_minutes() -> i64 {
    15
}

fn default_max_per_user() -> usize {
    10
}

fn default_refresh_token_ttl_days() -> i64 {
    30
}

fn default_retention_days() -> i64 {
    7
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_login_limits() -> LimitConfig {
    LimitConfig {
        per_minute: 5,
        per_hour: 20,
    }
}

fn default_refresh_limits() -> LimitConfig {
    LimitConfig {
        per_minute: 10,
        per_hour: 100,
    }
}

fn default_cookie_name() -> String {
    "refresh_token".to_string()
}

fn default_cookie_path() -> String {
    "/api/auth".to_string()
}

fn default_true() -> bool {
    true
}

fn default_same_site() -> String {
    "strict".to_string()
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_per_user: default_max_per_user(),
            refresh_token_ttl_days: default_refresh_token_ttl_days(),
            retention_days: default_retention_days(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            fail_open: false,
            shared_counters: false,
            login: default_login_limits(),
            refresh: default_refresh_limits(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            path: default_cookie_path(),
            secure: true,
            same_site: default_same_site(),
        }
    }
}

impl From<LimitConfig> for RateLimitPolicy {
    fn from(limits: LimitConfig) -> Self {
        RateLimitPolicy {
            per_minute: limits.per_minute,
            per_hour: limits.per_hour,
        }
    }
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JWT__SECRET, RATE_LIMIT__FAIL_OPEN, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    ///
    /// # Errors
    /// * `ConfigError` - Sources unreadable, or values out of range
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::default().separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject values the services cannot run with.
    ///
    /// # Errors
    /// * `ConfigError::Message` - First invalid value found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.jwt.access_token_ttl_minutes <= 0 {
            return Err(ConfigError::Message(
                "jwt.access_token_ttl_minutes must be positive".to_string(),
            ));
        }
        if self.sessions.max_per_user == 0 {
            return Err(ConfigError::Message(
                "sessions.max_per_user must be at least 1".to_string(),
            ));
        }
        if self.sessions.refresh_token_ttl_days <= 0 || self.sessions.retention_days < 0 {
            return Err(ConfigError::Message(
                "sessions lifetimes must not be negative".to_string(),
            ));
        }
        if self.sessions.cleanup_interval_secs == 0 {
            return Err(ConfigError::Message(
                "sessions.cleanup_interval_secs must be positive".to_string(),
            ));
        }
        self.cookie.same_site()?;

        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.stores.timeout_ms)
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.jwt.access_token_ttl_minutes)
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            max_sessions_per_user: self.sessions.max_per_user,
            refresh_token_ttl: chrono::Duration::days(self.sessions.refresh_token_ttl_days),
            // A marker must outlive every access token it could reject
            user_marker_ttl: self.access_token_ttl() + chrono::Duration::minutes(1),
        }
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            login: self.rate_limit.login.into(),
            refresh: self.rate_limit.refresh.into(),
        }
    }

    /// # Errors
    /// * `ConfigError::Message` - Unknown same-site value
    pub fn refresh_cookie(&self) -> Result<RefreshCookie, ConfigError> {
        Ok(RefreshCookie {
            name: self.cookie.name.clone(),
            path: self.cookie.path.clone(),
            secure: self.cookie.secure,
            same_site: self.cookie.same_site()?,
        })
    }
}

impl CookieConfig {
    /// # Errors
    /// * `ConfigError::Message` - Value is not `strict`, `lax` or `none`
    pub fn same_site(&self) -> Result<SameSite, ConfigError> {
        match self.same_site.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(ConfigError::Message(format!(
                "cookie.same_site must be strict, lax or none, got `{}`",
                other
            ))),
        }
    }
}
