// config.rs
use std::env;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub max_db_connections: u32,
    pub nats_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub currency: String,
    /// Shared secret the mobile-money provider sends in `X-Callback-Secret`.
    pub payment_callback_secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

impl AppConfig {
    /// Reads configuration from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AppConfig {
            database_url: optional("DATABASE_URL"),
            max_db_connections: parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: optional("NATS_URL"),
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("PORT", 8083)?,
            jwt_secret: optional("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            access_token_ttl_minutes: parsed("ACCESS_TOKEN_TTL_MINUTES", 15)?,
            refresh_token_ttl_days: parsed("REFRESH_TOKEN_TTL_DAYS", 7)?,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            cookie_secure: parsed("COOKIE_SECURE", true)?,
            currency: optional("CURRENCY").unwrap_or_else(|| "GHS".to_string()).to_uppercase(),
            payment_callback_secret: optional("PAYMENT_CALLBACK_SECRET"),
        })
    }

    /// Settings for tests and local experiments: in-memory store, cheap hashing.
    pub fn for_tests() -> Self {
        AppConfig {
            database_url: None,
            max_db_connections: 1,
            nats_url: None,
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            bcrypt_cost: 4,
            cookie_secure: false,
            currency: "GHS".to_string(),
            payment_callback_secret: None,
        }
    }

    pub fn bind_address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
