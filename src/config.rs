use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::fmt;
use thiserror::Error;

/// HS256 keys shorter than the digest size are rejected.
pub const MIN_SECRET_KEY_BYTES: usize = 32;

const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 60 * 24;
const DEFAULT_REFRESH_TOKEN_MINUTES: i64 = 60 * 24 * 7;
const DEFAULT_AUTH_REQUESTS_PER_MINUTE: u32 = 5;
/// Ten years. Longer lifetimes overflow the token expiry timestamp.
pub const MAX_TOKEN_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("SECRET_KEY is not valid base64: {0}")]
    InvalidSecretKey(String),
    #[error("SECRET_KEY decodes to {0} bytes, at least {min} are required", min = MIN_SECRET_KEY_BYTES)]
    WeakSecretKey(usize),
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be at most {max}, got {value}")]
    OutOfRange {
        var: &'static str,
        value: i64,
        max: i64,
    },
}

/// Runtime settings, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub secret_key: Vec<u8>,
    pub access_token_minutes: i64,
    pub refresh_token_minutes: i64,
    pub auth_requests_per_minute: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_path", &self.db_path)
            .field("secret_key", &"<redacted>")
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_minutes", &self.refresh_token_minutes)
            .field("auth_requests_per_minute", &self.auth_requests_per_minute)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let encoded = lookup("SECRET_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("SECRET_KEY"))?;
        let secret_key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::InvalidSecretKey(e.to_string()))?;
        if secret_key.len() < MIN_SECRET_KEY_BYTES {
            return Err(ConfigError::WeakSecretKey(secret_key.len()));
        }

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: positive(&lookup, "PORT", 8080)?,
            db_path: lookup("DB_PATH").unwrap_or_else(|| "./data/sparesti.db".to_string()),
            secret_key,
            access_token_minutes: lifetime(
                &lookup,
                "ACCESS_TOKEN_MINUTES",
                DEFAULT_ACCESS_TOKEN_MINUTES,
            )?,
            refresh_token_minutes: lifetime(
                &lookup,
                "REFRESH_TOKEN_MINUTES",
                DEFAULT_REFRESH_TOKEN_MINUTES,
            )?,
            auth_requests_per_minute: positive(
                &lookup,
                "AUTH_RATE_LIMIT_PER_MINUTE",
                DEFAULT_AUTH_REQUESTS_PER_MINUTE,
            )?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn positive<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => Ok(value),
            _ => Err(ConfigError::InvalidNumber { var, value: raw }),
        },
    }
}

fn lifetime<F>(lookup: &F, var: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let minutes = positive(lookup, var, default)?;
    if minutes > MAX_TOKEN_MINUTES {
        return Err(ConfigError::OutOfRange {
            var,
            value: minutes,
            max: MAX_TOKEN_MINUTES,
        });
    }
    Ok(minutes)
}
