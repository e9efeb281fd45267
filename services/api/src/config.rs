//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use crate::assets::UsageAccounting;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// HMAC key used to sign and verify access tokens.
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// Root directory of uploaded assets; `/uploads/...` references resolve below it.
    pub uploads_dir: PathBuf,
    pub usage_accounting: UsageAccounting,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = required_var("DATABASE_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Token Settings ---
        let jwt_secret = required_var("JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must not be empty".to_string(),
            ));
        }
        let token_ttl = token_ttl(parse_var("TOKEN_TTL_SECS", "7200")?)?;

        // --- Asset Settings ---
        let uploads_dir = std::env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));
        let usage_accounting = parse_var("USAGE_ACCOUNTING", "on-success")?;
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", "52428800")?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            token_ttl,
            uploads_dir,
            usage_accounting,
            cors_origin,
            max_upload_bytes,
        })
    }
}

/// Longest accepted token lifetime: 30 days.
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

fn token_ttl(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 || secs > MAX_TOKEN_TTL_SECS {
        return Err(ConfigError::InvalidValue(
            "TOKEN_TTL_SECS".to_string(),
            format!("must be between 1 and {} seconds", MAX_TOKEN_TTL_SECS),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

/// Reads `name`, falling back to `default`, and parses it.
fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_parsed() {
        let addr: SocketAddr = parse_var("DL_TEST_UNSET_BIND", "0.0.0.0:3000").unwrap();
        assert_eq!(addr.port(), 3000);

        let accounting: UsageAccounting = parse_var("DL_TEST_UNSET_ACCOUNTING", "on-success").unwrap();
        assert_eq!(accounting, UsageAccounting::OnSuccess);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = parse_var::<u64>("DL_TEST_UNSET_TTL", "two hours").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "DL_TEST_UNSET_TTL"));
    }

    #[test]
    fn token_lifetimes_are_bounded() {
        assert_eq!(token_ttl(7200).unwrap(), Duration::from_secs(7200));
        assert_eq!(
            token_ttl(MAX_TOKEN_TTL_SECS).unwrap(),
            Duration::from_secs(MAX_TOKEN_TTL_SECS)
        );
        assert!(token_ttl(0).is_err());
        assert!(matches!(
            token_ttl(MAX_TOKEN_TTL_SECS + 1),
            Err(ConfigError::InvalidValue(ref name, _)) if name == "TOKEN_TTL_SECS"
        ));
    }
}
