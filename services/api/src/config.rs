//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use checkin_core::registration::DEFAULT_ISSUE_ATTEMPTS;
use checkin_core::render::DEFAULT_MIN_SIZE;
use checkin_core::{DuplicatePolicy, PayloadFormat};
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs the service against the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub allowed_origin: String,
    pub qr_min_size: u32,
    pub payload_format: PayloadFormat,
    pub duplicate_policy: DuplicatePolicy,
    pub id_issue_attempts: usize,
    /// Required to create staff accounts; signup is disabled when unset.
    pub staff_signup_code: Option<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Check-in Settings ---
        let qr_min_size: u32 = parse_or(&lookup, "QR_MIN_SIZE", &DEFAULT_MIN_SIZE.to_string())?;
        if qr_min_size < 100 {
            return Err(ConfigError::InvalidValue(
                "QR_MIN_SIZE".to_string(),
                format!("{} px is too small to scan reliably", qr_min_size),
            ));
        }
        let payload_format = parse_or(&lookup, "PAYLOAD_FORMAT", "bare")?;
        let duplicate_policy = parse_or(&lookup, "DUPLICATE_CHECKINS", "warn")?;
        let id_issue_attempts: usize = parse_or(
            &lookup,
            "ID_ISSUE_ATTEMPTS",
            &DEFAULT_ISSUE_ATTEMPTS.to_string(),
        )?;
        if id_issue_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "ID_ISSUE_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Staff and Upload Settings ---
        let staff_signup_code = lookup("STAFF_SIGNUP_CODE").filter(|c| !c.is_empty());
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", "10485760")?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            allowed_origin,
            qr_min_size,
            payload_format,
            duplicate_policy,
            id_issue_attempts,
            staff_signup_code,
            max_upload_bytes,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
