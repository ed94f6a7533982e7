// src/config.rs

use std::env;
use std::str::FromStr;

use crate::engine::DEFAULT_NOTIFIER_LOCK_KEY;

pub const DEFAULT_PORT: u16 = 8065;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub renew_password: String,
    pub jwt_secret: String,
    pub utc_offset_hours: i32,
    pub notifier_lock_key: i64,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| non_empty(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", non_empty("PORT"), DEFAULT_PORT)?,
            renew_password: required("RENEW_PASSWORD")?,
            jwt_secret: required("JWT_SECRET")?,
            utc_offset_hours: parse_or(
                "BUSINESS_UTC_OFFSET_HOURS",
                non_empty("BUSINESS_UTC_OFFSET_HOURS"),
                DEFAULT_UTC_OFFSET_HOURS,
            )?,
            notifier_lock_key: parse_or(
                "NOTIFIER_LOCK_KEY",
                non_empty("NOTIFIER_LOCK_KEY"),
                DEFAULT_NOTIFIER_LOCK_KEY,
            )?,
        })
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
