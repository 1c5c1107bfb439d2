//! Runtime configuration from environment variables
//!
//! Environment variables (all optional):
//! - `LASTHEARD_DB_PATH` (default: data/lastheard.db)
//! - `SCHEMA_DIR` (default: sql)
//! - `FEED_URL` (default: https://api.brandmeister.network)
//! - `FEED_PATH` (default: /lh/socket.io)
//! - `FEED_EVENT` (default: mqtt)
//! - `BIND_ADDR` (default: 0.0.0.0:$PORT, PORT defaults to 5001)
//! - `CLIENT_URL` (default: http://localhost:3000)
//! - `INGEST_CHANNEL_BUFFER` (default: 10000)
//! - `PRUNE_EVERY_INSERTS` (default: 100)
//! - `RETENTION_HOURS` (default: 24)
//! - `BROADCAST_INTERVAL_SECS` (default: 10)
//! - `READ_POOL_SIZE` (default: 4)
//! - `TALKGROUPS_CSV` (default: talkgroups.csv)
//! - `GEOGRAPHY_CSV` (default: continent_country.csv, may be an http(s) URL)
//! - `ADMIN_PASSWORD` bcrypt hash, `JWT_SECRET` signing secret
//! - `RUST_LOG` (default: info)

use std::env;
use std::net::SocketAddr;

/// Upper bound for `RETENTION_HOURS` (one year).
pub const MAX_RETENTION_HOURS: i64 = 24 * 366;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Connection settings for the upstream Socket.IO feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub path: String,
    pub event: String,
}

/// Credentials for the administrative surface. Absent when either variable is unset.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub password_hash: String,
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub db_path: String,
    pub schema_dir: String,
    pub feed: FeedConfig,
    pub bind_addr: SocketAddr,
    pub client_url: String,
    pub channel_buffer: usize,
    pub prune_every_inserts: u64,
    pub retention_hours: i64,
    pub broadcast_interval_secs: u64,
    pub read_pool_size: usize,
    pub talkgroups_csv: String,
    pub geography_csv: String,
    pub admin: Option<AdminCredentials>,
    pub rust_log: String,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let feed_url = or("FEED_URL", "https://api.brandmeister.network");
        if !feed_url.starts_with("http://")
            && !feed_url.starts_with("https://")
            && !feed_url.starts_with("ws://")
            && !feed_url.starts_with("wss://")
        {
            return Err(ConfigError::InvalidValue(
                "FEED_URL must start with http://, https://, ws:// or wss://".to_string(),
            ));
        }

        let bind_addr = match get("BIND_ADDR") {
            Some(addr) => addr,
            None => format!("0.0.0.0:{}", or("PORT", "5001")),
        };
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("BIND_ADDR '{}' is not host:port", bind_addr)))?;

        let prune_every_inserts = parse_number(&get, "PRUNE_EVERY_INSERTS", 100u64)?;
        if prune_every_inserts == 0 {
            return Err(ConfigError::InvalidValue("PRUNE_EVERY_INSERTS must be at least 1".to_string()));
        }

        let read_pool_size = parse_number(&get, "READ_POOL_SIZE", 4usize)?;
        if read_pool_size == 0 {
            return Err(ConfigError::InvalidValue("READ_POOL_SIZE must be at least 1".to_string()));
        }

        let retention_hours = parse_number(&get, "RETENTION_HOURS", 24i64)?;
        if !(1..=MAX_RETENTION_HOURS).contains(&retention_hours) {
            return Err(ConfigError::InvalidValue(format!(
                "RETENTION_HOURS must be between 1 and {}, got {}",
                MAX_RETENTION_HOURS, retention_hours
            )));
        }

        let admin = match (get("ADMIN_PASSWORD"), get("JWT_SECRET")) {
            (Some(password_hash), Some(jwt_secret)) if !password_hash.is_empty() && !jwt_secret.is_empty() => {
                Some(AdminCredentials { password_hash, jwt_secret })
            }
            _ => None,
        };

        Ok(Self {
            db_path: or("LASTHEARD_DB_PATH", "data/lastheard.db"),
            schema_dir: or("SCHEMA_DIR", "sql"),
            feed: FeedConfig {
                url: feed_url,
                path: or("FEED_PATH", "/lh/socket.io"),
                event: or("FEED_EVENT", "mqtt"),
            },
            bind_addr,
            client_url: or("CLIENT_URL", "http://localhost:3000"),
            channel_buffer: parse_number(&get, "INGEST_CHANNEL_BUFFER", 10_000usize)?.max(1),
            prune_every_inserts,
            retention_hours,
            broadcast_interval_secs: parse_number(&get, "BROADCAST_INTERVAL_SECS", 10u64)?.max(1),
            read_pool_size,
            talkgroups_csv: or("TALKGROUPS_CSV", "talkgroups.csv"),
            geography_csv: or("GEOGRAPHY_CSV", "continent_country.csv"),
            admin,
            rust_log: or("RUST_LOG", "info"),
        })
    }
}

fn parse_number<F, T>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be a number, got '{}'", key, raw))),
    }
}
