use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| AppError::configuration("DATABASE_URL not set"))?;

        Ok(Self {
            url,
            max_connections: env_or("DB_POOL_MAX", 10)?,
            min_connections: env_or("DB_POOL_MIN", 1)?,
            acquire_timeout: Duration::from_secs(env_or("DB_POOL_ACQUIRE_TIMEOUT_SECS", 10)?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            host: env_or("APP_HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: env_or("APP_PORT", 8000)?,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// `.env` in the working directory wins; otherwise fall back to the crate-local file.
pub fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}
