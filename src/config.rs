use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Search radius for driver matching at ride creation.
    pub match_radius_km: f64,
    /// Maximum time a transition waits for the per-ride lease.
    pub lease_wait_ms: u64,
    pub event_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            match_radius_km: 5.0,
            lease_wait_ms: 200,
            event_buffer_size: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            match_radius_km: parse_or_default("MATCH_RADIUS_KM", 5.0)?,
            lease_wait_ms: parse_or_default("LEASE_WAIT_MS", 200)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
