//! Configuration loader for the `arus-logger` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate reads `env::var` for
//! service settings.
//!
use std::{env, str::FromStr};

use anyhow::{anyhow, bail, Result};
use chrono::{FixedOffset, Offset, Utc};

/// Parse an optional unsigned integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional signed integer environment variable with a default value.
macro_rules! parse_env_i32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<i32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Which backing store the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("Invalid STORE_BACKEND: '{}'", other)),
        }
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Backing store selection.
    pub store_backend: StoreBackend,

    /// PostgreSQL connection string, required for the Postgres backend.
    pub db_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// TCP port the HTTP server listens on.
    pub port: u16,

    /// Canonical civil timezone for capture instants and serialized timestamps.
    pub utc_offset: FixedOffset,

    /// Number of most recent rows scanned by the grouped read-back.
    pub readback_limit: u32,

    /// Drop batches in which no sample reaches the threshold.
    pub threshold_gate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            db_url: None,
            db_pool_max: 5,
            port: 3000,
            utc_offset: default_offset(),
            readback_limit: 100,
            threshold_gate: true,
        }
    }
}

/// UTC+7, the service's home timezone.
fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap_or_else(|| Utc.fix())
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string (Postgres backend only)
///
/// Optional:
/// - `STORE_BACKEND` – `postgres` or `memory` (default: postgres)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `PORT` – listen port (default: 3000)
/// - `SERVICE_UTC_OFFSET_HOURS` – fixed timezone offset (default: 7)
/// - `READBACK_LIMIT` – rows scanned for grouped read-back (default: 100)
/// - `THRESHOLD_GATE` – `on` or `off` (default: on)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let store_backend = match env::var("STORE_BACKEND") {
        Ok(v) => v.parse::<StoreBackend>()?,
        Err(_) => StoreBackend::Postgres,
    };

    let db_url = match store_backend {
        StoreBackend::Postgres => Some(require_env!("DATABASE_URL")),
        StoreBackend::Memory => env::var("DATABASE_URL").ok(),
    };

    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let readback_limit = parse_env_u32!("READBACK_LIMIT", 100);

    let port = parse_env_u32!("PORT", 3000);
    let port = u16::try_from(port).map_err(|_| anyhow!("Invalid PORT: {} is out of range", port))?;

    let offset_hours = parse_env_i32!("SERVICE_UTC_OFFSET_HOURS", 7);
    let utc_offset = parse_offset_hours(offset_hours)?;

    let threshold_gate = match env::var("THRESHOLD_GATE").as_deref() {
        Ok("on") | Ok("1") | Ok("true") | Err(_) => true,
        Ok("off") | Ok("0") | Ok("false") => false,
        Ok(other) => bail!("Invalid THRESHOLD_GATE: '{}'", other),
    };

    Ok(Config {
        store_backend,
        db_url,
        db_pool_max,
        port,
        utc_offset,
        readback_limit,
        threshold_gate,
    })
}

fn parse_offset_hours(hours: i32) -> Result<FixedOffset> {
    if !(-23..=23).contains(&hours) {
        bail!("Invalid SERVICE_UTC_OFFSET_HOURS: {} is outside -23..=23", hours);
    }
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| anyhow!("Invalid SERVICE_UTC_OFFSET_HOURS: {}", hours))
}

/// Replace the password of a connection string with `****`.
fn mask_db_url(db_url: &str) -> String {
    let scheme_end = db_url.find("://").map(|p| p + 3).unwrap_or(0);
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            if colon_pos >= scheme_end {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password while showing every other value.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = self
            .db_url
            .as_deref()
            .map(mask_db_url)
            .unwrap_or_else(|| "<unset>".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  STORE_BACKEND            : {:?}", self.store_backend);
        tracing::info!("  DATABASE_URL             : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX              : {}", self.db_pool_max);
        tracing::info!("  PORT                     : {}", self.port);
        tracing::info!("  SERVICE_UTC_OFFSET_HOURS : {}", self.utc_offset);
        tracing::info!("  READBACK_LIMIT           : {}", self.readback_limit);
        tracing::info!("  THRESHOLD_GATE           : {}", self.threshold_gate);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_mask_db_url_hides_password() {
        // ---
        let masked = mask_db_url("postgres://arus:s3cret@db:5432/arus");
        assert_eq!(masked, "postgres://arus:****@db:5432/arus");
        assert!(!masked.contains("s3cret"));
    }

    #[test]
    fn test_mask_db_url_without_credentials() {
        // ---
        assert_eq!(mask_db_url("postgres://db:5432/arus"), "postgres://db:5432/arus");
        assert_eq!(mask_db_url("postgres://arus@db/arus"), "postgres://arus@db/arus");
    }

    #[test]
    fn test_store_backend_parsing() {
        // ---
        assert_eq!("postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!("MEMORY".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_offset_hours_bounds() {
        // ---
        assert_eq!(parse_offset_hours(7).unwrap().local_minus_utc(), 7 * 3600);
        assert_eq!(parse_offset_hours(-5).unwrap().local_minus_utc(), -5 * 3600);
        assert!(parse_offset_hours(24).is_err());
    }

    #[test]
    fn test_default_is_utc_plus_seven() {
        // ---
        let cfg = Config::default();
        assert_eq!(cfg.utc_offset.local_minus_utc(), 7 * 3600);
        assert_eq!(cfg.readback_limit, 100);
        assert!(cfg.threshold_gate);
    }
}
