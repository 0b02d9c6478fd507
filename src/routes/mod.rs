use axum::Router;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{AppError, Config, SharedStore};

mod health;
mod indicator;
mod logs;

// ---

/// State shared by every handler: the store handle and the loaded config.
pub type AppState = (SharedStore, Config);

pub fn router(store: SharedStore, config: Config) -> Router {
    // ---
    Router::new()
        .merge(logs::router())
        .merge(indicator::router())
        .merge(health::router())
        .with_state((store, config))
}

// ---

/// Decode a request body that must be a JSON array of `T`.
///
/// Bodies are taken as raw bytes so that every malformed input maps onto
/// [`AppError::InvalidInput`] rather than an extractor rejection.
pub(crate) fn json_array<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, AppError> {
    // ---
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::invalid(format!("Invalid JSON body: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(AppError::invalid("Invalid format, expected an array."));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(pos, item)| {
            serde_json::from_value(item)
                .map_err(|e| AppError::invalid(format!("Invalid entry at position {}: {}", pos, e)))
        })
        .collect()
}

/// Parse an indicator id taken from a path or query string.
pub(crate) fn parse_indicator_id(raw: &str) -> Result<i32, AppError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| AppError::invalid(format!("Indicator id must be an integer, got '{}'", raw)))
}
