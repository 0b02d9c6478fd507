// src/routes/health.rs
//! API health check endpoint for the current logger.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is running and able to
//! respond to HTTP requests. Besides liveness it reports the log tables the
//! service accepts, so a client can discover valid `/log/{table}` names.

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::Partition;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    tables: Vec<&'static str>,
}

/// Handle `GET /health`.
///
/// Does not touch the store.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tables: Partition::ALL.iter().map(|p| p.name()).collect(),
    })
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges cleanly with the gateway
/// router regardless of the state type.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
