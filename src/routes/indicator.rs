//! `/indicator` endpoints: per-device last known value and motor label.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::{json_array, parse_indicator_id, AppState};
use crate::pipeline::capture_instant;
use crate::{AppError, Indicator, IndicatorUpdate};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/indicator", get(list).post(upsert))
        .route("/indicator/{id}", get(show))
}

#[derive(Serialize)]
struct UpsertResponse {
    message: &'static str,
    data: Vec<Indicator>,
}

#[derive(Serialize)]
struct ListResponse {
    data: Vec<Indicator>,
}

/// Handle `POST /indicator`.
///
/// Entries are upserted one at a time, all stamped with the same instant.
/// A failure stops the loop; entries before it stay written.
#[instrument(skip_all)]
async fn upsert(
    State((store, config)): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    // ---
    let updates: Vec<IndicatorUpdate> = json_array(&body)?;
    if updates.is_empty() {
        return Ok((
            StatusCode::OK,
            Json(UpsertResponse {
                message: "No data received, nothing stored",
                data: Vec::new(),
            }),
        )
            .into_response());
    }

    let now = capture_instant(config.utc_offset);
    let mut data = Vec::with_capacity(updates.len());
    for update in &updates {
        data.push(store.upsert_indicator(update, now).await?);
    }

    info!("POST /indicator - upserted {} indicators", data.len());
    Ok((
        StatusCode::CREATED,
        Json(UpsertResponse {
            message: "Indicator data received successfully",
            data,
        }),
    )
        .into_response())
}

/// Handle `GET /indicator`.
#[instrument(skip_all)]
async fn list(State((store, _config)): State<AppState>) -> Result<Json<ListResponse>, AppError> {
    let data = store.indicators().await?;
    Ok(Json(ListResponse { data }))
}

/// Handle `GET /indicator/{id}`.
#[instrument(skip_all, fields(id = %id))]
async fn show(
    Path(id): Path<String>,
    State((store, _config)): State<AppState>,
) -> Result<Json<Indicator>, AppError> {
    // ---
    let device_id = parse_indicator_id(&id)?;
    store
        .indicator(device_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Indicator {} not found", device_id)))
}
