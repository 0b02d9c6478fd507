//! `/log/{table}` endpoints: batch submission and grouped read-back.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{json_array, parse_indicator_id, AppState};
use crate::pipeline::{
    capture_instant, group_earliest, newest_first, passes_threshold, synthesize, THRESHOLD,
};
use crate::store::{Order, ReadingQuery};
use crate::{AppError, BatchSummary, Indicator, Partition, Reading, Sample};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/log/{table}", post(create_batch).get(list_batches))
        .route("/log/{table}/{batch_id}", get(batch_detail))
}

/// Query parameters shared by the `/log` routes.
#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    /// Device the batch belongs to, or the device to filter by.
    indicator_id: Option<String>,
    /// Only consider rows at or above the threshold when grouping.
    above_threshold: Option<bool>,
}

impl LogParams {
    fn device_id(&self) -> Result<Option<i32>, AppError> {
        self.indicator_id
            .as_deref()
            .map(parse_indicator_id)
            .transpose()
    }
}

#[derive(Serialize)]
struct SubmitResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

impl SubmitResponse {
    fn no_op(message: &'static str) -> Response {
        (
            StatusCode::OK,
            Json(SubmitResponse {
                message,
                id: None,
                count: None,
            }),
        )
            .into_response()
    }
}

/// Indicator snapshot returned next to the batch list.
#[derive(Serialize)]
#[serde(untagged)]
enum StatusSnapshot {
    One(Option<Indicator>),
    All(Vec<Indicator>),
}

#[derive(Serialize)]
struct ListResponse {
    status: StatusSnapshot,
    arus: Vec<BatchSummary>,
}

#[derive(Serialize)]
struct DetailResponse {
    id: Uuid,
    data: Vec<Reading>,
}

/// Handle `POST /log/{table}`.
#[instrument(skip_all, fields(table = %table))]
async fn create_batch(
    Path(table): Path<String>,
    params: Result<Query<LogParams>, QueryRejection>,
    State((store, config)): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    // ---
    let partition: Partition = table.parse()?;
    let Query(params) = params?;
    let device_id = params.device_id()?;
    let samples: Vec<Sample> = json_array(&body)?;

    info!(
        "POST /log/{} - received {} samples (indicator {:?})",
        partition,
        samples.len(),
        device_id
    );

    if config.threshold_gate && !samples.is_empty() && !passes_threshold(&samples) {
        debug!("POST /log/{} - no sample reached {}, dropping batch", partition, THRESHOLD);
        return Ok(SubmitResponse::no_op(
            "No sample reached the threshold, nothing stored",
        ));
    }

    let now = capture_instant(config.utc_offset);
    let Some(batch) = synthesize(&samples, now, device_id) else {
        debug!("POST /log/{} - empty batch", partition);
        return Ok(SubmitResponse::no_op("No data received, nothing stored"));
    };

    let written = store.bulk_insert(partition, &batch.readings).await?;
    info!(
        "POST /log/{} - stored batch {} ({} rows)",
        partition, batch.batch_id, written
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Data received successfully",
            id: Some(batch.batch_id),
            count: Some(batch.readings.len()),
        }),
    )
        .into_response())
}

/// Handle `GET /log/{table}`.
///
/// Scans the most recent `READBACK_LIMIT` rows, groups them by batch and
/// returns each batch's earliest timestamp, newest batch first.
#[instrument(skip_all, fields(table = %table))]
async fn list_batches(
    Path(table): Path<String>,
    params: Result<Query<LogParams>, QueryRejection>,
    State((store, config)): State<AppState>,
) -> Result<Json<ListResponse>, AppError> {
    // ---
    let partition: Partition = table.parse()?;
    let Query(params) = params?;
    let device_id = params.device_id()?;

    let query = ReadingQuery {
        device_id,
        min_value: params.above_threshold.unwrap_or(false).then_some(THRESHOLD),
        order: Order::Descending,
        limit: Some(config.readback_limit),
        ..Default::default()
    };

    let rows = store.query(partition, &query).await?;
    let mut arus = group_earliest(&rows);
    newest_first(&mut arus);

    let status = match device_id {
        Some(id) => StatusSnapshot::One(store.indicator(id).await?),
        None => StatusSnapshot::All(store.indicators().await?),
    };

    info!(
        "GET /log/{} - {} rows in {} batches",
        partition,
        rows.len(),
        arus.len()
    );
    Ok(Json(ListResponse { status, arus }))
}

/// Handle `GET /log/{table}/{batch_id}`.
#[instrument(skip_all, fields(table = %table, batch_id = %batch_id))]
async fn batch_detail(
    Path((table, batch_id)): Path<(String, String)>,
    params: Result<Query<LogParams>, QueryRejection>,
    State((store, _config)): State<AppState>,
) -> Result<Json<DetailResponse>, AppError> {
    // ---
    let partition: Partition = table.parse()?;
    let Query(params) = params?;
    let device_id = params.device_id()?;
    let id = Uuid::parse_str(&batch_id)
        .map_err(|_| AppError::invalid(format!("Invalid batch id '{}'", batch_id)))?;

    let query = ReadingQuery {
        batch_id: Some(id),
        device_id,
        order: Order::Ascending,
        ..Default::default()
    };

    let data = store.query(partition, &query).await?;
    if data.is_empty() {
        return Err(AppError::not_found(format!(
            "No data found for batch {} in {}",
            id, partition
        )));
    }

    debug!("GET /log/{}/{} - {} rows", partition, id, data.len());
    Ok(Json(DetailResponse { id, data }))
}
