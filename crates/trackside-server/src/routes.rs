//! Query and control endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use trackside_core::sample::{PositionPoint, SeriesPoint};
use trackside_core::store::{LapIndex, SampleStore, StoreError};
use trackside_core::supervisor::{SimulationStatus, StartOutcome, StopOutcome};

use crate::AppState;

/// Failure of a read endpoint
pub(crate) enum ApiError {
    Store(StoreError),
    Task(tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self {
            ApiError::Store(e) => e.to_string(),
            ApiError::Task(e) => format!("query task failed: {e}"),
        };
        tracing::error!(error = %message, "Query failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        )
            .into_response()
    }
}

/// Run a blocking store query off the async workers
async fn query<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn SampleStore) -> Result<T, StoreError> + Send + 'static,
{
    let store: Arc<dyn SampleStore> = state.supervisor().store().clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(ApiError::Task)?
        .map_err(ApiError::Store)
}

#[derive(Serialize)]
pub(crate) struct LapSeries {
    lap: u32,
    data: Vec<SeriesPoint>,
}

#[derive(Serialize)]
pub(crate) struct LapTrack {
    lap: u32,
    points: Vec<PositionPoint>,
}

pub(crate) async fn root() -> Json<Value> {
    Json(json!({ "ok": true, "version": trackside_core::VERSION }))
}

pub(crate) async fn latest(State(state): State<AppState>) -> Json<Value> {
    let latest = state.supervisor().broadcaster().latest();
    Json(match latest.map(serde_json::to_value) {
        Some(Ok(sample)) => sample,
        _ => json!({}),
    })
}

pub(crate) async fn laps(State(state): State<AppState>) -> Result<Json<LapIndex>, ApiError> {
    query(&state, |store| store.list_laps()).await.map(Json)
}

pub(crate) async fn lap_timeseries(
    State(state): State<AppState>,
    Path(lap): Path<u32>,
) -> Result<Json<LapSeries>, ApiError> {
    let data = query(&state, move |store| store.lap_series(lap)).await?;
    Ok(Json(LapSeries { lap, data }))
}

pub(crate) async fn lap_gps(
    State(state): State<AppState>,
    Path(lap): Path<u32>,
) -> Result<Json<LapTrack>, ApiError> {
    let points = query(&state, move |store| store.lap_positions(lap)).await?;
    Ok(Json(LapTrack { lap, points }))
}

pub(crate) async fn start_simulation(State(state): State<AppState>) -> Json<Value> {
    let status = match state.supervisor().start_simulation().await {
        StartOutcome::Started => "simulation started",
        StartOutcome::AlreadyRunning => "simulation already running",
    };
    Json(json!({ "status": status }))
}

pub(crate) async fn stop_simulation(State(state): State<AppState>) -> Json<Value> {
    let status = match state.supervisor().stop_simulation().await {
        StopOutcome::Stopped => "simulation stopped",
        StopOutcome::NotRunning => "simulation not running",
    };
    Json(json!({ "status": status }))
}

pub(crate) async fn simulation_status(State(state): State<AppState>) -> Json<SimulationStatus> {
    Json(state.supervisor().status())
}
