//! # Trackside Server
//!
//! HTTP and WebSocket surface over the Trackside ingestion pipeline.
//!
//! ```text
//! GET  /                         liveness + version
//! GET  /api/latest               most recent sample, or {}
//! GET  /api/laps                 recorded laps + highest lap
//! GET  /api/lap/:id/timeseries   V, A, mph, torque by time
//! GET  /api/lap/:id/gps          lat/lon track by time
//! POST /api/simulation/start     switch to simulated input
//! POST /api/simulation/stop      back to live input
//! GET  /api/simulation/status    {"running": bool}
//! GET  /ws                       push channel: latest, then every sample
//! ```

#![warn(missing_docs)]

pub mod config;
mod routes;
mod ws;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use trackside_core::supervisor::Supervisor;

pub use config::{ServerConfig, ServerConfigError};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    supervisor: Arc<Supervisor>,
}

impl AppState {
    /// Wrap a supervisor
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    /// The supervisor behind the API
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }
}

/// Build the full router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/api/latest", get(routes::latest))
        .route("/api/laps", get(routes::laps))
        .route("/api/lap/:lap/timeseries", get(routes::lap_timeseries))
        .route("/api/lap/:lap/gps", get(routes::lap_gps))
        .route("/api/simulation/start", post(routes::start_simulation))
        .route("/api/simulation/stop", post(routes::stop_simulation))
        .route("/api/simulation/status", get(routes::simulation_status))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}
