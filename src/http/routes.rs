//! HTTP route definitions

use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::config::Config;
use crate::net::protocol::{MissionLoadData, StationType, UniverseStateData};
use crate::panels::PanelState;
use crate::scripting::Mission;
use crate::stations::StationInfo;
use crate::util::time::uptime_secs;
use crate::ws::session::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let enable_cors = state.config.read().unwrap().server.enable_cors;

    let router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(status_handler))
        .route("/api/universe/state", get(universe_state_handler))
        .route("/api/stations", get(stations_handler))
        .route("/api/panels", get(panels_handler))
        .route(
            "/api/missions",
            get(missions_handler).post(mission_load_handler),
        )
        .route(
            "/api/config",
            get(config_handler).put(config_update_handler),
        )
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

// ============================================================================
// Status endpoint
// ============================================================================

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
    uptime_secs: u64,
    connected_clients: HashMap<StationType, usize>,
    connected_panels: HashMap<String, bool>,
    universe_objects: usize,
    kinetic_energy: f64,
    active_mission: Option<Mission>,
    active_triggers: usize,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let (universe_objects, kinetic_energy) = {
        let universe = state.universe.read().unwrap();
        (universe.object_count(), universe.kinetic_energy())
    };

    let (active_mission, active_triggers) = {
        let scripts = state.scripts.lock().unwrap();
        (scripts.active_mission(), scripts.trigger_count())
    };

    Json(StatusResponse {
        running: true,
        uptime_secs: uptime_secs(),
        connected_clients: state.sessions.counts_by_station(),
        connected_panels: state.panel_registry.connected_panels(),
        universe_objects,
        kinetic_energy,
        active_mission,
        active_triggers,
    })
}

// ============================================================================
// Universe, stations and panels
// ============================================================================

async fn universe_state_handler(State(state): State<AppState>) -> Json<UniverseStateData> {
    let snapshot = {
        let universe = state.universe.read().unwrap();
        universe.state()
    };
    Json(snapshot)
}

async fn stations_handler(State(state): State<AppState>) -> Json<Vec<StationInfo>> {
    Json(state.stations.all_stations())
}

async fn panels_handler(State(state): State<AppState>) -> Json<Vec<PanelState>> {
    Json(state.panels.all_panels())
}

// ============================================================================
// Missions
// ============================================================================

async fn missions_handler(State(state): State<AppState>) -> Json<Vec<Mission>> {
    let missions = {
        let scripts = state.scripts.lock().unwrap();
        scripts.missions()
    };
    Json(missions)
}

async fn mission_load_handler(
    State(state): State<AppState>,
    Json(req): Json<MissionLoadData>,
) -> Result<StatusCode, AppError> {
    let result = {
        let scripts = state.scripts.lock().unwrap();
        scripts.load_mission_file(&req.mission_file)
    };

    result.map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Admin configuration
// ============================================================================

async fn config_handler(State(state): State<AppState>) -> Json<Config> {
    let config = state.config.read().unwrap().clone();
    Json(config)
}

async fn config_update_handler(
    State(state): State<AppState>,
    Json(new_config): Json<Config>,
) -> Result<StatusCode, AppError> {
    new_config
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    *state.config.write().unwrap() = new_config;
    Ok(StatusCode::OK)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
