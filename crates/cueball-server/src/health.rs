use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub game: GameInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct GameInfo {
    pub running: bool,
    pub tick: u64,
    pub game_over: bool,
}

/// Structured health check endpoint. Returns server status, connection count
/// and game loop progress as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let websocket = state.ws_connection_count.load(Ordering::Relaxed);
    let running = state.loop_running();
    let (tick, game_over) = {
        let latest = state.latest.read().await;
        (latest.snapshot.tick, latest.snapshot.game_over)
    };

    Json(HealthResponse {
        status: if running { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket },
        game: GameInfo {
            running,
            tick,
            game_over,
        },
    })
}

/// Readiness check: ready while the game loop accepts commands.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.loop_running() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready: game loop stopped")
    }
}
