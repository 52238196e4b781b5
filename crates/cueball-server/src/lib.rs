pub mod api;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod health;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use cueball_eightball::EightBall;

use config::ServerConfig;
use game_loop::{LatestSnapshot, spawn_game_loop};
use state::AppState;

/// Build the Axum router and application state from a config, starting the
/// game loop on a fresh rack. Must be called inside a tokio runtime.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    build_app_with_game(config, EightBall::new())
}

/// Like [`build_app`], but the loop drives the given game.
pub fn build_app_with_game(config: ServerConfig, game: EightBall) -> (Router<()>, AppState) {
    let latest = Arc::new(RwLock::new(LatestSnapshot::from_game(&game)));
    let (broadcasts, _) = broadcast::channel(config.limits.broadcast_capacity.max(1));
    let (commands, _handle) = spawn_game_loop(
        game,
        config.game.tick_rate_hz,
        broadcasts.clone(),
        Arc::clone(&latest),
    );

    let web_root = config.web_root.clone();
    let state = AppState {
        commands,
        broadcasts,
        latest,
        ws_connection_count: Arc::new(AtomicUsize::new(0)),
        config: Arc::new(config),
    };

    let api_routes = Router::new()
        .route("/state", get(api::get_state))
        .route("/commands", post(api::post_command));

    let mut app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_routes);

    if let Some(root) = web_root {
        app = app.fallback_service(ServeDir::new(root));
    }

    // Browsers load the client from anywhere; accept any origin.
    let app = app.layer(CorsLayer::permissive()).with_state(state.clone());

    (app, state)
}
