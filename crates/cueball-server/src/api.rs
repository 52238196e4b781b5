use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;

use cueball_core::net::messages::ClientCommand;
use cueball_core::net::protocol::decode_command_json;
use cueball_eightball::GameSnapshot;

use crate::error::AppError;
use crate::game_loop::GameCommand;
use crate::state::AppState;

impl From<ClientCommand> for GameCommand {
    fn from(cmd: ClientCommand) -> Self {
        match cmd {
            ClientCommand::Shoot { angle, power } => Self::Shoot { angle, power },
            ClientCommand::Restart => Self::Restart,
        }
    }
}

/// Forward a validated client command to the game loop.
pub fn submit(state: &AppState, cmd: ClientCommand) -> Result<(), AppError> {
    state
        .commands
        .send(cmd.into())
        .map_err(|_| AppError::Unavailable("game loop is not running".to_string()))
}

/// Response for an accepted command.
#[derive(Debug, Serialize)]
pub struct CommandAccepted {
    pub accepted: bool,
    /// Tick of the latest published snapshot when the command was queued.
    pub tick: u64,
}

/// GET /api/v1/state: the most recently published snapshot.
pub async fn get_state(State(state): State<AppState>) -> Json<GameSnapshot> {
    Json(state.latest.read().await.snapshot.clone())
}

/// POST /api/v1/commands: queue a `shoot` or `restart` command.
///
/// Acceptance only means the command was queued; the engine still ignores
/// a shot while the table is live.
pub async fn post_command(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<CommandAccepted>), AppError> {
    let cmd = decode_command_json(&body)?;
    submit(&state, cmd)?;
    tracing::debug!(?cmd, "Command queued via REST");

    let tick = state.latest.read().await.snapshot.tick;
    Ok((
        StatusCode::ACCEPTED,
        Json(CommandAccepted {
            accepted: true,
            tick,
        }),
    ))
}
