use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use cueball_core::net::protocol::{encode_snapshot_json, encode_snapshot_msgpack};
use cueball_eightball::{EightBall, GameSnapshot, TableEvent};

use crate::state::SharedSnapshot;

/// Commands sent from the transport handlers to the game tick loop.
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Shoot { angle: f64, power: f64 },
    Restart,
    Stop,
}

/// A snapshot encoded once per wire format, shared by every observer.
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    pub tick: u64,
    pub json: Utf8Bytes,
    pub msgpack: Bytes,
}

impl EncodedSnapshot {
    /// Encode both formats. A format that fails to encode is left empty and
    /// logged; observers skip empty frames.
    pub fn encode(snapshot: &GameSnapshot) -> Self {
        let json = match encode_snapshot_json(snapshot) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                tracing::error!(tick = snapshot.tick, error = %e, "Failed to encode JSON snapshot");
                Utf8Bytes::from_static("")
            },
        };
        let msgpack = match encode_snapshot_msgpack(snapshot) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                tracing::error!(tick = snapshot.tick, error = %e, "Failed to encode msgpack snapshot");
                Bytes::new()
            },
        };
        Self {
            tick: snapshot.tick,
            json,
            msgpack,
        }
    }
}

/// Most recent state, kept for REST readers and newly connected observers.
#[derive(Debug, Clone)]
pub struct LatestSnapshot {
    pub snapshot: GameSnapshot,
    pub encoded: EncodedSnapshot,
}

impl LatestSnapshot {
    pub fn from_game(game: &EightBall) -> Self {
        let snapshot = game.snapshot();
        let encoded = EncodedSnapshot::encode(&snapshot);
        Self { snapshot, encoded }
    }
}

/// Broadcasts sent from the game tick loop to all connected observers.
#[derive(Debug, Clone)]
pub enum GameBroadcast {
    /// Uses `Bytes` for zero-copy cloning across connections.
    Snapshot(EncodedSnapshot),
    /// The loop has exited; no further snapshots follow.
    GameEnded,
}

/// Spawn the server-authoritative tick loop as a tokio task.
///
/// The task owns `game` outright. Commands and ticks are handled one at a
/// time by a single `select!`, so a tick never observes a half-applied
/// command.
pub fn spawn_game_loop(
    game: EightBall,
    tick_rate_hz: u32,
    broadcast_tx: broadcast::Sender<GameBroadcast>,
    latest: SharedSnapshot,
) -> (mpsc::UnboundedSender<GameCommand>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        run_game_tick_loop(game, tick_rate_hz, cmd_rx, broadcast_tx, latest).await;
    });
    (cmd_tx, handle)
}

async fn run_game_tick_loop(
    mut game: EightBall,
    tick_rate_hz: u32,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
    broadcast_tx: broadcast::Sender<GameBroadcast>,
    latest: SharedSnapshot,
) {
    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(tick_rate_hz.max(1)));
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(tick_rate_hz, "Game loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let events = game.tick();
                log_events(game.tick_count(), &events);
                publish(&game, &broadcast_tx, &latest).await;
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(GameCommand::Shoot { angle, power }) => {
                        if !game.shoot(angle, power) {
                            tracing::debug!(
                                tick = game.tick_count(),
                                angle,
                                power,
                                "Shot ignored: table not ready"
                            );
                        }
                    },
                    Some(GameCommand::Restart) => {
                        game.restart();
                        publish(&game, &broadcast_tx, &latest).await;
                    },
                    Some(GameCommand::Stop) | None => {
                        break;
                    },
                }
            }
        }
    }

    tracing::info!(tick = game.tick_count(), "Game loop stopped");
    let _ = broadcast_tx.send(GameBroadcast::GameEnded);
}

async fn publish(
    game: &EightBall,
    broadcast_tx: &broadcast::Sender<GameBroadcast>,
    latest: &SharedSnapshot,
) {
    let next = LatestSnapshot::from_game(game);
    let encoded = next.encoded.clone();
    *latest.write().await = next;
    // No subscribers is fine; REST readers still see `latest`.
    let _ = broadcast_tx.send(GameBroadcast::Snapshot(encoded));
}

fn log_events(tick: u64, events: &[TableEvent]) {
    for event in events {
        match event {
            TableEvent::BlackPotted { winner, legal, .. } => {
                tracing::info!(tick, winner = %winner, legal, "Frame over");
            },
            TableEvent::TurnChanged { to } => {
                tracing::debug!(tick, player = %to, "Table at rest, turn passes");
            },
            _ => {},
        }
    }
}
