use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{RwLock, broadcast, mpsc};

use crate::config::ServerConfig;
use crate::game_loop::{GameBroadcast, GameCommand, LatestSnapshot};

pub type SharedSnapshot = Arc<RwLock<LatestSnapshot>>;

#[derive(Clone)]
pub struct AppState {
    /// Command channel into the game loop task.
    pub commands: mpsc::UnboundedSender<GameCommand>,
    /// Per-tick snapshot fan-out; each connection subscribes.
    pub broadcasts: broadcast::Sender<GameBroadcast>,
    pub latest: SharedSnapshot,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Whether the game loop is still accepting commands.
    pub fn loop_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// Holds one slot of the WebSocket connection budget; released on drop.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    /// Take a slot unless `max` connections are already open.
    pub fn try_acquire(count: Arc<AtomicUsize>, max: usize) -> Option<Self> {
        count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;
        Some(Self { count })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
