use serde::Deserialize;

/// Default config file, read from the working directory.
pub const CONFIG_FILE: &str = "cueball.toml";

/// Top-level server configuration, loaded from `cueball.toml`.
///
/// Table geometry is not configurable here; it is compiled into the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Directory of static client files served at `/`. Unset disables it.
    pub web_root: Option<String>,
    pub game: GameConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: None,
            game: GameConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Simulation loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_rate_hz: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { tick_rate_hz: 60 }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Snapshots buffered per observer before it starts skipping.
    pub broadcast_capacity: usize,
    /// Inbound commands per second per connection (also the burst size).
    pub ws_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            broadcast_capacity: 64,
            ws_rate_limit_per_sec: 20.0,
        }
    }
}

impl ServerConfig {
    /// Check every field, returning the first problem found.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.game.tick_rate_hz == 0 || self.game.tick_rate_hz > 1000 {
            return Err("game.tick_rate_hz must be between 1 and 1000".to_string());
        }
        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.broadcast_capacity == 0 {
            return Err("limits.broadcast_capacity must be > 0".to_string());
        }
        let rate = self.limits.ws_rate_limit_per_sec;
        if !rate.is_finite() || rate <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        Ok(())
    }

    /// Validate configuration, exiting the process on a fatal problem.
    pub fn validate(&self) {
        if let Err(e) = self.check() {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
        if let Some(ref root) = self.web_root
            && !std::path::Path::new(root).is_dir()
        {
            tracing::warn!(web_root = %root, "web_root is not a directory, static files will 404");
        }
    }

    /// Load config from `cueball.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(content) => Self::from_toml(&content),
            Err(_) => {
                tracing::info!("No {CONFIG_FILE} found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    fn from_toml(content: &str) -> Self {
        match toml::from_str::<ServerConfig>(content) {
            Ok(cfg) => {
                tracing::info!("Loaded configuration from {CONFIG_FILE}");
                cfg
            },
            Err(e) => {
                tracing::warn!("Failed to parse {CONFIG_FILE}: {e}, using defaults");
                ServerConfig::default()
            },
        }
    }

    /// Apply `CUEBALL_*` overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("CUEBALL_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(root) = var("CUEBALL_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = Some(root);
        }
        if let Some(val) = var("CUEBALL_TICK_RATE")
            && let Ok(n) = val.parse::<u32>()
        {
            self.game.tick_rate_hz = n;
        }
        if let Some(val) = var("CUEBALL_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = var("CUEBALL_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
    }
}
