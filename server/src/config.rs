use std::time::Duration;

/// Server configuration. Every field has a sensible default and can be
/// overridden through a `BRAWL_*` environment variable.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Hard cap on simultaneous joined players.
    pub max_players: u32,
    /// Minimum interval between accepted movement updates per player.
    pub movement_throttle_ms: u64,
    /// Idle time after which a player counts as stale.
    pub liveness_window_ms: u64,
    /// How often the reaper sweeps for stale players.
    pub sweep_period_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    /// Cap on concurrent WebSocket connections (joined or not).
    pub max_connections: usize,
    /// Inbound text frames larger than this close the connection.
    pub max_message_bytes: usize,
    /// Browser origins allowed to connect. Empty means allow all.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            max_players: 5,
            movement_throttle_ms: 50,
            liveness_window_ms: 10_000,
            sweep_period_ms: 30_000,
            heartbeat_interval_ms: 25_000,
            heartbeat_timeout_ms: 60_000,
            max_connections: 64,
            max_message_bytes: 1024,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with any `BRAWL_*` environment overrides.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env_string("BRAWL_LISTEN_ADDR", defaults.listen_addr),
            max_players: env_parse("BRAWL_MAX_PLAYERS", defaults.max_players),
            movement_throttle_ms: env_parse(
                "BRAWL_MOVE_THROTTLE_MS",
                defaults.movement_throttle_ms,
            ),
            liveness_window_ms: env_parse("BRAWL_LIVENESS_WINDOW_MS", defaults.liveness_window_ms),
            sweep_period_ms: env_parse("BRAWL_SWEEP_PERIOD_MS", defaults.sweep_period_ms),
            heartbeat_interval_ms: env_parse(
                "BRAWL_HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval_ms,
            ),
            heartbeat_timeout_ms: env_parse(
                "BRAWL_HEARTBEAT_TIMEOUT_MS",
                defaults.heartbeat_timeout_ms,
            ),
            max_connections: env_parse("BRAWL_MAX_CONNECTIONS", defaults.max_connections),
            max_message_bytes: env_parse("BRAWL_MAX_MESSAGE_BYTES", defaults.max_message_bytes),
            allowed_origins: env_list("BRAWL_ALLOWED_ORIGINS"),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.max_players == 0 {
            return Err("max_players must be at least 1".to_string());
        }
        if self.movement_throttle_ms == 0 {
            return Err("movement_throttle_ms must be positive".to_string());
        }
        if self.liveness_window_ms == 0 || self.sweep_period_ms == 0 {
            return Err("liveness_window_ms and sweep_period_ms must be positive".to_string());
        }
        if self.heartbeat_timeout_ms <= self.heartbeat_interval_ms {
            return Err("heartbeat_timeout_ms must exceed heartbeat_interval_ms".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn movement_throttle(&self) -> Duration {
        Duration::from_millis(self.movement_throttle_ms)
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.liveness_window_ms)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparseable {}={}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
