//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::game::geometry::MapDescription;
use crate::game::WorldSettings;
use crate::util::time::DEFAULT_TICK_RATE;
use crate::ws::session::SessionLimits;

/// Highest supported simulation rate
pub const MAX_TICK_RATE: u32 = 60;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS; any origin when unset
    pub client_origin: Option<String>,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Ticks between snapshot broadcasts
    pub snapshot_interval_ticks: u32,
    /// Side length of the square map
    pub map_size: f32,
    /// Optional JSON map description replacing the built-in arena
    pub map_file: Option<PathBuf>,
    /// Seed for spawn randomness; random when unset
    pub world_seed: Option<u64>,
    pub max_players: usize,

    pub session_timeout: Duration,
    pub chat_burst: u32,
    pub chat_window: Duration,
    /// Inbound frames per second per connection
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let tick_rate: u32 = parse_or("TICK_RATE", DEFAULT_TICK_RATE)?;
        let map_size: f32 = parse_or("MAP_SIZE", 2400.0)?;
        if !(map_size.is_finite() && map_size > 0.0) {
            return Err(ConfigError::Invalid("MAP_SIZE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),

            tick_rate: tick_rate.clamp(1, MAX_TICK_RATE),
            snapshot_interval_ticks: parse_or::<u32>("SNAPSHOT_INTERVAL_TICKS", 1)?.max(1),
            map_size,
            map_file: env::var("MAP_FILE").ok().map(PathBuf::from),
            world_seed: parse_opt("WORLD_SEED")?,
            max_players: parse_or("MAX_PLAYERS", 64)?,

            session_timeout: Duration::from_secs(parse_or("SESSION_TIMEOUT_SECS", 30)?),
            chat_burst: parse_or("CHAT_BURST", 5)?,
            chat_window: Duration::from_secs(parse_or("CHAT_WINDOW_SECS", 10)?),
            input_rate_limit: parse_or("INPUT_RATE_LIMIT", 60)?,
        })
    }

    /// The map to build the world from: `MAP_FILE` if set, else the built-in arena
    pub fn load_map(&self) -> Result<MapDescription, ConfigError> {
        match &self.map_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(MapDescription::default_arena(self.map_size)),
        }
    }

    pub fn world_settings(&self, seed: u64) -> WorldSettings {
        WorldSettings {
            seed,
            tick_rate: self.tick_rate,
            session_timeout_ms: self.session_timeout.as_millis() as u64,
            max_players: self.max_players,
        }
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            input_per_second: self.input_rate_limit,
            chat_burst: self.chat_burst,
            chat_window: self.chat_window,
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(key)?.unwrap_or(default))
}

fn parse_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Failed to read map file: {0}")]
    MapFile(#[from] std::io::Error),

    #[error("Failed to parse map file: {0}")]
    MapParse(#[from] serde_json::Error),
}
