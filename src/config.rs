//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::TrainColor;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TALLY_TRAIN_CONFIG_PATH";
/// Environment variable selecting the storage backend.
const STORE_ENV: &str = "TALLY_TRAIN_STORE";
const DEFAULT_MAX_PLAYERS: usize = 8;
const DEFAULT_OBSERVER_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Roster cap per game, never above the palette size.
    pub max_players: usize,
    /// Pending updates an observer may queue before it is evicted.
    pub observer_buffer: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_players = app_config.max_players,
                        observer_buffer = app_config.observer_buffer,
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            observer_buffer: DEFAULT_OBSERVER_BUFFER,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    max_players: Option<usize>,
    observer_buffer: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            max_players: value
                .max_players
                .unwrap_or(DEFAULT_MAX_PLAYERS)
                .clamp(1, TrainColor::ALL.len()),
            observer_buffer: value
                .observer_buffer
                .unwrap_or(DEFAULT_OBSERVER_BUFFER)
                .max(1),
        }
    }
}

/// Storage backend selected through `TALLY_TRAIN_STORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Mongo,
    Couch,
}

impl StoreKind {
    /// Read the backend from the environment, defaulting to memory.
    pub fn from_env() -> Result<Self, String> {
        match env::var(STORE_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::Memory),
        }
    }

    fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(Self::Memory),
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "couch" | "couchdb" => Ok(Self::Couch),
            other => Err(format!("unsupported {STORE_ENV} value `{other}`")),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
