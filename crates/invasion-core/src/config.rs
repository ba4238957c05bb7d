//! Configuration loading and typed config structures for the invasion.
//!
//! The canonical configuration lives in `invasion-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level invasion configuration.
///
/// Mirrors the structure of `invasion-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvasionConfig {
    /// Monster count, move budget, worker pool and stopping rule.
    #[serde(default)]
    pub game: GameConfig,

    /// Bounds for the rest between two moves.
    #[serde(default)]
    pub residence: ResidenceConfig,

    /// Where the map is read from and written to.
    #[serde(default)]
    pub map: MapConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InvasionConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `INVASION_MAP` overrides `map.input`
    /// - `INVASION_MONSTERS` overrides `game.monsters`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty string yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply `INVASION_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("INVASION_MAP").ok(),
            std::env::var("INVASION_MONSTERS").ok(),
        );
    }

    fn apply_overrides(&mut self, map: Option<String>, monsters: Option<String>) {
        if let Some(path) = map {
            self.map.input = PathBuf::from(path);
        }
        if let Some(raw) = monsters {
            match raw.trim().parse() {
                Ok(count) => self.game.monsters = count,
                Err(e) => warn!(value = %raw, error = %e, "ignoring INVASION_MONSTERS"),
            }
        }
    }
}

/// What happens when few monsters are left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyStop {
    /// Every monster keeps going until it is tired, trapped or killed.
    #[default]
    Disabled,
    /// Once at most one monster is still active it retires as tired.
    LoneSurvivor,
}

/// Game-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// Number of monsters.
    #[serde(default = "default_monsters")]
    pub monsters: u64,

    /// Moves each monster makes before it is tired.
    #[serde(default = "default_min_moves")]
    pub min_moves: u64,

    /// Worker threads running monster activations.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seed for every random policy. `None` draws from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Stopping rule for the last monsters standing.
    #[serde(default)]
    pub early_stop: EarlyStop,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            monsters: default_monsters(),
            min_moves: default_min_moves(),
            workers: default_workers(),
            seed: None,
            early_stop: EarlyStop::default(),
        }
    }
}

/// Rest between moves, in milliseconds. Equal bounds mean a fixed rest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResidenceConfig {
    /// Shortest rest.
    #[serde(default)]
    pub min_ms: u64,

    /// Longest rest.
    #[serde(default = "default_residence_max_ms")]
    pub max_ms: u64,
}

impl ResidenceConfig {
    /// Lower bound as a duration.
    pub const fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    /// Upper bound as a duration.
    pub const fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

impl Default for ResidenceConfig {
    fn default() -> Self {
        Self {
            min_ms: 0,
            max_ms: default_residence_max_ms(),
        }
    }
}

/// Map file locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapConfig {
    /// Map to invade.
    #[serde(default = "default_map_input")]
    pub input: PathBuf,

    /// Where to write what is left of the map. `None` prints it to stdout.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            input: default_map_input(),
            output: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_monsters() -> u64 {
    10
}

const fn default_min_moves() -> u64 {
    10_000
}

const fn default_workers() -> usize {
    4
}

const fn default_residence_max_ms() -> u64 {
    10
}

fn default_map_input() -> PathBuf {
    PathBuf::from("maps/world.txt")
}

fn default_log_level() -> String {
    "info".to_owned()
}
