//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode between reading the config and
//! writing the surviving map.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: invasion_core::ConfigError,
    },

    /// The map could not be read or written.
    #[error("map error: {source}")]
    Map {
        /// The underlying world error.
        #[from]
        source: invasion_world::WorldError,
    },

    /// The game could not be built or run.
    #[error("game error: {source}")]
    Game {
        /// The underlying game error.
        #[from]
        source: invasion_core::GameError,
    },

    /// The summary could not be encoded.
    #[error("summary encoding failed: {source}")]
    Summary {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Writing to stdout failed.
    #[error("output failed: {source}")]
    Output {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
