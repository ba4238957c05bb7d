//! Engine binary for the monster invasion simulation.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `invasion-config.yaml` (or `INVASION_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Read the map (`map.input`, or the first command-line argument)
//! 4. Build the game and run it to completion
//! 5. Write what is left of the map to `map.output`, or stdout
//! 6. Log the summary

mod error;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use invasion_core::{Game, GameBuilder, InvasionConfig, LoggingEventSink};
use invasion_world::map_io;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if the configuration or map cannot be loaded, the game
/// cannot be built, or the surviving map cannot be written.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let mut config = load_config()?;
    if let Some(map) = std::env::args().nth(1) {
        config.map.input = PathBuf::from(map);
    }

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        monsters = config.game.monsters,
        min_moves = config.game.min_moves,
        workers = config.game.workers,
        seed = ?config.game.seed,
        early_stop = ?config.game.early_stop,
        residence_min_ms = config.residence.min_ms,
        residence_max_ms = config.residence.max_ms,
        "Configuration loaded"
    );

    run(&config)?;
    Ok(())
}

fn run(config: &InvasionConfig) -> Result<(), EngineError> {
    // 3. Read the map.
    let atlas = map_io::read_file(&config.map.input)?;
    info!(
        path = %config.map.input.display(),
        cities = atlas.len(),
        declared = atlas.declared().len(),
        "Map loaded"
    );

    // 4. Build and run.
    let game: Game = GameBuilder::from_config(atlas, config)?
        .event_sink(Arc::new(LoggingEventSink::new()))
        .build()?;
    let summary = game.start_game()?;

    // 5. Write the surviving map.
    match &config.map.output {
        Some(path) => {
            game.write_map(path)?;
            info!(path = %path.display(), "Remaining map written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(game.render_map()?.as_bytes())?;
            stdout.flush()?;
        }
    }

    // 6. Log the summary.
    info!(summary = %serde_json::to_string(&summary)?, "invasion-engine finished");
    Ok(())
}

/// Load the configuration from `INVASION_CONFIG` or `invasion-config.yaml`.
///
/// A missing file means defaults.
fn load_config() -> Result<InvasionConfig, EngineError> {
    let path = std::env::var("INVASION_CONFIG")
        .map_or_else(|_| PathBuf::from("invasion-config.yaml"), PathBuf::from);
    if Path::new(&path).exists() {
        Ok(InvasionConfig::from_file(&path)?)
    } else {
        let mut config = InvasionConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
