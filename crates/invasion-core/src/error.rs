//! Error types for building and running a game.
//!
//! [`GameError`] is what callers of the coordinator see. [`MoveError`] never
//! leaves a monster's activation: it is logged and turned into an
//! [`Errored`](invasion_types::MonsterStatus::Errored) status.

use invasion_types::{CityId, Direction, MonsterId};

use crate::policy::PolicyError;

/// Errors returned when constructing or starting a game.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The atlas has no cities.
    #[error("a game needs at least one city")]
    NoCities,

    /// Zero monsters were requested.
    #[error("a game needs at least one monster")]
    NoMonsters,

    /// The move budget was zero.
    #[error("monsters must make at least one move")]
    NoMoves,

    /// The worker pool size was zero.
    #[error("the worker pool needs at least one thread")]
    NoWorkers,

    /// `start_game` was called on a game that already ran.
    #[error("operation not supported: a game can only be started once")]
    AlreadyPlayed,

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {source}")]
    Runtime {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Graph access failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: invasion_world::WorldError,
    },

    /// A policy could not be constructed.
    #[error("policy error: {source}")]
    Policy {
        /// The underlying policy error.
        #[from]
        source: PolicyError,
    },
}

/// Why a single activation could not compute a move.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    /// A policy reported a failure.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The move policy picked a direction it was not offered.
    #[error("monster {monster} chose {direction}, which was not offered")]
    IllegalDirection {
        /// The monster.
        monster: MonsterId,
        /// The direction it picked.
        direction: Direction,
    },

    /// The placement policy picked a city that was not a candidate.
    #[error("monster {monster} was placed in city {city}, which was not offered")]
    InvalidPlacement {
        /// The monster.
        monster: MonsterId,
        /// The city it picked.
        city: CityId,
    },

    /// A city id does not belong to the atlas.
    #[error("city not found: {0}")]
    UnknownCity(CityId),

    /// A monster id does not belong to the game.
    #[error("monster not found: {0}")]
    UnknownMonster(MonsterId),
}
