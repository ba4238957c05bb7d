//! Concurrent monster invasion of a city graph.
//!
//! A [`Game`] drops monsters onto an [`Atlas`](invasion_world::Atlas) and lets
//! them wander, each on its own schedule, over a shared worker pool. Two
//! monsters meeting in a city fight; the city is destroyed and both die. The
//! game ends when every monster is trapped, tired, killed or errored.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides.
//! - [`error`] -- [`GameError`] and the per-activation [`MoveError`].
//! - [`event`] -- Fight events and the sinks that receive them.
//! - [`game`] -- The coordinator, its builder and the run summary.
//! - [`policy`] -- Placement, movement and residence policies.
//! - [`registry`] -- Which monster stands in which city.

pub mod config;
pub mod error;
pub mod event;
pub mod game;
mod monster;
pub mod policy;
pub mod registry;

pub use config::{ConfigError, EarlyStop, InvasionConfig};
pub use error::{GameError, MoveError};
pub use event::{CapturingEventSink, EventSink, FightEvent, GameEvent, LoggingEventSink};
pub use game::{Game, GameBuilder, GameSummary};
pub use policy::{
    FixedResidence, MovePolicy, PlacementPolicy, PolicyError, RandomMove, RandomPlacement,
    RandomResidence, ResidencePolicy,
};
pub use registry::OccupancyRegistry;
