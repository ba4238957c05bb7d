//! City graph for the monster invasion simulation.
//!
//! Cities are vertices with up to four one-way roads, one per compass
//! direction. Each city guards its own roads with a lock that is only ever
//! taken without waiting, which is what lets many monsters walk the graph at
//! once without deadlocking.
//!
//! # Modules
//!
//! - [`atlas`] -- The graph: a flat table of cities addressed by id.
//! - [`city`] -- [`City`], its road table and the [`CityGuard`] lock guard.
//! - [`error`] -- Error types for graph construction and map I/O.
//! - [`map_io`] -- The one-city-per-line text format.

pub mod atlas;
pub mod city;
pub mod error;
pub mod map_io;

pub use atlas::Atlas;
pub use city::{City, CityGuard, Neighbors};
pub use error::WorldError;
