//! Shared type definitions for the monster invasion simulation.
//!
//! # Modules
//!
//! - [`ids`] -- Integer newtypes for monsters, fights and cities
//! - [`enums`] -- Compass directions and monster statuses

pub mod enums;
pub mod ids;

pub use enums::{Direction, MonsterStatus, ParseDirectionError};
pub use ids::{CityId, FightId, MonsterId};
