//! Error types for the `invasion-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use invasion_types::{CityId, Direction};

/// Errors that can occur while building, reading or writing the city graph.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A city name was empty or contained a separator character.
    #[error("invalid city name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A city id does not belong to the atlas.
    #[error("city not found: {0}")]
    CityNotFound(CityId),

    /// The same city was declared on two different lines.
    #[error("city {name} declared twice (line {line})")]
    DuplicateCity {
        /// Name of the city.
        name: String,
        /// 1-based line of the second declaration.
        line: usize,
    },

    /// A road would lead from a city back to itself.
    #[error("city {name} cannot be its own {direction} neighbor")]
    SelfLoop {
        /// Name of the city.
        name: String,
        /// The offending direction.
        direction: Direction,
    },

    /// A map line could not be understood.
    #[error("line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A city lock was held by someone else when exclusive access was needed.
    #[error("city {name} is locked")]
    CityBusy {
        /// Name of the city.
        name: String,
    },

    /// Reading or writing a map failed.
    #[error("map I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
