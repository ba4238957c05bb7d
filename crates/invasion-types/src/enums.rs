//! Enumeration types for the invasion simulation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the four compass directions a road can leave a city in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards the top of the map.
    North,
    /// Towards the bottom of the map.
    South,
    /// Towards the right of the map.
    East,
    /// Towards the left of the map.
    West,
}

impl Direction {
    /// Every direction, in map-file order.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// The direction pointing back the way this one came.
    ///
    /// `opposite` is an involution: `d.opposite().opposite() == d`.
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// The lowercase key used for this direction in map files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string did not name a direction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown direction: {input:?}")]
pub struct ParseDirectionError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|direction| direction.as_str() == s)
            .ok_or_else(|| ParseDirectionError {
                input: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Monster status
// ---------------------------------------------------------------------------

/// Lifecycle status of a monster.
///
/// A monster starts [`Active`](Self::Active). Every other status is
/// terminal: once reached it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonsterStatus {
    /// Still roaming.
    Active,
    /// Standing in a city with no road left to take.
    Trapped,
    /// Made its required number of moves.
    Tired,
    /// Lost a fight.
    Killed,
    /// Failed while working out its next move.
    Errored,
}

impl MonsterStatus {
    /// Every status, active first.
    pub const ALL: [Self; 5] = [
        Self::Active,
        Self::Trapped,
        Self::Tired,
        Self::Killed,
        Self::Errored,
    ];

    /// Whether this status ends the monster's run.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Uppercase label used in logs and summaries.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Trapped => "TRAPPED",
            Self::Tired => "TIRED",
            Self::Killed => "KILLED",
            Self::Errored => "ERRORED",
        }
    }
}

impl fmt::Display for MonsterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
