//! Type-safe identifier wrappers.
//!
//! Monsters and fights are numbered from 1 in creation order. Cities are
//! addressed by a dense index into the atlas that owns them, so a city
//! reference never keeps the graph alive on its own.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around an integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a monster. The first monster is `1`.
    MonsterId(u64)
}

define_id! {
    /// Identifier of a fight, assigned from `1` in the order fights occur.
    FightId(u64)
}

define_id! {
    /// Position of a city inside its atlas.
    CityId(usize)
}

impl CityId {
    /// The index this id occupies in the atlas city table.
    pub const fn index(self) -> usize {
        self.0
    }
}
