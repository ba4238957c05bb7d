//! Which monster stands in which city.
//!
//! Each registry call is atomic on its own. Sequences such as "look up the
//! occupant, then move in" are only safe while the caller holds the city's
//! lock, which every writer in this crate does.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use invasion_types::{CityId, MonsterId};

/// Shared `city -> monster` map with at most one monster per city.
#[derive(Debug, Default)]
pub struct OccupancyRegistry {
    occupants: Mutex<HashMap<CityId, MonsterId>>,
}

impl OccupancyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CityId, MonsterId>> {
        self.occupants.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The monster standing in `city`, if any.
    pub fn occupant(&self, city: CityId) -> Option<MonsterId> {
        self.entries().get(&city).copied()
    }

    /// Put `monster` in `city`, returning whoever was recorded there before.
    pub fn occupy(&self, city: CityId, monster: MonsterId) -> Option<MonsterId> {
        self.entries().insert(city, monster)
    }

    /// Remove `monster` from `city` if it is the one recorded there.
    ///
    /// Returns whether an entry was removed.
    pub fn release(&self, city: CityId, monster: MonsterId) -> bool {
        let mut entries = self.entries();
        if entries.get(&city) == Some(&monster) {
            entries.remove(&city);
            return true;
        }
        false
    }

    /// Clear `city` whoever stands there.
    pub fn vacate(&self, city: CityId) -> Option<MonsterId> {
        self.entries().remove(&city)
    }

    /// Number of occupied cities.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no city is occupied.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Ordered copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<CityId, MonsterId> {
        self.entries().iter().map(|(c, m)| (*c, *m)).collect()
    }
}
