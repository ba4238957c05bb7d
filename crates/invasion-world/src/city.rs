//! A city and the roads leaving it.
//!
//! Each [`City`] owns its neighbor table behind its own lock. The table can
//! only be read or changed through a [`CityGuard`], which callers obtain with
//! [`City::try_lock`]. Acquisition never waits: a held lock is reported as
//! `None` and the caller decides what to do instead.

use std::hash::{Hash, Hasher};

use invasion_types::{CityId, Direction};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::WorldError;

/// Ordered `direction -> city` table with at most one entry per direction.
///
/// Entries keep the order they were inserted in so a map written back out
/// lists roads the way they were read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbors {
    edges: Vec<(Direction, CityId)>,
}

impl Neighbors {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self { edges: Vec::new() }
    }

    /// The city reached by going `direction`, if any.
    pub fn get(&self, direction: Direction) -> Option<CityId> {
        self.edges
            .iter()
            .find(|(d, _)| *d == direction)
            .map(|(_, city)| *city)
    }

    /// Point `direction` at `city`, returning the previous target.
    ///
    /// Replacing an existing direction keeps its position in the table.
    pub fn insert(&mut self, direction: Direction, city: CityId) -> Option<CityId> {
        if let Some(slot) = self.edges.iter_mut().find(|(d, _)| *d == direction) {
            return Some(std::mem::replace(&mut slot.1, city));
        }
        self.edges.push((direction, city));
        None
    }

    /// Remove the road going `direction`, returning its target.
    pub fn remove(&mut self, direction: Direction) -> Option<CityId> {
        let position = self.edges.iter().position(|(d, _)| *d == direction)?;
        Some(self.edges.remove(position).1)
    }

    /// Keep only the roads for which `keep` returns true.
    ///
    /// Returns the removed roads in table order.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<(Direction, CityId)>
    where
        F: FnMut(Direction, CityId) -> bool,
    {
        let mut removed = Vec::new();
        self.edges.retain(|&(direction, city)| {
            let kept = keep(direction, city);
            if !kept {
                removed.push((direction, city));
            }
            kept
        });
        removed
    }

    /// Iterate roads in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, CityId)> + '_ {
        self.edges.iter().copied()
    }

    /// Directions that currently have a road, in table order.
    pub fn directions(&self) -> Vec<Direction> {
        self.edges.iter().map(|(d, _)| *d).collect()
    }

    /// Number of roads.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the city has no roads at all.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A named vertex of the city graph.
///
/// Two cities are equal when their names are equal.
#[derive(Debug)]
pub struct City {
    id: CityId,
    name: String,
    neighbors: Mutex<Neighbors>,
}

impl City {
    /// Create a city with no roads.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidName`] if `name` is empty or contains
    /// whitespace or `=`.
    pub fn new(id: CityId, name: &str) -> Result<Self, WorldError> {
        validate_name(name)?;
        Ok(Self {
            id,
            name: name.to_owned(),
            neighbors: Mutex::new(Neighbors::new()),
        })
    }

    /// Position of this city in its atlas.
    pub const fn id(&self) -> CityId {
        self.id
    }

    /// The city's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to take this city's lock without waiting.
    ///
    /// Returns `None` when someone else holds it.
    pub fn try_lock(&self) -> Option<CityGuard<'_>> {
        self.neighbors
            .try_lock()
            .ok()
            .map(|neighbors| CityGuard { city: self, neighbors })
    }

    /// Exclusive access through `&mut self`, no locking needed.
    pub(crate) fn neighbors_mut(&mut self) -> &mut Neighbors {
        self.neighbors.get_mut()
    }
}

impl PartialEq for City {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for City {}

impl Hash for City {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Proof that the holder owns a city's lock.
///
/// All neighbor reads and writes go through the guard. Dropping it releases
/// the lock, including while unwinding.
#[derive(Debug)]
pub struct CityGuard<'a> {
    city: &'a City,
    neighbors: MutexGuard<'a, Neighbors>,
}

impl CityGuard<'_> {
    /// The locked city.
    pub const fn city(&self) -> &City {
        self.city
    }

    /// The city reached by going `direction`, if any.
    pub fn neighbor(&self, direction: Direction) -> Option<CityId> {
        self.neighbors.get(direction)
    }

    /// Point `direction` at `city`, returning the previous target.
    pub fn set_neighbor(&mut self, direction: Direction, city: CityId) -> Option<CityId> {
        self.neighbors.insert(direction, city)
    }

    /// Remove the road going `direction`, returning its target.
    pub fn remove_neighbor(&mut self, direction: Direction) -> Option<CityId> {
        self.neighbors.remove(direction)
    }

    /// Read-only view of every road.
    pub fn neighbors(&self) -> &Neighbors {
        &self.neighbors
    }

    /// Keep only the roads for which `keep` returns true.
    pub fn retain<F>(&mut self, keep: F) -> Vec<(Direction, CityId)>
    where
        F: FnMut(Direction, CityId) -> bool,
    {
        self.neighbors.retain(keep)
    }
}

fn validate_name(name: &str) -> Result<(), WorldError> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '=') {
        return Err(WorldError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(())
}
