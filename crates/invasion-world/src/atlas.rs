//! The city graph.
//!
//! An [`Atlas`] owns every [`City`] in a flat table indexed by [`CityId`].
//! Roads are stored as ids, so the graph has no reference cycles and a city
//! can be looked up in constant time. Cities are created on first mention,
//! whether they appear as the subject of a map line or only as someone's
//! neighbor; the cities that had a line of their own are remembered in the
//! order they were declared.

use std::collections::HashMap;

use invasion_types::{CityId, Direction};

use crate::city::City;
use crate::error::WorldError;

/// All cities of a map and the roads between them.
#[derive(Debug, Default)]
pub struct Atlas {
    cities: Vec<City>,
    by_name: HashMap<String, CityId>,
    declared: Vec<CityId>,
}

impl Atlas {
    /// Create an empty atlas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of the city called `name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidName`] if the name is not a valid city
    /// name.
    pub fn intern(&mut self, name: &str) -> Result<CityId, WorldError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        let id = CityId(self.cities.len());
        self.cities.push(City::new(id, name)?);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Record that `name` has a line of its own, creating the city if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateCity`] if the city was already
    /// declared. `line` is only used for that message.
    pub fn declare(&mut self, name: &str, line: usize) -> Result<CityId, WorldError> {
        let id = self.intern(name)?;
        if self.declared.contains(&id) {
            return Err(WorldError::DuplicateCity {
                name: name.to_owned(),
                line,
            });
        }
        self.declared.push(id);
        Ok(id)
    }

    /// Add a road from `from` going `direction` to `to`.
    ///
    /// Roads are one-way; a map that wants two-way travel lists both.
    /// Returns the previous target of that direction, if any.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CityNotFound`] for an unknown id and
    /// [`WorldError::SelfLoop`] when `from == to`.
    pub fn link(
        &mut self,
        from: CityId,
        direction: Direction,
        to: CityId,
    ) -> Result<Option<CityId>, WorldError> {
        if self.city(to).is_none() {
            return Err(WorldError::CityNotFound(to));
        }
        let city = self
            .cities
            .get_mut(from.index())
            .ok_or(WorldError::CityNotFound(from))?;
        if from == to {
            return Err(WorldError::SelfLoop {
                name: city.name().to_owned(),
                direction,
            });
        }
        Ok(city.neighbors_mut().insert(direction, to))
    }

    /// Look a city up by id.
    pub fn city(&self, id: CityId) -> Option<&City> {
        self.cities.get(id.index())
    }

    /// Look a city up by name.
    pub fn find(&self, name: &str) -> Option<&City> {
        self.by_name.get(name).and_then(|id| self.city(*id))
    }

    /// Id of the city called `name`.
    pub fn id_of(&self, name: &str) -> Option<CityId> {
        self.by_name.get(name).copied()
    }

    /// Iterate every city in id order.
    pub fn cities(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    /// Cities that had their own map line, in declaration order.
    pub fn declared(&self) -> &[CityId] {
        &self.declared
    }

    /// Number of cities.
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    /// Whether the atlas has no cities.
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}
