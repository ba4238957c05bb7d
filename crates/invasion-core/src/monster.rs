//! Monsters and a single monster activation.
//!
//! A monster is split in two. The shared [`Monster`] holds its id and status;
//! other monsters may change that status (to killed) on its behalf. The
//! private [`Itinerary`] holds where it stands and how far it has walked. It
//! is moved from one scheduled activation to the next and never shared.
//!
//! [`activate`] runs one step: stop if already finished, retire when tired,
//! otherwise try to move. Locks are only ever tried, never waited on; if one
//! is held the step ends with [`Step::Retry`] and the monster tries again
//! after another rest.

use std::sync::atomic::{AtomicU8, Ordering};

use invasion_types::{CityId, Direction, MonsterId, MonsterStatus};
use invasion_world::{City, CityGuard};
use tracing::{debug, warn};

use crate::error::MoveError;
use crate::game::Coordinator;

/// Shared part of a monster: identity and status.
#[derive(Debug)]
pub struct Monster {
    id: MonsterId,
    status: AtomicU8,
}

impl Monster {
    pub(crate) const fn new(id: MonsterId) -> Self {
        Self {
            id,
            status: AtomicU8::new(encode(MonsterStatus::Active)),
        }
    }

    /// The monster's id.
    pub const fn id(&self) -> MonsterId {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> MonsterStatus {
        decode(self.status.load(Ordering::Acquire))
    }

    /// Move from active to `status`.
    ///
    /// Only the first terminal transition succeeds; later calls, and calls
    /// with [`MonsterStatus::Active`], return false.
    pub(crate) fn retire(&self, status: MonsterStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }
        self.status
            .compare_exchange(
                encode(MonsterStatus::Active),
                encode(status),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

const fn encode(status: MonsterStatus) -> u8 {
    match status {
        MonsterStatus::Active => 0,
        MonsterStatus::Trapped => 1,
        MonsterStatus::Tired => 2,
        MonsterStatus::Killed => 3,
        MonsterStatus::Errored => 4,
    }
}

const fn decode(raw: u8) -> MonsterStatus {
    match raw {
        0 => MonsterStatus::Active,
        1 => MonsterStatus::Trapped,
        2 => MonsterStatus::Tired,
        3 => MonsterStatus::Killed,
        _ => MonsterStatus::Errored,
    }
}

/// Private, per-activation state of a monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Itinerary {
    pub(crate) monster: MonsterId,
    /// `None` until the monster is placed.
    pub(crate) city: Option<CityId>,
    /// Successful moves from one city to another.
    pub(crate) moves: u64,
}

impl Itinerary {
    pub(crate) const fn new(monster: MonsterId) -> Self {
        Self {
            monster,
            city: None,
            moves: 0,
        }
    }
}

/// Outcome of one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Moved in or was placed; act again after a rest.
    Settled(Itinerary),
    /// A lock was held or the target vanished; try the same thing again.
    Retry(Itinerary),
    /// Reached a terminal status. No further activation.
    Halted(MonsterStatus),
}

/// Run one activation of `itinerary`'s monster.
///
/// Errors are contained here: the monster becomes errored and the step ends.
pub(crate) fn activate(itinerary: Itinerary, coordinator: &Coordinator) -> Step {
    let monster = itinerary.monster;
    match try_activate(itinerary, coordinator) {
        Ok(step) => step,
        Err(e) => {
            warn!(monster = %monster, error = %e, "Monster failed to move");
            Step::Halted(coordinator.finish(monster, MonsterStatus::Errored))
        }
    }
}

fn try_activate(itinerary: Itinerary, coordinator: &Coordinator) -> Result<Step, MoveError> {
    let id = itinerary.monster;
    let monster = coordinator
        .monster(id)
        .ok_or(MoveError::UnknownMonster(id))?;

    let status = monster.status();
    if status.is_terminal() {
        return Ok(Step::Halted(status));
    }
    if itinerary.moves >= coordinator.min_moves() || coordinator.should_stop_early() {
        return Ok(Step::Halted(coordinator.finish(id, MonsterStatus::Tired)));
    }

    match itinerary.city {
        None => place(itinerary, coordinator),
        Some(origin) => advance(itinerary, origin, coordinator),
    }
}

fn place(itinerary: Itinerary, coordinator: &Coordinator) -> Result<Step, MoveError> {
    let id = itinerary.monster;
    let candidates: Vec<&City> = coordinator.active_cities().collect();
    if candidates.is_empty() {
        return Ok(Step::Halted(coordinator.finish(id, MonsterStatus::Trapped)));
    }

    let start = coordinator.placement().place(id, &candidates)?;
    let Some(city) = candidates.iter().find(|city| city.id() == start) else {
        return Err(MoveError::InvalidPlacement {
            monster: id,
            city: start,
        });
    };
    let Some(destination) = city.try_lock() else {
        debug!(monster = %id, city = city.name(), "Start city busy, retrying");
        return Ok(Step::Retry(itinerary));
    };
    Ok(enter(itinerary, None, &destination, coordinator))
}

fn advance(
    itinerary: Itinerary,
    origin: CityId,
    coordinator: &Coordinator,
) -> Result<Step, MoveError> {
    let id = itinerary.monster;
    let here = coordinator
        .atlas()
        .city(origin)
        .ok_or(MoveError::UnknownCity(origin))?;
    let Some(mut guard) = here.try_lock() else {
        debug!(monster = %id, city = here.name(), "Own city busy, retrying");
        return Ok(Step::Retry(itinerary));
    };

    // Another monster may have entered this city and won while we waited.
    let status = coordinator.status(id);
    if status.is_terminal() {
        return Ok(Step::Halted(status));
    }

    let pruned = guard.retain(|_, target| !coordinator.is_destroyed(target));
    for (direction, target) in &pruned {
        debug!(city = here.name(), direction = %direction, target = %target, "Pruned road to destroyed city");
    }

    let offered = guard.neighbors().directions();
    let direction = match offered.as_slice() {
        [] => {
            debug!(monster = %id, city = here.name(), "Monster trapped");
            return Ok(Step::Halted(coordinator.finish(id, MonsterStatus::Trapped)));
        }
        [only] => *only,
        _ => choose(id, &offered, coordinator)?,
    };

    let next = guard
        .neighbor(direction)
        .ok_or(MoveError::IllegalDirection {
            monster: id,
            direction,
        })?;
    let there = coordinator
        .atlas()
        .city(next)
        .ok_or(MoveError::UnknownCity(next))?;
    let Some(destination) = there.try_lock() else {
        debug!(monster = %id, city = there.name(), "Destination busy, retrying");
        return Ok(Step::Retry(itinerary));
    };
    Ok(enter(itinerary, Some(origin), &destination, coordinator))
}

fn choose(
    id: MonsterId,
    offered: &[Direction],
    coordinator: &Coordinator,
) -> Result<Direction, MoveError> {
    let direction = coordinator.movement().choose(id, offered)?;
    if offered.contains(&direction) {
        Ok(direction)
    } else {
        Err(MoveError::IllegalDirection {
            monster: id,
            direction,
        })
    }
}

/// Walk into a locked destination: settle if it is empty, fight otherwise.
fn enter(
    mut itinerary: Itinerary,
    origin: Option<CityId>,
    destination: &CityGuard<'_>,
    coordinator: &Coordinator,
) -> Step {
    let id = itinerary.monster;
    let city = destination.city();
    if coordinator.is_destroyed(city.id()) {
        return Step::Retry(itinerary);
    }

    if let Some(occupant) = coordinator.registry().occupant(city.id()) {
        coordinator.fight(city, id, occupant, origin);
        return Step::Halted(coordinator.status(id));
    }

    if let Some(previous) = origin {
        coordinator.registry().release(previous, id);
        itinerary.moves = itinerary.moves.saturating_add(1);
    }
    coordinator.registry().occupy(city.id(), id);
    itinerary.city = Some(city.id());
    debug!(monster = %id, city = city.name(), moves = itinerary.moves, "Monster moved");
    Step::Settled(itinerary)
}
