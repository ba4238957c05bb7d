//! Pluggable decisions: where monsters start, which road they take, and how
//! long they rest between moves.
//!
//! The coordinator only talks to the [`PlacementPolicy`], [`MovePolicy`] and
//! [`ResidencePolicy`] traits. The random implementations here are the
//! defaults; passing a seed makes their choices repeatable. Closures with the
//! matching signature implement the traits too, which keeps test setups short.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use invasion_types::{CityId, Direction, MonsterId};
use invasion_world::City;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Longest rest a monster may take between two moves.
pub const RESIDENCE_CEILING: Duration = Duration::from_millis(1000);

/// Errors produced by policies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Residence bounds fall outside `0..=1000` ms or are inverted.
    #[error("residence bounds {min_ms}..={max_ms} ms are outside 0..=1000 ms")]
    ResidenceOutOfRange {
        /// Requested lower bound in milliseconds.
        min_ms: u128,
        /// Requested upper bound in milliseconds.
        max_ms: u128,
    },

    /// The policy was asked to choose from an empty set.
    #[error("no candidates to choose from")]
    NoCandidates,

    /// The policy declined to decide.
    #[error("policy rejected the request: {reason}")]
    Rejected {
        /// Why.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Chooses the city a monster starts in.
pub trait PlacementPolicy: Send + Sync {
    /// Pick one of `candidates` (never empty) for `monster`.
    ///
    /// # Errors
    ///
    /// Any error makes the monster [`Errored`](invasion_types::MonsterStatus::Errored).
    fn place(&self, monster: MonsterId, candidates: &[&City]) -> Result<CityId, PolicyError>;
}

/// Chooses which road a monster takes out of its city.
pub trait MovePolicy: Send + Sync {
    /// Pick one of `directions` (at least two) for `monster`.
    ///
    /// # Errors
    ///
    /// Any error, or an answer outside `directions`, makes the monster
    /// [`Errored`](invasion_types::MonsterStatus::Errored).
    fn choose(&self, monster: MonsterId, directions: &[Direction])
    -> Result<Direction, PolicyError>;
}

/// Decides how long a monster waits before its next activation.
pub trait ResidencePolicy: Send + Sync {
    /// Delay before `monster` acts again.
    fn residence(&self, monster: MonsterId) -> Duration;
}

impl<F> PlacementPolicy for F
where
    F: Fn(MonsterId, &[&City]) -> Result<CityId, PolicyError> + Send + Sync,
{
    fn place(&self, monster: MonsterId, candidates: &[&City]) -> Result<CityId, PolicyError> {
        self(monster, candidates)
    }
}

impl<F> MovePolicy for F
where
    F: Fn(MonsterId, &[Direction]) -> Result<Direction, PolicyError> + Send + Sync,
{
    fn choose(
        &self,
        monster: MonsterId,
        directions: &[Direction],
    ) -> Result<Direction, PolicyError> {
        self(monster, directions)
    }
}

impl<F> ResidencePolicy for F
where
    F: Fn(MonsterId) -> Duration + Send + Sync,
{
    fn residence(&self, monster: MonsterId) -> Duration {
        self(monster)
    }
}

// ---------------------------------------------------------------------------
// Random implementations
// ---------------------------------------------------------------------------

fn seeded(seed: Option<u64>) -> Mutex<StdRng> {
    Mutex::new(seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64))
}

/// Uniform choice among the candidate cities.
#[derive(Debug)]
pub struct RandomPlacement {
    rng: Mutex<StdRng>,
}

impl RandomPlacement {
    /// Create a placement policy, seeded for repeatable runs if `seed` is set.
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: seeded(seed) }
    }
}

impl PlacementPolicy for RandomPlacement {
    fn place(&self, _monster: MonsterId, candidates: &[&City]) -> Result<CityId, PolicyError> {
        if candidates.is_empty() {
            return Err(PolicyError::NoCandidates);
        }
        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..candidates.len());
        candidates
            .get(index)
            .map(|city| city.id())
            .ok_or(PolicyError::NoCandidates)
    }
}

/// Uniform choice among the offered directions.
#[derive(Debug)]
pub struct RandomMove {
    rng: Mutex<StdRng>,
}

impl RandomMove {
    /// Create a move policy, seeded for repeatable runs if `seed` is set.
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: seeded(seed) }
    }
}

impl MovePolicy for RandomMove {
    fn choose(
        &self,
        _monster: MonsterId,
        directions: &[Direction],
    ) -> Result<Direction, PolicyError> {
        if directions.is_empty() {
            return Err(PolicyError::NoCandidates);
        }
        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..directions.len());
        directions
            .get(index)
            .copied()
            .ok_or(PolicyError::NoCandidates)
    }
}

fn check_bounds(min: Duration, max: Duration) -> Result<(), PolicyError> {
    if min > max || max > RESIDENCE_CEILING {
        return Err(PolicyError::ResidenceOutOfRange {
            min_ms: min.as_millis(),
            max_ms: max.as_millis(),
        });
    }
    Ok(())
}

/// Uniformly random rest within fixed bounds, at millisecond granularity.
#[derive(Debug)]
pub struct RandomResidence {
    min_ms: u64,
    max_ms: u64,
    rng: Mutex<StdRng>,
}

impl RandomResidence {
    /// Create a policy resting between `min` and `max`, both inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ResidenceOutOfRange`] if `min > max` or `max`
    /// exceeds [`RESIDENCE_CEILING`].
    pub fn new(min: Duration, max: Duration, seed: Option<u64>) -> Result<Self, PolicyError> {
        check_bounds(min, max)?;
        // Both bounds are at most 1000 ms here.
        let min_ms = u64::try_from(min.as_millis()).unwrap_or(0);
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(0);
        Ok(Self {
            min_ms,
            max_ms,
            rng: seeded(seed),
        })
    }
}

impl ResidencePolicy for RandomResidence {
    fn residence(&self, _monster: MonsterId) -> Duration {
        let ms = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

/// The same rest every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedResidence {
    delay: Duration,
}

impl FixedResidence {
    /// Create a policy that always rests for `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ResidenceOutOfRange`] if `delay` exceeds
    /// [`RESIDENCE_CEILING`].
    pub fn new(delay: Duration) -> Result<Self, PolicyError> {
        check_bounds(delay, delay)?;
        Ok(Self { delay })
    }
}

impl ResidencePolicy for FixedResidence {
    fn residence(&self, _monster: MonsterId) -> Duration {
        self.delay
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cities(names: &[&str]) -> Vec<City> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| City::new(CityId(i), name).unwrap())
            .collect()
    }

    #[test]
    fn random_placement_picks_a_candidate() {
        let owned = cities(&["A", "B", "C"]);
        let candidates: Vec<&City> = owned.iter().collect();
        let policy = RandomPlacement::new(Some(7));
        for monster in 1..=50 {
            let city = policy.place(MonsterId(monster), &candidates).unwrap();
            assert!(city.index() < 3);
        }
    }

    #[test]
    fn random_placement_rejects_empty_candidates() {
        let policy = RandomPlacement::new(None);
        assert_eq!(
            policy.place(MonsterId(1), &[]).unwrap_err(),
            PolicyError::NoCandidates
        );
    }

    #[test]
    fn seeded_moves_repeat() {
        let offered = Direction::ALL;
        let first = RandomMove::new(Some(99));
        let second = RandomMove::new(Some(99));
        for monster in 1..=20 {
            assert_eq!(
                first.choose(MonsterId(monster), &offered).unwrap(),
                second.choose(MonsterId(monster), &offered).unwrap()
            );
        }
    }

    #[test]
    fn random_move_stays_within_offer() {
        let offered = [Direction::East, Direction::South];
        let policy = RandomMove::new(Some(3));
        for _ in 0..50 {
            assert!(offered.contains(&policy.choose(MonsterId(1), &offered).unwrap()));
        }
    }

    #[test]
    fn random_residence_stays_in_bounds() {
        let policy = RandomResidence::new(
            Duration::from_millis(5),
            Duration::from_millis(15),
            Some(1),
        )
        .unwrap();
        for _ in 0..100 {
            let delay = policy.residence(MonsterId(1));
            assert!(delay >= Duration::from_millis(5));
            assert!(delay <= Duration::from_millis(15));
        }
    }

    #[test]
    fn residence_bounds_are_checked() {
        assert!(RandomResidence::new(Duration::ZERO, Duration::from_millis(1000), None).is_ok());
        assert!(
            RandomResidence::new(Duration::ZERO, Duration::from_millis(1001), None).is_err()
        );
        assert!(
            RandomResidence::new(Duration::from_millis(20), Duration::from_millis(10), None)
                .is_err()
        );
        assert!(FixedResidence::new(Duration::from_millis(1000)).is_ok());
        assert!(matches!(
            FixedResidence::new(Duration::from_secs(2)).unwrap_err(),
            PolicyError::ResidenceOutOfRange { min_ms: 2000, .. }
        ));
    }

    #[test]
    fn closures_are_policies() {
        let residence = |monster: MonsterId| Duration::from_millis(monster.into_inner());
        assert_eq!(
            ResidencePolicy::residence(&residence, MonsterId(4)),
            Duration::from_millis(4)
        );

        let movement = |_: MonsterId, offered: &[Direction]| -> Result<Direction, PolicyError> {
            offered.last().copied().ok_or(PolicyError::NoCandidates)
        };
        assert_eq!(
            movement
                .choose(MonsterId(1), &[Direction::North, Direction::West])
                .unwrap(),
            Direction::West
        );
    }
}
