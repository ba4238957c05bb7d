//! The coordinator: builds a game, runs every monster to completion, and
//! answers questions about the aftermath.
//!
//! A [`Game`] owns a fixed-size tokio worker pool. Each monster always has
//! exactly one pending activation: a task that sleeps for the monster's
//! residence and then runs one step of the monster. Activations never wait
//! on a lock; contention turns into another scheduled attempt.
//! `start_game` blocks the caller until every monster has reported a
//! terminal status, then shuts the pool down and removes every remaining
//! road into a destroyed city.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use invasion_types::{CityId, FightId, MonsterId, MonsterStatus};
use invasion_world::{Atlas, City, WorldError, map_io};
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::config::{EarlyStop, InvasionConfig};
use crate::error::GameError;
use crate::event::{EventSink, FightEvent, GameEvent, LoggingEventSink};
use crate::monster::{self, Itinerary, Monster, Step};
use crate::policy::{
    FixedResidence, MovePolicy, PlacementPolicy, RESIDENCE_CEILING, RandomMove,
    RandomPlacement, RandomResidence, ResidencePolicy,
};
use crate::registry::OccupancyRegistry;

/// Default number of moves before a monster is tired.
pub const DEFAULT_MIN_MOVES: u64 = 10_000;

/// Default worker pool size.
pub const DEFAULT_WORKERS: usize = 4;

/// Default upper bound of the random rest between moves.
pub const DEFAULT_MAX_RESIDENCE: Duration = Duration::from_millis(10);

/// How long `start_game` waits for in-flight activations when shutting down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Everything monsters share while the game runs.
pub(crate) struct Coordinator {
    atlas: Atlas,
    destroyed: Vec<AtomicBool>,
    destruction_order: Mutex<Vec<CityId>>,
    registry: OccupancyRegistry,
    monsters: Vec<Monster>,
    min_moves: u64,
    early_stop: EarlyStop,
    placement: Arc<dyn PlacementPolicy>,
    movement: Arc<dyn MovePolicy>,
    residence: Arc<dyn ResidencePolicy>,
    events: Arc<dyn EventSink>,
    next_fight: AtomicU64,
    settled: AtomicUsize,
    all_settled: Notify,
}

impl Coordinator {
    pub(crate) const fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub(crate) const fn registry(&self) -> &OccupancyRegistry {
        &self.registry
    }

    pub(crate) fn placement(&self) -> &dyn PlacementPolicy {
        self.placement.as_ref()
    }

    pub(crate) fn movement(&self) -> &dyn MovePolicy {
        self.movement.as_ref()
    }

    pub(crate) const fn min_moves(&self) -> u64 {
        self.min_moves
    }

    pub(crate) fn monster(&self, id: MonsterId) -> Option<&Monster> {
        let index = usize::try_from(id.into_inner().checked_sub(1)?).ok()?;
        self.monsters.get(index)
    }

    pub(crate) fn status(&self, id: MonsterId) -> MonsterStatus {
        self.monster(id)
            .map_or(MonsterStatus::Errored, Monster::status)
    }

    // -----------------------------------------------------------------------
    // City set
    // -----------------------------------------------------------------------

    /// Constant-time liveness check. Unknown ids count as destroyed.
    pub(crate) fn is_destroyed(&self, city: CityId) -> bool {
        self.destroyed
            .get(city.index())
            .is_none_or(|flag| flag.load(Ordering::Acquire))
    }

    pub(crate) fn active_cities(&self) -> impl Iterator<Item = &City> {
        self.atlas
            .cities()
            .filter(|city| !self.is_destroyed(city.id()))
    }

    /// Mark `city` destroyed and clear its registry entry.
    ///
    /// Returns false if it was already destroyed. Roads of other cities are
    /// left alone; they are pruned lazily and by the final cleanup.
    pub(crate) fn destroy_city(&self, city: CityId) -> bool {
        let Some(flag) = self.destroyed.get(city.index()) else {
            return false;
        };
        if flag.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.destruction_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(city);
        self.registry.vacate(city);
        true
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    /// Move `monster` to a terminal `status`, reporting it once.
    ///
    /// Returns the monster's status afterwards, which is the earlier terminal
    /// status if it had already finished.
    pub(crate) fn finish(&self, id: MonsterId, status: MonsterStatus) -> MonsterStatus {
        let Some(monster) = self.monster(id) else {
            return status;
        };
        if monster.retire(status) {
            debug!(monster = %id, status = %status, "Monster finished");
            let settled = self.settled.fetch_add(1, Ordering::AcqRel).saturating_add(1);
            if settled >= self.monsters.len() {
                self.all_settled.notify_one();
            }
        }
        monster.status()
    }

    pub(crate) fn settled(&self) -> usize {
        self.settled.load(Ordering::Acquire)
    }

    fn still_active(&self) -> usize {
        self.monsters.len().saturating_sub(self.settled())
    }

    pub(crate) fn should_stop_early(&self) -> bool {
        match self.early_stop {
            EarlyStop::Disabled => false,
            EarlyStop::LoneSurvivor => self.still_active() <= 1,
        }
    }

    async fn wait_until_settled(&self) {
        loop {
            let notified = self.all_settled.notified();
            if self.settled() >= self.monsters.len() {
                return;
            }
            notified.await;
        }
    }

    // -----------------------------------------------------------------------
    // Fights
    // -----------------------------------------------------------------------

    /// Resolve `mover` walking into `city`, held by `occupant`.
    ///
    /// The caller holds `city`'s lock.
    pub(crate) fn fight(
        &self,
        city: &City,
        mover: MonsterId,
        occupant: MonsterId,
        origin: Option<CityId>,
    ) {
        let fight = FightId(self.next_fight.fetch_add(1, Ordering::AcqRel));
        self.finish(occupant, MonsterStatus::Killed);
        self.destroy_city(city.id());
        if let Some(origin) = origin {
            self.registry.release(origin, mover);
        }
        self.finish(mover, MonsterStatus::Killed);

        // Sinks run after the board is settled; a failing sink cannot undo it.
        let event = FightEvent::new(fight, city.id(), city.name(), mover, occupant);
        self.events.handle(&GameEvent::Fight(event));
    }

    fn fights(&self) -> u64 {
        self.next_fight.load(Ordering::Acquire).saturating_sub(1)
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Run `itinerary`'s next activation after its residence.
    ///
    /// Must be called from inside the worker pool.
    fn schedule(self: &Arc<Self>, itinerary: Itinerary) {
        let id = itinerary.monster;
        let delay = match panic::catch_unwind(AssertUnwindSafe(|| self.residence.residence(id))) {
            Ok(delay) => delay.min(RESIDENCE_CEILING),
            Err(payload) => {
                error!(monster = %id, reason = %panic_reason(payload.as_ref()), "Residence policy panicked");
                self.finish(id, MonsterStatus::Errored);
                return;
            }
        };
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.run(itinerary);
        });
    }

    fn run(self: &Arc<Self>, itinerary: Itinerary) {
        let id = itinerary.monster;
        match panic::catch_unwind(AssertUnwindSafe(|| monster::activate(itinerary, self))) {
            Ok(Step::Settled(next) | Step::Retry(next)) => self.schedule(next),
            Ok(Step::Halted(_)) => {}
            Err(payload) => {
                error!(monster = %id, reason = %panic_reason(payload.as_ref()), "Monster activation panicked");
                self.finish(id, MonsterStatus::Errored);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cleanup
    // -----------------------------------------------------------------------

    /// Remove every road from an active city into a destroyed one.
    ///
    /// Returns how many roads were removed; a second call returns 0.
    pub(crate) fn sever_destroyed_links(&self) -> Result<usize, WorldError> {
        let mut severed = 0_usize;
        for city in self.active_cities() {
            let mut guard = city.try_lock().ok_or_else(|| WorldError::CityBusy {
                name: city.name().to_owned(),
            })?;
            let removed = guard.retain(|_, target| !self.is_destroyed(target));
            for (direction, target) in &removed {
                debug!(city = city.name(), direction = %direction, target = %target, "Severed road");
            }
            severed = severed.saturating_add(removed.len());
        }
        Ok(severed)
    }
}

/// Message carried by a caught panic, or empty if it is not a string.
fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// What a finished game looks like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    /// Number of monsters.
    pub monsters: usize,
    /// Monsters per status. Every status is present.
    pub statuses: BTreeMap<MonsterStatus, usize>,
    /// Fights fought.
    pub fights: u64,
    /// Cities still standing, including those only named as neighbors.
    pub active_cities: usize,
    /// Standing cities that had their own map line; the remaining map lists
    /// exactly these.
    pub mapped_cities: usize,
    /// Cities destroyed.
    pub destroyed_cities: usize,
    /// Roads removed by the final cleanup.
    pub severed_links: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl GameSummary {
    /// Number of monsters with `status`.
    pub fn count(&self, status: MonsterStatus) -> usize {
        self.statuses.get(&status).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A monster invasion of one map. Runs once.
pub struct Game {
    coordinator: Arc<Coordinator>,
    runtime: Mutex<Option<Runtime>>,
    workers: usize,
    summary: OnceLock<GameSummary>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("cities", &self.coordinator.atlas.len())
            .field("monsters", &self.coordinator.monsters.len())
            .field("workers", &self.workers)
            .field("settled", &self.coordinator.settled())
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Start configuring a game of `monsters` monsters on `atlas`.
    pub fn builder(atlas: Atlas, monsters: u64) -> GameBuilder {
        GameBuilder::new(atlas, monsters)
    }

    pub(crate) fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Run the invasion to completion.
    ///
    /// Blocks until every monster is trapped, tired, killed or errored, then
    /// severs all roads into destroyed cities.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::AlreadyPlayed`] on any call after the first, and
    /// [`GameError::World`] if the cleanup finds a city still locked.
    pub fn start_game(&self) -> Result<GameSummary, GameError> {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(GameError::AlreadyPlayed)?;

        let started = Instant::now();
        info!(
            cities = self.coordinator.atlas.len(),
            monsters = self.coordinator.monsters.len(),
            workers = self.workers,
            min_moves = self.coordinator.min_moves,
            "Invasion starting"
        );

        let coordinator = Arc::clone(&self.coordinator);
        runtime.block_on(async move {
            for monster in &coordinator.monsters {
                coordinator.schedule(Itinerary::new(monster.id()));
            }
            coordinator.wait_until_settled().await;
        });
        runtime.shutdown_timeout(SHUTDOWN_GRACE);

        let severed = self.coordinator.sever_destroyed_links()?;
        let summary = GameSummary {
            monsters: self.coordinator.monsters.len(),
            statuses: self.status_counts(),
            fights: self.fights(),
            active_cities: self.coordinator.active_cities().count(),
            mapped_cities: self
                .coordinator
                .atlas
                .declared()
                .iter()
                .filter(|id| !self.coordinator.is_destroyed(**id))
                .count(),
            destroyed_cities: self.destroyed_cities().len(),
            severed_links: severed,
            elapsed: started.elapsed(),
        };
        info!(
            fights = summary.fights,
            active_cities = summary.active_cities,
            mapped_cities = summary.mapped_cities,
            destroyed_cities = summary.destroyed_cities,
            trapped = summary.count(MonsterStatus::Trapped),
            tired = summary.count(MonsterStatus::Tired),
            killed = summary.count(MonsterStatus::Killed),
            errored = summary.count(MonsterStatus::Errored),
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Invasion finished"
        );
        // `take()` above guarantees this is the only writer.
        let _ = self.summary.set(summary.clone());
        Ok(summary)
    }

    /// Summary of the finished run, if there was one.
    pub fn summary(&self) -> Option<&GameSummary> {
        self.summary.get()
    }

    /// The map being invaded.
    pub fn atlas(&self) -> &Atlas {
        &self.coordinator.atlas
    }

    /// Whether `city` has been destroyed.
    pub fn is_destroyed(&self, city: CityId) -> bool {
        self.coordinator.is_destroyed(city)
    }

    /// Cities still standing, in atlas order.
    pub fn active_cities(&self) -> Vec<&City> {
        self.coordinator.active_cities().collect()
    }

    /// Destroyed cities, in the order they fell.
    pub fn destroyed_cities(&self) -> Vec<&City> {
        self.coordinator
            .destruction_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|id| self.coordinator.atlas.city(*id))
            .collect()
    }

    /// Status of every monster.
    pub fn monster_statuses(&self) -> BTreeMap<MonsterId, MonsterStatus> {
        self.coordinator
            .monsters
            .iter()
            .map(|monster| (monster.id(), monster.status()))
            .collect()
    }

    /// Number of monsters per status, including zero counts.
    pub fn status_counts(&self) -> BTreeMap<MonsterStatus, usize> {
        let mut counts: BTreeMap<MonsterStatus, usize> =
            MonsterStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for monster in &self.coordinator.monsters {
            let count = counts.entry(monster.status()).or_insert(0);
            *count = count.saturating_add(1);
        }
        counts
    }

    /// Which monster stands where.
    pub fn occupancy(&self) -> BTreeMap<CityId, MonsterId> {
        self.coordinator.registry.snapshot()
    }

    /// Number of fights so far.
    pub fn fights(&self) -> u64 {
        self.coordinator.fights()
    }

    /// Remove every road from a standing city into a destroyed one.
    ///
    /// `start_game` already does this; calling it again changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::World`] if a city is locked, which only happens
    /// while the game is still running.
    pub fn sever_destroyed_links(&self) -> Result<usize, GameError> {
        Ok(self.coordinator.sever_destroyed_links()?)
    }

    /// The surviving map in map-file format.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::World`] if a city is locked.
    pub fn render_map(&self) -> Result<String, GameError> {
        let coordinator = &self.coordinator;
        Ok(map_io::render(&coordinator.atlas, |id| {
            !coordinator.is_destroyed(id)
        })?)
    }

    /// Write the surviving map to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::World`] if a city is locked or writing fails.
    pub fn write_map(&self, path: &Path) -> Result<(), GameError> {
        let coordinator = &self.coordinator;
        map_io::write_file(path, &coordinator.atlas, |id| {
            !coordinator.is_destroyed(id)
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and validates a [`Game`].
///
/// Policies left unset default to [`RandomPlacement`], [`RandomMove`], a
/// [`RandomResidence`] of up to [`DEFAULT_MAX_RESIDENCE`] and the
/// [`LoggingEventSink`].
pub struct GameBuilder {
    atlas: Atlas,
    monsters: u64,
    min_moves: u64,
    workers: usize,
    early_stop: EarlyStop,
    placement: Option<Arc<dyn PlacementPolicy>>,
    movement: Option<Arc<dyn MovePolicy>>,
    residence: Option<Arc<dyn ResidencePolicy>>,
    events: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for GameBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameBuilder")
            .field("cities", &self.atlas.len())
            .field("monsters", &self.monsters)
            .field("min_moves", &self.min_moves)
            .field("workers", &self.workers)
            .field("early_stop", &self.early_stop)
            .finish_non_exhaustive()
    }
}

impl GameBuilder {
    fn new(atlas: Atlas, monsters: u64) -> Self {
        Self {
            atlas,
            monsters,
            min_moves: DEFAULT_MIN_MOVES,
            workers: DEFAULT_WORKERS,
            early_stop: EarlyStop::Disabled,
            placement: None,
            movement: None,
            residence: None,
            events: None,
        }
    }

    /// Builder populated from configuration, with seeded random policies.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Policy`] if the residence bounds are invalid.
    pub fn from_config(atlas: Atlas, config: &InvasionConfig) -> Result<Self, GameError> {
        let seed = config.game.seed;
        let residence: Arc<dyn ResidencePolicy> =
            if config.residence.min_ms == config.residence.max_ms {
                Arc::new(FixedResidence::new(config.residence.min())?)
            } else {
                Arc::new(RandomResidence::new(
                    config.residence.min(),
                    config.residence.max(),
                    seed.map(|s| s.wrapping_add(2)),
                )?)
            };
        let mut builder = Self::new(atlas, config.game.monsters)
            .min_moves(config.game.min_moves)
            .workers(config.game.workers)
            .early_stop(config.game.early_stop)
            .placement(RandomPlacement::new(seed))
            .movement(RandomMove::new(seed.map(|s| s.wrapping_add(1))));
        builder.residence = Some(residence);
        Ok(builder)
    }

    /// Moves each monster makes before it is tired.
    #[must_use]
    pub const fn min_moves(mut self, min_moves: u64) -> Self {
        self.min_moves = min_moves;
        self
    }

    /// Size of the worker pool.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Stopping rule for the last monsters standing.
    #[must_use]
    pub const fn early_stop(mut self, early_stop: EarlyStop) -> Self {
        self.early_stop = early_stop;
        self
    }

    /// Where monsters start.
    #[must_use]
    pub fn placement(mut self, policy: impl PlacementPolicy + 'static) -> Self {
        self.placement = Some(Arc::new(policy));
        self
    }

    /// Which road monsters take.
    #[must_use]
    pub fn movement(mut self, policy: impl MovePolicy + 'static) -> Self {
        self.movement = Some(Arc::new(policy));
        self
    }

    /// How long monsters rest between moves.
    #[must_use]
    pub fn residence(mut self, policy: impl ResidencePolicy + 'static) -> Self {
        self.residence = Some(Arc::new(policy));
        self
    }

    /// Who hears about fights.
    #[must_use]
    pub fn event_sink<S: EventSink + 'static>(mut self, sink: Arc<S>) -> Self {
        let sink: Arc<dyn EventSink> = sink;
        self.events = Some(sink);
        self
    }

    /// Validate the settings and create the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NoCities`], [`GameError::NoMonsters`],
    /// [`GameError::NoMoves`] or [`GameError::NoWorkers`] for invalid
    /// settings, and [`GameError::Runtime`] if the pool cannot start.
    pub fn build(self) -> Result<Game, GameError> {
        if self.atlas.is_empty() {
            return Err(GameError::NoCities);
        }
        if self.monsters == 0 {
            return Err(GameError::NoMonsters);
        }
        if self.min_moves == 0 {
            return Err(GameError::NoMoves);
        }
        if self.workers == 0 {
            return Err(GameError::NoWorkers);
        }

        let residence: Arc<dyn ResidencePolicy> = match self.residence {
            Some(policy) => policy,
            None => Arc::new(RandomResidence::new(
                Duration::ZERO,
                DEFAULT_MAX_RESIDENCE,
                None,
            )?),
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.workers)
            .thread_name("invasion-worker")
            .enable_time()
            .build()?;

        let destroyed = self.atlas.cities().map(|_| AtomicBool::new(false)).collect();
        let monsters = (1..=self.monsters)
            .map(|n| Monster::new(MonsterId(n)))
            .collect();
        let coordinator = Coordinator {
            atlas: self.atlas,
            destroyed,
            destruction_order: Mutex::new(Vec::new()),
            registry: OccupancyRegistry::new(),
            monsters,
            min_moves: self.min_moves,
            early_stop: self.early_stop,
            placement: self
                .placement
                .unwrap_or_else(|| Arc::new(RandomPlacement::new(None))),
            movement: self
                .movement
                .unwrap_or_else(|| Arc::new(RandomMove::new(None))),
            residence,
            events: self
                .events
                .unwrap_or_else(|| Arc::new(LoggingEventSink::new())),
            next_fight: AtomicU64::new(1),
            settled: AtomicUsize::new(0),
            all_settled: Notify::new(),
        };

        Ok(Game {
            coordinator: Arc::new(coordinator),
            runtime: Mutex::new(Some(runtime)),
            workers: self.workers,
            summary: OnceLock::new(),
        })
    }
}
