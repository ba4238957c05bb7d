//! End-to-end invasions on small hand-made maps.
//!
//! Monsters are placed and steered deterministically; only the residence
//! delays decide who gets where first, and the delays are spaced far enough
//! apart that scheduler jitter cannot change the outcome.

#![allow(clippy::unwrap_used, clippy::panic, clippy::arithmetic_side_effects)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use invasion_core::{
    CapturingEventSink, EarlyStop, EventSink, Game, GameError, GameEvent, PlacementPolicy,
    PolicyError, RandomMove, RandomPlacement, RandomResidence,
};
use invasion_types::{CityId, Direction, MonsterId, MonsterStatus};
use invasion_world::{Atlas, City, map_io};

const CHAIN: &str = "\
Acton east=Concord
Concord west=Acton east=Lexington
Lexington west=Concord east=Belmont
Belmont west=Lexington east=Boston
Boston west=Belmont
";

/// Places each listed monster in a named city.
struct PlaceAt(Vec<(u64, &'static str)>);

impl PlacementPolicy for PlaceAt {
    fn place(&self, monster: MonsterId, candidates: &[&City]) -> Result<CityId, PolicyError> {
        let name = self
            .0
            .iter()
            .find(|(id, _)| MonsterId(*id) == monster)
            .map(|(_, name)| *name)
            .ok_or_else(|| PolicyError::Rejected {
                reason: format!("no start for monster {monster}"),
            })?;
        candidates
            .iter()
            .find(|city| city.name() == name)
            .map(|city| city.id())
            .ok_or(PolicyError::NoCandidates)
    }
}

/// Monster 1 always heads east, everyone else west.
fn towards_each_other(monster: MonsterId, _: &[Direction]) -> Result<Direction, PolicyError> {
    if monster == MonsterId(1) {
        Ok(Direction::East)
    } else {
        Ok(Direction::West)
    }
}

fn delays(first_ms: u64, second_ms: u64) -> impl Fn(MonsterId) -> Duration + Send + Sync {
    move |monster| {
        if monster == MonsterId(1) {
            Duration::from_millis(first_ms)
        } else {
            Duration::from_millis(second_ms)
        }
    }
}

fn chain_game(first_ms: u64, second_ms: u64, sink: &Arc<CapturingEventSink>) -> Game {
    Game::builder(map_io::parse(CHAIN).unwrap(), 2)
        .min_moves(100)
        .workers(2)
        .placement(PlaceAt(vec![(1, "Acton"), (2, "Boston")]))
        .movement(towards_each_other)
        .residence(delays(first_ms, second_ms))
        .event_sink(Arc::clone(sink))
        .build()
        .unwrap()
}

fn id(atlas: &Atlas, name: &str) -> CityId {
    atlas.id_of(name).unwrap()
}

/// Every road out of a standing city leads to a standing city.
fn assert_no_dangling_roads(game: &Game) {
    for city in game.active_cities() {
        let guard = city.try_lock().unwrap();
        for (direction, target) in guard.neighbors().iter() {
            assert!(
                !game.is_destroyed(target),
                "{} still has a road {direction} into a destroyed city",
                city.name()
            );
        }
    }
}

#[test]
fn lonely_city_traps_its_monster() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = Game::builder(map_io::parse("Lonely\n").unwrap(), 1)
        .workers(1)
        .residence(|_: MonsterId| Duration::from_millis(1))
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(
        game.monster_statuses().get(&MonsterId(1)),
        Some(&MonsterStatus::Trapped)
    );
    assert_eq!(summary.count(MonsterStatus::Trapped), 1);
    assert_eq!(summary.fights, 0);
    assert!(sink.events().is_empty());
    assert_eq!(game.render_map().unwrap(), "Lonely\n");
}

#[test]
fn monsters_meet_in_lexington() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = chain_game(100, 120, &sink);

    let summary = game.start_game().unwrap();

    let fights = sink.fights();
    assert_eq!(fights.len(), 1);
    let fight = fights.first().unwrap();
    assert_eq!(fight.city_name, "Lexington");
    assert_eq!(fight.monsters, [MonsterId(1), MonsterId(2)]);
    assert_eq!(
        fight.to_string(),
        "Lexington has been destroyed by monster 1 and monster 2!"
    );

    assert_eq!(summary.count(MonsterStatus::Killed), 2);
    assert_eq!(summary.fights, 1);
    assert_eq!(summary.destroyed_cities, 1);
    assert_eq!(summary.active_cities, 4);
    assert!(game.is_destroyed(id(game.atlas(), "Lexington")));
    assert!(game.occupancy().is_empty());

    let concord = game.atlas().find("Concord").unwrap().try_lock().unwrap();
    assert_eq!(concord.neighbor(Direction::East), None);
    drop(concord);
    let belmont = game.atlas().find("Belmont").unwrap().try_lock().unwrap();
    assert_eq!(belmont.neighbor(Direction::West), None);
    drop(belmont);

    assert_eq!(
        game.render_map().unwrap(),
        "Acton east=Concord\nConcord west=Acton\nBelmont east=Boston\nBoston west=Belmont\n"
    );
}

#[test]
fn slower_monster_is_met_in_belmont() {
    let sink = Arc::new(CapturingEventSink::new());
    // Monster 1 reaches Belmont at ~400 ms and would leave at ~500 ms;
    // monster 2 walks in at ~480 ms.
    let game = chain_game(100, 240, &sink);

    game.start_game().unwrap();

    let fights = sink.fights();
    assert_eq!(fights.len(), 1);
    assert_eq!(
        fights.first().unwrap().to_string(),
        "Belmont has been destroyed by monster 1 and monster 2!"
    );
    assert!(game.is_destroyed(id(game.atlas(), "Belmont")));
    assert!(!game.is_destroyed(id(game.atlas(), "Lexington")));
    assert!(
        game.monster_statuses()
            .values()
            .all(|status| *status == MonsterStatus::Killed)
    );
    assert_no_dangling_roads(&game);
}

#[test]
fn slower_monster_is_met_in_belmont_at_250_ms() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = chain_game(100, 250, &sink);

    game.start_game().unwrap();

    let fights = sink.fights();
    assert_eq!(fights.len(), 1);
    assert_eq!(fights.first().unwrap().city_name, "Belmont");
    assert!(game.is_destroyed(id(game.atlas(), "Belmont")));
    assert_eq!(
        game.render_map().unwrap(),
        "Acton east=Concord\nConcord west=Acton east=Lexington\nLexington west=Concord\nBoston\n"
    );
}

#[test]
fn single_road_then_tired() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = Game::builder(map_io::parse("Solo north=Far\n").unwrap(), 1)
        .min_moves(1)
        .workers(1)
        .placement(PlaceAt(vec![(1, "Solo")]))
        .residence(|_: MonsterId| Duration::from_millis(5))
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(summary.count(MonsterStatus::Tired), 1);
    assert_eq!(summary.count(MonsterStatus::Trapped), 0);
    let far = id(game.atlas(), "Far");
    assert_eq!(game.occupancy().get(&far), Some(&MonsterId(1)));
    assert_eq!(summary.active_cities, 2);
    assert_eq!(summary.mapped_cities, 1);
    assert_eq!(game.render_map().unwrap(), "Solo north=Far\n");
}

#[test]
fn cleanup_runs_once_and_repeats_harmlessly() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = chain_game(100, 120, &sink);

    let summary = game.start_game().unwrap();
    assert_eq!(summary.severed_links, 2);

    let after_game = game.render_map().unwrap();
    assert_eq!(game.sever_destroyed_links().unwrap(), 0);
    assert_eq!(game.sever_destroyed_links().unwrap(), 0);
    assert_eq!(game.render_map().unwrap(), after_game);
}

#[test]
fn game_cannot_be_restarted() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = chain_game(10, 12, &sink);
    game.start_game().unwrap();
    assert!(matches!(
        game.start_game().unwrap_err(),
        GameError::AlreadyPlayed
    ));
    assert_eq!(sink.fights().len(), 1);
}

#[test]
fn failing_placement_errors_the_monster() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = Game::builder(map_io::parse(CHAIN).unwrap(), 3)
        .min_moves(2)
        .workers(2)
        .placement(PlaceAt(vec![(1, "Acton"), (2, "Boston")]))
        .residence(|_: MonsterId| Duration::from_millis(1))
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(
        game.monster_statuses().get(&MonsterId(3)),
        Some(&MonsterStatus::Errored)
    );
    assert_eq!(summary.statuses.values().sum::<usize>(), 3);
    assert_eq!(summary.count(MonsterStatus::Active), 0);
}

#[test]
fn panicking_policy_errors_the_monster() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = Game::builder(map_io::parse(CHAIN).unwrap(), 1)
        .workers(1)
        .placement(PlaceAt(vec![(1, "Concord")]))
        .movement(|_: MonsterId, _: &[Direction]| -> Result<Direction, PolicyError> {
            panic!("no sense of direction")
        })
        .residence(|_: MonsterId| Duration::from_millis(1))
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(summary.count(MonsterStatus::Errored), 1);
    // The lock taken before the panic was released on unwind.
    assert!(game.atlas().find("Concord").unwrap().try_lock().is_some());
}

/// Residence that panics on its `nth` call and waits 10 ms otherwise.
fn residence_failing_on_call(nth: usize) -> impl Fn(MonsterId) -> Duration + Send + Sync {
    let calls = AtomicUsize::new(0);
    move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) == nth.saturating_sub(1) {
            panic!("residence call {nth} failed");
        }
        Duration::from_millis(10)
    }
}

#[test]
fn panicking_residence_mid_game_errors_the_monster() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = Game::builder(map_io::parse("A east=B\nB west=A\n").unwrap(), 2)
        .min_moves(5)
        .workers(1)
        .placement(PlaceAt(vec![(1, "A"), (2, "B")]))
        .residence(residence_failing_on_call(3))
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(summary.statuses.values().sum::<usize>(), 2);
    assert_eq!(summary.count(MonsterStatus::Active), 0);
    assert_eq!(summary.count(MonsterStatus::Errored), 1);
    // The survivor walks into the errored monster's city and fights it.
    assert_eq!(summary.count(MonsterStatus::Killed), 1);
    assert_eq!(summary.fights, 1);
}

#[test]
fn panicking_residence_at_start_errors_the_monster() {
    let sink = Arc::new(CapturingEventSink::new());
    let game = Game::builder(map_io::parse("A east=B\nB west=A\n").unwrap(), 2)
        .min_moves(3)
        .workers(1)
        .placement(PlaceAt(vec![(1, "A"), (2, "B")]))
        .residence(|monster: MonsterId| {
            assert_ne!(monster, MonsterId(2), "no rest for monster 2");
            Duration::from_millis(1)
        })
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(
        game.monster_statuses().get(&MonsterId(2)),
        Some(&MonsterStatus::Errored)
    );
    assert_eq!(
        game.monster_statuses().get(&MonsterId(1)),
        Some(&MonsterStatus::Tired)
    );
    assert_eq!(summary.fights, 0);
    assert!(sink.events().is_empty());
}

/// Sink that fails on every event.
struct FailingSink;

impl EventSink for FailingSink {
    fn handle(&self, _: &GameEvent) {
        panic!("sink unavailable");
    }
}

#[test]
fn failing_sink_does_not_undo_the_fight() {
    let game = Game::builder(map_io::parse(CHAIN).unwrap(), 2)
        .min_moves(100)
        .workers(2)
        .placement(PlaceAt(vec![(1, "Acton"), (2, "Boston")]))
        .movement(towards_each_other)
        .residence(delays(100, 120))
        .event_sink(Arc::new(FailingSink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(summary.count(MonsterStatus::Killed), 2);
    assert_eq!(summary.count(MonsterStatus::Errored), 0);
    assert!(game.is_destroyed(id(game.atlas(), "Lexington")));
    assert!(game.occupancy().is_empty());
}

#[test]
fn lone_survivor_retires_early() {
    let map = format!("{CHAIN}Island-A east=Island-B\nIsland-B west=Island-A\n");
    let sink = Arc::new(CapturingEventSink::new());
    let game = Game::builder(map_io::parse(&map).unwrap(), 3)
        .min_moves(1_000_000)
        .workers(2)
        .early_stop(EarlyStop::LoneSurvivor)
        .placement(PlaceAt(vec![(1, "Acton"), (2, "Boston"), (3, "Island-A")]))
        .movement(towards_each_other)
        .residence(|monster: MonsterId| match monster.into_inner() {
            1 => Duration::from_millis(100),
            2 => Duration::from_millis(120),
            _ => Duration::from_millis(5),
        })
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    assert_eq!(summary.fights, 1);
    assert_eq!(summary.count(MonsterStatus::Killed), 2);
    assert_eq!(
        game.monster_statuses().get(&MonsterId(3)),
        Some(&MonsterStatus::Tired)
    );
}

fn grid(size: usize) -> String {
    let name = |row: usize, col: usize| format!("G{row}x{col}");
    let mut map = String::new();
    for row in 0..size {
        for col in 0..size {
            map.push_str(&name(row, col));
            if row > 0 {
                map.push_str(&format!(" north={}", name(row - 1, col)));
            }
            if row + 1 < size {
                map.push_str(&format!(" south={}", name(row + 1, col)));
            }
            if col + 1 < size {
                map.push_str(&format!(" east={}", name(row, col + 1)));
            }
            if col > 0 {
                map.push_str(&format!(" west={}", name(row, col - 1)));
            }
            map.push('\n');
        }
    }
    map
}

#[test]
fn crowded_grid_settles_every_monster() {
    let sink = Arc::new(CapturingEventSink::new());
    let monsters = 30;
    let game = Game::builder(map_io::parse(&grid(6)).unwrap(), monsters)
        .min_moves(40)
        .workers(4)
        .placement(RandomPlacement::new(Some(11)))
        .movement(RandomMove::new(Some(12)))
        .residence(
            RandomResidence::new(Duration::ZERO, Duration::from_millis(2), Some(13)).unwrap(),
        )
        .event_sink(Arc::clone(&sink))
        .build()
        .unwrap();

    let summary = game.start_game().unwrap();

    let total: usize = summary.statuses.values().sum();
    assert_eq!(total, 30);
    assert_eq!(summary.count(MonsterStatus::Active), 0);
    assert_eq!(summary.count(MonsterStatus::Errored), 0);

    let fights = sink.fights();
    assert_eq!(u64::try_from(fights.len()).unwrap(), summary.fights);
    assert_eq!(summary.destroyed_cities, fights.len());
    assert_eq!(summary.active_cities + summary.destroyed_cities, 36);
    let killed = summary.count(MonsterStatus::Killed);
    assert!(killed >= fights.len());
    assert!(killed <= fights.len() * 2);

    let mut fought_in: Vec<&str> = fights.iter().map(|f| f.city_name.as_str()).collect();
    fought_in.sort_unstable();
    fought_in.dedup();
    assert_eq!(fought_in.len(), fights.len(), "a city was destroyed twice");

    for city in game.occupancy().keys() {
        assert!(!game.is_destroyed(*city));
    }
    assert_no_dangling_roads(&game);

    let reparsed = map_io::parse(&game.render_map().unwrap()).unwrap();
    assert_eq!(reparsed.declared().len(), summary.mapped_cities);
}
