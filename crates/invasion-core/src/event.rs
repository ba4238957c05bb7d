//! Game events and the sinks that receive them.
//!
//! Sinks are called from worker threads while the fighting monster still holds
//! the contested city's lock, so they must return quickly.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use invasion_types::{CityId, FightId, MonsterId};
use serde::Serialize;
use tracing::info;

/// Something observable that happened during a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Two monsters met and the city was destroyed.
    Fight(FightEvent),
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fight(fight) => fmt::Display::fmt(fight, f),
        }
    }
}

/// A collision between two monsters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FightEvent {
    /// Sequence number of the fight, starting at 1.
    pub id: FightId,
    /// The destroyed city.
    pub city: CityId,
    /// Its name.
    pub city_name: String,
    /// Both participants, lowest id first.
    pub monsters: [MonsterId; 2],
    /// Wall-clock time of the fight.
    pub occurred_at: DateTime<Utc>,
}

impl FightEvent {
    /// Build a fight event, ordering the participants by id.
    pub fn new(
        id: FightId,
        city: CityId,
        city_name: &str,
        first: MonsterId,
        second: MonsterId,
    ) -> Self {
        let monsters = if first <= second {
            [first, second]
        } else {
            [second, first]
        };
        Self {
            id,
            city,
            city_name: city_name.to_owned(),
            monsters,
            occurred_at: Utc::now(),
        }
    }
}

impl fmt::Display for FightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [first, second] = self.monsters;
        write!(
            f,
            "{} has been destroyed by monster {first} and monster {second}!",
            self.city_name
        )
    }
}

/// Receives every event a game produces.
pub trait EventSink: Send + Sync {
    /// Handle one event.
    fn handle(&self, event: &GameEvent);
}

/// Logs each event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    /// Create a logging sink.
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for LoggingEventSink {
    fn handle(&self, event: &GameEvent) {
        match event {
            GameEvent::Fight(fight) => {
                let [first, second] = fight.monsters;
                info!(
                    fight = %fight.id,
                    city = %fight.city_name,
                    first = %first,
                    second = %second,
                    "{fight}"
                );
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CapturingEventSink {
    events: Mutex<Vec<GameEvent>>,
}

impl CapturingEventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far.
    pub fn events(&self) -> Vec<GameEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Only the fight events.
    pub fn fights(&self) -> Vec<FightEvent> {
        self.events()
            .into_iter()
            .map(|event| match event {
                GameEvent::Fight(fight) => fight,
            })
            .collect()
    }
}

impl EventSink for CapturingEventSink {
    fn handle(&self, event: &GameEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fight(first: u64, second: u64) -> FightEvent {
        FightEvent::new(
            FightId(1),
            CityId(2),
            "Lexington",
            MonsterId(first),
            MonsterId(second),
        )
    }

    #[test]
    fn message_lists_monsters_in_id_order() {
        assert_eq!(
            fight(2, 1).to_string(),
            "Lexington has been destroyed by monster 1 and monster 2!"
        );
        assert_eq!(fight(1, 2).monsters, [MonsterId(1), MonsterId(2)]);
    }

    #[test]
    fn capturing_sink_keeps_order() {
        let sink = CapturingEventSink::new();
        sink.handle(&GameEvent::Fight(fight(3, 4)));
        sink.handle(&GameEvent::Fight(fight(1, 2)));
        let fights = sink.fights();
        assert_eq!(fights.len(), 2);
        assert_eq!(fights.first().unwrap().monsters, [MonsterId(3), MonsterId(4)]);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(GameEvent::Fight(fight(1, 2))).unwrap();
        assert_eq!(json["type"], "fight");
        assert_eq!(json["city_name"], "Lexington");
        assert_eq!(json["monsters"], serde_json::json!([1, 2]));
    }
}
