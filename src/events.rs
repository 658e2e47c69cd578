use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 500;

/// Something observable happened during a fixed tick: a jump, a bounce, a death.
#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    pub source_entity: Option<u64>,
}

#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        data: serde_json::Value,
        source_entity: Option<u64>,
    ) {
        self.recent.push_back(GameEvent {
            name: name.into(),
            data,
            frame: self.frame,
            source_entity,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Skyhop events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    /// Events stamped with the current frame, oldest first.
    pub fn this_frame(&self) -> impl Iterator<Item = &GameEvent> {
        let frame = self.frame;
        let start = self
            .recent
            .iter()
            .rposition(|e| e.frame != frame)
            .map_or(0, |i| i + 1);
        self.recent.range(start..)
    }

    /// Up to `limit` most recent events, optionally only those at or after `since_frame`.
    pub fn tail(&self, since_frame: Option<u64>, limit: usize) -> Vec<GameEvent> {
        let mut out: Vec<GameEvent> = self
            .recent
            .iter()
            .rev()
            .filter(|e| since_frame.map_or(true, |f| e.frame >= f))
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default()).add_systems(
            FixedFirst,
            tick_event_frame.run_if(crate::game_runtime::gameplay_systems_enabled),
        );
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = GameEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("test", serde_json::json!({ "i": i }), None);
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert!(bus.dropped_events >= 25);
    }

    #[test]
    fn this_frame_only_returns_current_stamp() {
        let mut bus = GameEventBus::default();
        bus.emit("old", serde_json::json!({}), None);
        bus.frame = 3;
        bus.emit("jump", serde_json::json!({}), None);
        bus.emit("land", serde_json::json!({}), None);
        let names: Vec<&str> = bus.this_frame().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["jump", "land"]);
    }

    #[test]
    fn tail_filters_and_limits() {
        let mut bus = GameEventBus::default();
        for frame in 0..10 {
            bus.frame = frame;
            bus.emit("tick", serde_json::json!({ "f": frame }), None);
        }
        let tail = bus.tail(Some(5), 3);
        let frames: Vec<u64> = tail.iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![7, 8, 9]);
        assert_eq!(bus.tail(Some(8), 100).len(), 2);
    }
}
