use bevy::prelude::*;
use serde::Serialize;

use crate::components::Player;
use crate::events::GameEventBus;
use crate::game_runtime::GameSession;

#[derive(Resource, Serialize, Clone, Default, Debug)]
pub struct GameplayTelemetry {
    pub total_frames: u64,
    pub jumps: u32,
    pub air_jumps: u32,
    pub bounces: u32,
    pub landings: u32,
    pub knockbacks: u32,
    pub spike_hits: u32,
    pub deaths: u32,
    pub restarts: u32,
    pub death_locations: Vec<[f32; 3]>,
    pub goal_reached_at: Option<u64>,
    pub highest_altitude: f32,
    #[serde(skip)]
    last_scanned_frame: Option<u64>,
}

pub struct TelemetryPlugin;

impl Plugin for TelemetryPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameplayTelemetry::default()).add_systems(
            FixedPostUpdate,
            update_telemetry,
        );
    }
}

fn read_location(data: &serde_json::Value) -> [f32; 3] {
    let axis = |k: &str| data.get(k).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
    [axis("x"), axis("y"), axis("z")]
}

/// Runs ungated so the tick that ends the game is still counted; the frame cursor keeps
/// paused ticks from being scanned twice.
fn update_telemetry(
    mut telemetry: ResMut<GameplayTelemetry>,
    event_bus: Res<GameEventBus>,
    players: Query<&Transform, With<Player>>,
    session: Option<Res<GameSession>>,
) {
    if telemetry.last_scanned_frame == Some(event_bus.frame) {
        return;
    }
    telemetry.last_scanned_frame = Some(event_bus.frame);
    telemetry.total_frames += 1;
    let frame = event_bus.frame;
    if let Some(session) = session {
        telemetry.restarts = session.restarts();
    }

    for transform in &players {
        telemetry.highest_altitude = telemetry.highest_altitude.max(transform.translation.y);
    }

    for event in event_bus.this_frame() {
        match event.name.as_str() {
            "jump" => telemetry.jumps += 1,
            "air_jump" => telemetry.air_jumps += 1,
            "bounce" => telemetry.bounces += 1,
            "land" => telemetry.landings += 1,
            "knockback" => telemetry.knockbacks += 1,
            "spike_hit" => telemetry.spike_hits += 1,
            "death" => {
                telemetry.deaths += 1;
                let location = read_location(&event.data);
                telemetry.death_locations.push(location);
                if telemetry.death_locations.len() > 100 {
                    telemetry.death_locations.remove(0);
                }
            }
            "goal_reached" => {
                if telemetry.goal_reached_at.is_none() {
                    telemetry.goal_reached_at = Some(frame);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let mut app = App::new();
        app.insert_resource(GameEventBus::default())
            .add_plugins(TelemetryPlugin);
        app
    }

    #[test]
    fn counts_current_frame_events_once() {
        let mut app = app();
        {
            let mut bus = app.world_mut().resource_mut::<GameEventBus>();
            bus.frame = 1;
            bus.emit("jump", serde_json::json!({}), None);
            bus.emit("air_jump", serde_json::json!({}), None);
            bus.emit("death", serde_json::json!({ "x": 1.0, "y": -20.0, "z": 3.0 }), None);
        }
        app.world_mut().run_schedule(FixedPostUpdate);
        app.world_mut().run_schedule(FixedPostUpdate);

        let t = app.world().resource::<GameplayTelemetry>();
        assert_eq!(t.jumps, 1);
        assert_eq!(t.air_jumps, 1);
        assert_eq!(t.deaths, 1);
        assert_eq!(t.death_locations, vec![[1.0, -20.0, 3.0]]);
        assert_eq!(t.total_frames, 1);
    }

    #[test]
    fn goal_frame_is_recorded_once() {
        let mut app = app();
        for frame in [4, 9] {
            {
                let mut bus = app.world_mut().resource_mut::<GameEventBus>();
                bus.frame = frame;
                bus.emit("goal_reached", serde_json::json!({}), None);
            }
            app.world_mut().run_schedule(FixedPostUpdate);
        }
        let t = app.world().resource::<GameplayTelemetry>();
        assert_eq!(t.goal_reached_at, Some(4));
    }
}
