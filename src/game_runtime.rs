use bevy::prelude::*;
use bevy::utils::Instant;
use serde::Serialize;

use crate::components::GameConfig;
use crate::events::GameEventBus;
use crate::hazards::LevelCompletion;
use crate::input::VirtualInput;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    #[default]
    Playing,
    GameOver,
    LevelComplete,
}

/// Win/lose bookkeeping handed to whatever needs to end the level.
/// The first terminal outcome sticks until the next restart.
#[derive(Resource, Clone, Debug)]
pub struct GameSession {
    outcome: SessionOutcome,
    restarts: u32,
    pending_restart: Option<RestartRequest>,
    entered_at: Instant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct RestartRequest {
    seed: Option<u64>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self {
            outcome: SessionOutcome::Playing,
            restarts: 0,
            pending_restart: None,
            entered_at: Instant::now(),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct GameSessionSnapshot {
    pub state: SessionOutcome,
    pub restarts: u32,
    pub time_in_state_seconds: f32,
}

impl GameSession {
    pub fn outcome(&self) -> SessionOutcome {
        self.outcome
    }

    pub fn is_playing(&self) -> bool {
        self.outcome == SessionOutcome::Playing
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Seed for the level of the current attempt.
    pub fn level_seed(&self, base: u64) -> u64 {
        base.wrapping_add(self.restarts as u64)
    }

    pub fn request_restart(&mut self) {
        self.pending_restart = Some(RestartRequest::default());
    }

    /// Restart on an explicit seed instead of the derived one.
    pub fn request_level(&mut self, seed: u64) {
        self.pending_restart = Some(RestartRequest { seed: Some(seed) });
    }

    fn latch(&mut self, outcome: SessionOutcome) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.outcome = outcome;
        self.entered_at = Instant::now();
        true
    }

    /// Accept a pending restart and return the seed for the new level.
    fn take_restart(&mut self, base_seed: u64) -> Option<u64> {
        let request = self.pending_restart.take()?;
        self.outcome = SessionOutcome::Playing;
        self.restarts = self.restarts.saturating_add(1);
        self.entered_at = Instant::now();
        Some(request.seed.unwrap_or_else(|| self.level_seed(base_seed)))
    }

    pub fn snapshot(&self) -> GameSessionSnapshot {
        GameSessionSnapshot {
            state: self.outcome,
            restarts: self.restarts,
            time_in_state_seconds: self.entered_at.elapsed().as_secs_f32(),
        }
    }
}

impl LevelCompletion for GameSession {
    fn level_complete(&mut self) {
        if self.latch(SessionOutcome::LevelComplete) {
            info!("[Skyhop] Level complete");
        }
    }

    fn game_over(&mut self) {
        if self.latch(SessionOutcome::GameOver) {
            info!("[Skyhop] Game over");
        }
    }
}

pub fn gameplay_systems_enabled(session: Option<Res<GameSession>>) -> bool {
    session.map(|s| s.is_playing()).unwrap_or(false)
}

/// Sent once a restart has been accepted; the level and player rebuild from it.
#[derive(Event, Clone, Copy, Debug)]
pub struct LevelRestart {
    pub seed: u64,
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionSet;

pub fn apply_restart(
    mut session: ResMut<GameSession>,
    config: Res<GameConfig>,
    mut bus: ResMut<GameEventBus>,
    mut restarts: EventWriter<LevelRestart>,
) {
    let Some(seed) = session.take_restart(config.seed) else {
        return;
    };
    info!("[Skyhop] Restarting with seed {seed}");
    bus.emit(
        "game_restart",
        serde_json::json!({ "seed": seed, "restarts": session.restarts() }),
        None,
    );
    restarts.send(LevelRestart { seed });
}

/// Mirrors outcome changes onto the event bus so observers see them in frame order.
fn publish_outcome(
    session: Res<GameSession>,
    mut last: Local<SessionOutcome>,
    mut bus: ResMut<GameEventBus>,
) {
    if session.outcome() == *last {
        return;
    }
    *last = session.outcome();
    let name = match session.outcome() {
        SessionOutcome::Playing => "game_resume",
        SessionOutcome::GameOver => "game_over",
        SessionOutcome::LevelComplete => "level_complete",
    };
    bus.emit(name, serde_json::json!({}), None);
}

/// The `restart` action restarts the level whatever the current outcome.
fn restart_on_input(input: Option<ResMut<VirtualInput>>, mut session: ResMut<GameSession>) {
    let Some(mut input) = input else {
        return;
    };
    if input.take_just_pressed("restart") {
        session.request_restart();
    }
}

pub struct RuntimeStatePlugin;

impl Plugin for RuntimeStatePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameSession::default())
            .add_event::<LevelRestart>()
            .add_systems(
                Update,
                (restart_on_input, publish_outcome, apply_restart)
                    .chain()
                    .in_set(SessionSet),
            );
    }
}
