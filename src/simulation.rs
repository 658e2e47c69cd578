use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::{BodyShape, CollisionWorld, MoveResult};
use crate::components::GameConfig;
use crate::game_runtime::{GameSession, SessionOutcome};
use crate::generation::{LevelConfig, LevelGenerator};
use crate::hazards::{dispatch_contact, ContactOutcome, GoalZone, Spike};
use crate::locomotion_core::{GroundSensors, Locomotion, LocomotionInput, TickOutput};

#[derive(Deserialize, Clone)]
pub struct SimulationRequest {
    pub inputs: Vec<SimInput>,
    pub max_frames: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub level: Option<LevelConfig>,
}

fn default_record_interval() -> u32 {
    1
}

/// One scripted action held for `duration` frames (at least one).
#[derive(Deserialize, Clone)]
pub struct SimInput {
    pub frame: u32,
    pub action: String,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Serialize, Clone)]
pub struct SimulationResult {
    pub outcome: String,
    pub frames_elapsed: u32,
    pub seed: u64,
    pub trace: Vec<TraceFrame>,
    pub events: Vec<SimEvent>,
}

#[derive(Serialize, Clone)]
pub struct TraceFrame {
    pub frame: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub grounded: bool,
    pub jumps_used: u32,
}

#[derive(Serialize, Clone)]
pub struct SimEvent {
    pub frame: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Contact flags carried from one move into the next tick's ground detection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactFlags {
    pub grounded: bool,
    pub ceiling: bool,
}

impl From<&MoveResult> for ContactFlags {
    fn from(m: &MoveResult) -> Self {
        Self {
            grounded: m.grounded,
            ceiling: m.ceiling,
        }
    }
}

pub struct CharacterStep {
    pub output: TickOutput,
    pub movement: MoveResult,
}

/// One locomotion tick followed by the kinematic move it asks for.
pub fn step_character(
    world: &CollisionWorld,
    body: BodyShape,
    position: Vec3,
    flags: ContactFlags,
    locomotion: &mut Locomotion,
    input: &LocomotionInput,
    dt: f32,
) -> CharacterStep {
    let sensors = GroundSensors {
        position,
        body_radius: body.radius,
        contact: flags.grounded,
        ceiling: flags.ceiling,
        probe: Some(world),
        surfaces: Some(world),
    };
    let output = locomotion.tick(input, &sensors, dt);
    let movement = world.move_body(position, body, output.velocity * dt);
    CharacterStep { output, movement }
}

/// Feet position on top of the first platform, or the level start when nothing was generated.
pub fn spawn_position(generator: &LevelGenerator) -> Vec3 {
    generator
        .platforms()
        .first()
        .map(|p| Vec3::new(p.position.x, p.top(), p.position.z))
        .unwrap_or(generator.config.start)
}

#[derive(Default)]
struct ActionFrame {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    run: bool,
    jump: bool,
}

impl ActionFrame {
    fn from_actions(actions: &[String]) -> Self {
        let mut frame = ActionFrame::default();
        for action in actions {
            match action.as_str() {
                "forward" | "up" => frame.forward = true,
                "back" | "down" => frame.back = true,
                "left" => frame.left = true,
                "right" => frame.right = true,
                "run" => frame.run = true,
                "jump" => frame.jump = true,
                _ => {}
            }
        }
        frame
    }

    fn axis(&self) -> Vec2 {
        let mut axis = Vec2::ZERO;
        if self.forward {
            axis.y += 1.0;
        }
        if self.back {
            axis.y -= 1.0;
        }
        if self.right {
            axis.x += 1.0;
        }
        if self.left {
            axis.x -= 1.0;
        }
        axis
    }
}

fn sim_event(events: &mut Vec<SimEvent>, frame: u32, name: &str, at: Vec3) {
    events.push(SimEvent {
        frame,
        event_type: name.to_string(),
        x: at.x,
        y: at.y,
        z: at.z,
    });
}

/// Run a scripted session against a freshly generated level without any ECS scheduling.
pub fn run_simulation(config: &GameConfig, request: &SimulationRequest) -> SimulationResult {
    let dt = 1.0 / config.fixed_hz.max(1.0);
    let seed = request.seed.unwrap_or(config.seed);
    let level_config = request.level.clone().unwrap_or_else(|| config.level.clone());
    let bounce_force = level_config.bounce_force;

    let mut generator = LevelGenerator::new(level_config);
    generator.regenerate_with_seed(seed);
    let world = CollisionWorld::from_level(
        generator.platforms(),
        generator.hazards(),
        generator.config.start,
        bounce_force,
        config.void_depth,
    );

    let mut locomotion = Locomotion::new(config.locomotion.clone(), config.body.is_usable());
    let mut position = spawn_position(&generator);
    let mut flags = ContactFlags::default();
    let mut goal = GoalZone::default();
    let mut session = GameSession::default();
    let spike = Spike {
        push_force: config.spike_push_force,
    };

    let mut active_inputs: Vec<Vec<String>> = vec![Vec::new(); request.max_frames as usize + 1];
    for input in &request.inputs {
        let duration = input.duration.max(1);
        for f in input.frame..input.frame.saturating_add(duration).min(request.max_frames) {
            active_inputs[f as usize].push(input.action.clone());
        }
    }

    let mut trace = Vec::new();
    let mut events = Vec::new();
    let mut frames_elapsed = 0;
    let mut prev_jump = false;

    for frame in 0..request.max_frames {
        frames_elapsed = frame + 1;
        let actions = ActionFrame::from_actions(&active_inputs[frame as usize]);
        let input = LocomotionInput {
            move_axis: actions.axis(),
            run_held: actions.run,
            jump_pressed: actions.jump && !prev_jump,
            jump_released: !actions.jump && prev_jump,
            camera_yaw: None,
        };
        prev_jump = actions.jump;

        let step = step_character(
            &world,
            config.body,
            position,
            flags,
            &mut locomotion,
            &input,
            dt,
        );
        for event in &step.output.events {
            sim_event(&mut events, frame, event.name(), position);
        }
        position = step.movement.position;
        flags = ContactFlags::from(&step.movement);

        for contact in &step.movement.contacts {
            let outcome = dispatch_contact(
                contact,
                position,
                &spike,
                &mut goal,
                &mut locomotion,
                &mut session,
            );
            match outcome {
                ContactOutcome::Nothing => {}
                ContactOutcome::Knockback { .. } => sim_event(&mut events, frame, "spike_hit", position),
                ContactOutcome::GoalReached => sim_event(&mut events, frame, "goal_reached", position),
                ContactOutcome::Killed => sim_event(&mut events, frame, "death", position),
            }
            if !session.is_playing() {
                break;
            }
        }

        let finished = !session.is_playing();
        if finished || (request.record_interval > 0 && frame % request.record_interval == 0) {
            let v = step.output.velocity;
            trace.push(TraceFrame {
                frame,
                x: position.x,
                y: position.y,
                z: position.z,
                vx: v.x,
                vy: v.y,
                vz: v.z,
                grounded: flags.grounded,
                jumps_used: locomotion.state.jumps_used,
            });
        }
        if finished {
            break;
        }
    }

    let outcome = match session.outcome() {
        SessionOutcome::Playing => "timeout",
        SessionOutcome::GameOver => "game_over",
        SessionOutcome::LevelComplete => "goal",
    };

    SimulationResult {
        outcome: outcome.to_string(),
        frames_elapsed,
        seed,
        trace,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_level() -> LevelConfig {
        LevelConfig {
            p_trampoline: 0.0,
            p_extended: 0.0,
            ..LevelConfig::default()
        }
    }

    fn request(inputs: Vec<SimInput>, max_frames: u32) -> SimulationRequest {
        SimulationRequest {
            inputs,
            max_frames,
            record_interval: 1,
            seed: Some(7),
            level: Some(plain_level()),
        }
    }

    fn hold(action: &str, frame: u32, duration: u32) -> SimInput {
        SimInput {
            frame,
            action: action.to_string(),
            duration,
        }
    }

    #[test]
    fn idle_player_rests_on_first_platform() {
        let config = GameConfig::default();
        let result = run_simulation(&config, &request(vec![], 120));
        assert_eq!(result.outcome, "timeout");
        assert_eq!(result.frames_elapsed, 120);
        assert_eq!(result.trace.len(), 120);
        let last = result.trace.last().expect("trace");
        assert!(last.grounded);
        assert!((last.y - 0.25).abs() < 1e-4);
        assert!(result.events.iter().any(|e| e.event_type == "land"));
    }

    #[test]
    fn walking_off_the_start_falls_into_the_void() {
        let config = GameConfig::default();
        let result = run_simulation(&config, &request(vec![hold("back", 0, 600)], 600));
        assert_eq!(result.outcome, "game_over");
        assert!(result.events.iter().any(|e| e.event_type == "death"));
        assert!(result.frames_elapsed < 600);
    }

    #[test]
    fn single_platform_level_is_won_on_first_contact() {
        let config = GameConfig::default();
        let mut req = request(vec![], 60);
        req.level = Some(LevelConfig {
            count: 1,
            ..LevelConfig::default()
        });
        let result = run_simulation(&config, &req);
        assert_eq!(result.outcome, "goal");
        assert_eq!(result.frames_elapsed, 1);
        assert!(result.events.iter().any(|e| e.event_type == "goal_reached"));
    }

    #[test]
    fn scripted_double_jump_reports_both_jumps() {
        let config = GameConfig::default();
        let result = run_simulation(
            &config,
            &request(vec![hold("jump", 10, 5), hold("jump", 25, 5), hold("jump", 35, 5)], 60),
        );
        let names: Vec<&str> = result.events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(names.contains(&"jump"));
        assert!(names.contains(&"air_jump"));
        assert!(result.trace.iter().all(|t| t.jumps_used <= 2));
    }

    #[test]
    fn same_seed_same_trace() {
        let config = GameConfig::default();
        let mut req = request(vec![hold("forward", 0, 90), hold("jump", 20, 10)], 90);
        req.level = None;
        let a = run_simulation(&config, &req);
        let b = run_simulation(&config, &req);
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.trace.len(), b.trace.len());
        for (x, y) in a.trace.iter().zip(&b.trace) {
            assert_eq!((x.x, x.y, x.z), (y.x, y.y, y.z));
        }
    }

    #[test]
    fn zero_radius_body_never_moves() {
        let mut config = GameConfig::default();
        config.body.radius = 0.0;
        let result = run_simulation(
            &config,
            &request(vec![hold("forward", 0, 60), hold("jump", 5, 5)], 60),
        );
        let mut generator = LevelGenerator::new(plain_level());
        generator.regenerate_with_seed(7);
        let spawn = spawn_position(&generator);

        assert_eq!(result.outcome, "timeout");
        assert_eq!(result.trace.len(), 60);
        for t in &result.trace {
            assert_eq!((t.x, t.y, t.z), (spawn.x, spawn.y, spawn.z));
            assert_eq!((t.vx, t.vy, t.vz), (0.0, 0.0, 0.0));
        }
        assert!(result.events.is_empty());
    }

    #[test]
    fn empty_level_drops_into_the_void() {
        let config = GameConfig::default();
        let mut req = request(vec![], 600);
        req.level = Some(LevelConfig {
            count: 0,
            ..plain_level()
        });
        let result = run_simulation(&config, &req);
        assert_eq!(result.outcome, "game_over");
        assert!(result.frames_elapsed < 600);
        assert!(result.events.iter().any(|e| e.event_type == "death"));
        let first = result.trace.first().expect("trace");
        assert!(first.y <= plain_level().start.y);
    }
}
