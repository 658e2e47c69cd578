use bevy::ecs::component::Component;
use bevy::math::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Maximum downward speed while airborne.
pub const DEFAULT_TERMINAL_VELOCITY: f32 = 40.0;

/// What the collision layer reports about the surface under a point.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum SurfaceTag {
    #[default]
    None,
    Trampoline(f32),
    Hazard,
    Goal,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ProbeHit {
    pub point: Vec3,
    pub distance: f32,
    pub tag: SurfaceTag,
}

/// Downward shape cast. A zero radius degenerates to a ray.
pub trait GroundProbe {
    fn query(&self, origin: Vec3, radius: f32, max_distance: f32, mask: u32) -> Option<ProbeHit>;
}

pub trait SurfaceQuery {
    fn surface_at(&self, point: Vec3) -> SurfaceTag;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionConfig {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub rotation_speed: f32,
    pub jump_force: f32,
    pub rising_gravity: f32,
    pub falling_gravity: f32,
    pub terminal_velocity: f32,
    pub ground_stick: f32,
    pub max_jumps: u32,
    pub input_deadzone: f32,
    pub ground_mask: u32,
    pub probe_radius_factor: f32,
    pub probe_extra_distance: f32,
    pub bounce_probe_lift: f32,
    pub bounce_probe_distance: f32,
    pub knockback_arc: f32,
    pub knockback_decay: f32,
    pub knockback_epsilon: f32,
    pub fall_speed_threshold: f32,
    pub fall_debounce: f32,
    pub anim_smoothing: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            walk_speed: 6.0,
            run_speed: 10.0,
            acceleration: 10.0,
            deceleration: 10.0,
            rotation_speed: 10.0,
            jump_force: 12.0,
            rising_gravity: 30.0,
            falling_gravity: 40.0,
            terminal_velocity: DEFAULT_TERMINAL_VELOCITY,
            ground_stick: -5.0,
            max_jumps: 2,
            input_deadzone: 0.1,
            ground_mask: u32::MAX,
            probe_radius_factor: 0.9,
            probe_extra_distance: 0.1,
            bounce_probe_lift: 0.1,
            bounce_probe_distance: 0.5,
            knockback_arc: 0.5,
            knockback_decay: 5.0,
            knockback_epsilon: 0.1,
            fall_speed_threshold: -5.0,
            fall_debounce: 0.8,
            anim_smoothing: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocomotionState {
    pub vertical_velocity: f32,
    pub planar_velocity: Vec3,
    pub knockback_velocity: Vec3,
    pub grounded: bool,
    pub jumps_used: u32,
    pub fall_timer: f32,
    pub anim_blend: f32,
    pub facing: Quat,
    pending: Vec<LocomotionEvent>,
}

impl Default for LocomotionState {
    fn default() -> Self {
        Self {
            vertical_velocity: 0.0,
            planar_velocity: Vec3::ZERO,
            knockback_velocity: Vec3::ZERO,
            grounded: false,
            jumps_used: 0,
            fall_timer: 0.0,
            anim_blend: 0.0,
            facing: Quat::IDENTITY,
            pending: Vec::new(),
        }
    }
}

/// Per-tick input. `move_axis.x` is strafe (right positive), `move_axis.y` is forward.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocomotionInput {
    pub move_axis: Vec2,
    pub run_held: bool,
    pub jump_pressed: bool,
    pub jump_released: bool,
    /// Camera yaw in radians. `None` means movement is world-relative.
    pub camera_yaw: Option<f32>,
}

/// Everything the controller learns from the collision layer this tick.
#[derive(Clone, Copy)]
pub struct GroundSensors<'a> {
    /// Feet position of the body.
    pub position: Vec3,
    pub body_radius: f32,
    /// Direct contact reported by the last integration step.
    pub contact: bool,
    pub ceiling: bool,
    pub probe: Option<&'a dyn GroundProbe>,
    pub surfaces: Option<&'a dyn SurfaceQuery>,
}

impl<'a> GroundSensors<'a> {
    pub fn contact_only(position: Vec3, body_radius: f32, contact: bool) -> Self {
        Self {
            position,
            body_radius,
            contact,
            ceiling: false,
            probe: None,
            surfaces: None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocomotionEvent {
    Jumped { airborne: bool },
    Bounced { force: f32 },
    Landed,
    KnockedBack { force: f32 },
}

impl LocomotionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LocomotionEvent::Jumped { airborne: false } => "jump",
            LocomotionEvent::Jumped { airborne: true } => "air_jump",
            LocomotionEvent::Bounced { .. } => "bounce",
            LocomotionEvent::Landed => "land",
            LocomotionEvent::KnockedBack { .. } => "knockback",
        }
    }

    /// Whether an animator should fire its jump trigger for this event.
    pub fn triggers_jump_animation(&self) -> bool {
        !matches!(self, LocomotionEvent::Landed)
    }
}

/// Animator-facing values derived each tick.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize)]
pub struct AnimParams {
    pub speed: f32,
    pub velocity_x: f32,
    pub grounded: bool,
    pub velocity_y: f32,
    pub falling: bool,
    pub jump_trigger: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickOutput {
    pub velocity: Vec3,
    pub facing: Quat,
    pub anim: AnimParams,
    pub events: Vec<LocomotionEvent>,
}

fn lerp_rate(rate: f32, dt: f32) -> f32 {
    (rate * dt).clamp(0.0, 1.0)
}

fn detect_ground(
    state: &mut LocomotionState,
    config: &LocomotionConfig,
    sensors: &GroundSensors<'_>,
) -> bool {
    let mut grounded = sensors.contact;
    if !grounded {
        if let Some(probe) = sensors.probe {
            let r = sensors.body_radius;
            let origin = sensors.position + Vec3::Y * r;
            grounded = probe
                .query(
                    origin,
                    r * config.probe_radius_factor,
                    r + config.probe_extra_distance,
                    config.ground_mask,
                )
                .is_some();
        }
    }
    let landed = grounded && !state.grounded;
    state.grounded = grounded;
    if landed {
        state.jumps_used = 0;
    }
    landed
}

fn bounce_force(config: &LocomotionConfig, sensors: &GroundSensors<'_>) -> Option<f32> {
    let probe = sensors.probe?;
    let origin = sensors.position + Vec3::Y * config.bounce_probe_lift;
    let hit = probe.query(origin, 0.0, config.bounce_probe_distance, config.ground_mask)?;
    let tag = match sensors.surfaces {
        Some(surfaces) => surfaces.surface_at(hit.point),
        None => hit.tag,
    };
    match tag {
        SurfaceTag::Trampoline(force) => Some(force),
        SurfaceTag::None | SurfaceTag::Hazard | SurfaceTag::Goal => None,
    }
}

fn update_planar(
    state: &mut LocomotionState,
    config: &LocomotionConfig,
    input: &LocomotionInput,
    dt: f32,
) {
    let axis = input.move_axis.normalize_or_zero();
    let target_speed = if input.run_held {
        config.run_speed
    } else {
        config.walk_speed
    };

    if axis.length() >= config.input_deadzone {
        let yaw = axis.x.atan2(axis.y) + input.camera_yaw.unwrap_or(0.0);
        let heading = Quat::from_rotation_y(yaw);
        let direction = heading * Vec3::Z;
        state.facing = state
            .facing
            .slerp(heading, lerp_rate(config.rotation_speed, dt));
        state.planar_velocity = state
            .planar_velocity
            .lerp(direction * target_speed, lerp_rate(config.acceleration, dt));
    } else {
        state.planar_velocity = state
            .planar_velocity
            .lerp(Vec3::ZERO, lerp_rate(config.deceleration, dt));
    }
}

fn apply_gravity(state: &mut LocomotionState, config: &LocomotionConfig, bounced: bool, dt: f32) {
    if !state.grounded {
        let gravity = if state.vertical_velocity > 0.0 {
            config.rising_gravity
        } else {
            config.falling_gravity
        };
        state.vertical_velocity -= gravity * dt;
        state.vertical_velocity = state.vertical_velocity.max(-config.terminal_velocity);
    } else if !bounced && state.vertical_velocity < 0.0 {
        state.vertical_velocity = config.ground_stick;
    }
}

fn decay_knockback(state: &mut LocomotionState, config: &LocomotionConfig, dt: f32) {
    if state.knockback_velocity.length() > config.knockback_epsilon {
        state.knockback_velocity = state
            .knockback_velocity
            .lerp(Vec3::ZERO, lerp_rate(config.knockback_decay, dt));
    } else {
        state.knockback_velocity = Vec3::ZERO;
    }
}

fn try_jump(
    state: &mut LocomotionState,
    config: &LocomotionConfig,
    input: &LocomotionInput,
) -> Option<LocomotionEvent> {
    let mut event = None;
    if input.jump_pressed && (state.grounded || state.jumps_used < config.max_jumps) {
        event = Some(LocomotionEvent::Jumped {
            airborne: !state.grounded,
        });
        state.vertical_velocity = config.jump_force;
        state.jumps_used = (state.jumps_used + 1).min(config.max_jumps);
    }
    if input.jump_released && state.vertical_velocity > 0.0 {
        state.vertical_velocity *= 0.5;
    }
    event
}

fn update_animation(
    state: &mut LocomotionState,
    config: &LocomotionConfig,
    input: &LocomotionInput,
    velocity: Vec3,
    dt: f32,
) -> AnimParams {
    let horizontal = Vec3::new(velocity.x, 0.0, velocity.z).length();
    let target = if horizontal > config.input_deadzone {
        if input.run_held {
            1.0
        } else {
            0.5
        }
    } else {
        0.0
    };
    state.anim_blend += (target - state.anim_blend) * config.anim_smoothing.clamp(0.0, 1.0);

    let falling = if !state.grounded && state.vertical_velocity < config.fall_speed_threshold {
        state.fall_timer += dt;
        state.fall_timer > config.fall_debounce
    } else {
        state.fall_timer = 0.0;
        false
    };

    AnimParams {
        speed: state.anim_blend,
        velocity_x: if config.run_speed > 0.0 {
            horizontal / config.run_speed
        } else {
            0.0
        },
        grounded: state.grounded,
        velocity_y: state.vertical_velocity,
        falling,
        jump_trigger: false,
    }
}

/// Advance one simulation tick. The returned velocity is what the physics layer should integrate
/// over `dt`; a jump pressed this tick shows up in the next tick's velocity.
pub fn tick(
    state: &mut LocomotionState,
    config: &LocomotionConfig,
    input: &LocomotionInput,
    sensors: &GroundSensors<'_>,
    dt: f32,
) -> TickOutput {
    let mut events = std::mem::take(&mut state.pending);

    if detect_ground(state, config, sensors) {
        events.push(LocomotionEvent::Landed);
    }

    let mut bounced = false;
    if state.grounded {
        if let Some(force) = bounce_force(config, sensors) {
            state.vertical_velocity = force;
            bounced = true;
            events.push(LocomotionEvent::Bounced { force });
        }
    }

    update_planar(state, config, input, dt);
    apply_gravity(state, config, bounced, dt);

    if sensors.ceiling && state.vertical_velocity > 0.0 {
        state.vertical_velocity = 0.0;
    }

    let velocity =
        state.planar_velocity + Vec3::Y * state.vertical_velocity + state.knockback_velocity;
    decay_knockback(state, config, dt);

    if let Some(jump) = try_jump(state, config, input) {
        events.push(jump);
    }

    let mut anim = update_animation(state, config, input, velocity, dt);
    anim.jump_trigger = events.iter().any(LocomotionEvent::triggers_jump_animation);

    TickOutput {
        velocity,
        facing: state.facing,
        anim,
        events,
    }
}

/// Knock the character back. `direction` is normalized, its vertical component replaced by the
/// configured arc, then scaled by `force` without renormalizing.
pub fn apply_impulse(
    state: &mut LocomotionState,
    config: &LocomotionConfig,
    direction: Vec3,
    force: f32,
) {
    let mut dir = direction.normalize_or_zero();
    dir.y = config.knockback_arc;
    state.knockback_velocity = dir * force;
    state.vertical_velocity = 0.0;
    state.pending.push(LocomotionEvent::KnockedBack { force });
}

/// A controller bound to one character. Inert when the character has no body to move.
#[derive(Component, Clone, Debug)]
pub struct Locomotion {
    pub config: LocomotionConfig,
    pub state: LocomotionState,
    enabled: bool,
}

impl Locomotion {
    pub fn new(config: LocomotionConfig, has_body: bool) -> Self {
        Self {
            config,
            state: LocomotionState::default(),
            enabled: has_body,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn tick(
        &mut self,
        input: &LocomotionInput,
        sensors: &GroundSensors<'_>,
        dt: f32,
    ) -> TickOutput {
        if !self.enabled {
            return TickOutput {
                velocity: Vec3::ZERO,
                facing: self.state.facing,
                anim: AnimParams::default(),
                events: Vec::new(),
            };
        }
        tick(&mut self.state, &self.config, input, sensors, dt)
    }

    pub fn apply_impulse(&mut self, direction: Vec3, force: f32) {
        if self.enabled {
            apply_impulse(&mut self.state, &self.config, direction, force);
        }
    }

    /// Fresh state for a respawn. Keeps the config and whether a body exists.
    pub fn reset(&mut self) {
        self.state = LocomotionState::default();
    }
}
