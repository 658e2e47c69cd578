use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::collision::{BodyShape, Contact};
use crate::generation::{LevelConfig, PlatformKind};
use crate::locomotion_core::{AnimParams, LocomotionConfig};

/// Marks the player entity
#[derive(Component)]
pub struct Player;

/// Capsule-ish body the kinematic mover works with. A player without one never moves.
#[derive(Component, Clone, Copy, Debug)]
pub struct Body(pub BodyShape);

/// Velocity in world units per second, as last produced by locomotion
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Velocity(pub Vec3);

/// Contacts collected by the last kinematic move of a body
#[derive(Component, Clone, Debug, Default)]
pub struct BodyContacts {
    pub grounded: bool,
    pub ceiling: bool,
    pub contacts: Vec<Contact>,
}

/// Animator-facing parameters, refreshed every tick
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct AnimatorParams(pub AnimParams);

/// A generated platform
#[derive(Component, Clone, Copy, Debug)]
pub struct Platform {
    pub index: usize,
    pub kind: PlatformKind,
}

/// Spike prop index into the generated hazard list
#[derive(Component, Clone, Copy, Debug)]
pub struct HazardProp {
    pub index: usize,
    pub platform_index: usize,
}

/// Despawned wholesale when the level is regenerated
#[derive(Component)]
pub struct LevelEntity;

/// Present when running without a window
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// All tuning values for one session.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub level: LevelConfig,
    pub locomotion: LocomotionConfig,
    pub body: BodyShape,
    pub spike_push_force: f32,
    /// Distance from the lowest platform's underside to the lethal floor.
    pub void_depth: f32,
    pub seed: u64,
    pub fixed_hz: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            level: LevelConfig::default(),
            locomotion: LocomotionConfig::default(),
            body: BodyShape::default(),
            spike_push_force: 15.0,
            void_depth: 20.0,
            seed: 1,
            fixed_hz: 60.0,
        }
    }
}

const MAX_LEVEL_PLATFORMS: i32 = 10_000;

fn check_non_negative(name: &str, value: f32) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{name} must be a finite non-negative number, got {value}"));
    }
    Ok(())
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        let l = &self.locomotion;
        for (name, value) in [
            ("locomotion.walk_speed", l.walk_speed),
            ("locomotion.run_speed", l.run_speed),
            ("locomotion.acceleration", l.acceleration),
            ("locomotion.deceleration", l.deceleration),
            ("locomotion.rotation_speed", l.rotation_speed),
            ("locomotion.jump_force", l.jump_force),
            ("locomotion.rising_gravity", l.rising_gravity),
            ("locomotion.falling_gravity", l.falling_gravity),
            ("locomotion.terminal_velocity", l.terminal_velocity),
            ("locomotion.knockback_decay", l.knockback_decay),
            ("body.radius", self.body.radius),
            ("body.height", self.body.height),
            ("level.p_trampoline", self.level.p_trampoline),
            ("level.p_extended", self.level.p_extended),
            ("level.long_jump_multiplier", self.level.long_jump_multiplier),
            ("level.bounce_force", self.level.bounce_force),
            ("level.hazard_probability", self.level.hazard_probability),
            ("spike_push_force", self.spike_push_force),
            ("void_depth", self.void_depth),
        ] {
            check_non_negative(name, value)?;
        }
        if !self.fixed_hz.is_finite() || self.fixed_hz < 1.0 {
            return Err(format!("fixed_hz must be at least 1, got {}", self.fixed_hz));
        }
        if self.level.count > MAX_LEVEL_PLATFORMS {
            return Err(format!(
                "level.count must not exceed {MAX_LEVEL_PLATFORMS}, got {}",
                self.level.count
            ));
        }
        if self.level.p_trampoline + self.level.p_extended > 1.0 {
            return Err("level.p_trampoline + level.p_extended must not exceed 1".into());
        }
        let (min, max) = (self.level.min_offset, self.level.max_offset);
        if min.x > max.x || min.y > max.y || min.z > max.z {
            return Err("level.min_offset must not exceed level.max_offset on any axis".into());
        }
        Ok(())
    }
}

/// Overlay `patch` onto the serialized form of `target`, refusing keys `target` does not have.
fn merge_section<T>(target: &mut T, section: &str, patch: &serde_json::Value) -> Result<(), String>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    let Some(patch) = patch.as_object() else {
        return Err(format!("{section} must be an object"));
    };
    let mut current =
        serde_json::to_value(&*target).map_err(|e| format!("Invalid {section} config: {e}"))?;
    let Some(fields) = current.as_object_mut() else {
        return Err(format!("{section} does not serialize to an object"));
    };
    for (key, value) in patch {
        if !fields.contains_key(key) {
            return Err(format!("Unsupported config override key: {section}.{key}"));
        }
        fields.insert(key.clone(), value.clone());
    }
    *target = serde_json::from_value(current)
        .map_err(|e| format!("Invalid {section} override: {e}"))?;
    Ok(())
}

/// Apply a partial JSON override. The config is left untouched if any key fails.
pub fn apply_config_overrides(
    config: &mut GameConfig,
    overrides: &serde_json::Value,
) -> Result<(), String> {
    if overrides.is_null() {
        return Ok(());
    }
    let Some(obj) = overrides.as_object() else {
        return Err("config overrides must be an object".into());
    };
    let mut next = config.clone();
    for (key, value) in obj {
        match key.as_str() {
            "level" => merge_section(&mut next.level, "level", value)?,
            "locomotion" => merge_section(&mut next.locomotion, "locomotion", value)?,
            "body" => merge_section(&mut next.body, "body", value)?,
            "spike_push_force" => {
                next.spike_push_force =
                    value.as_f64().ok_or("spike_push_force must be a number")? as f32;
            }
            "void_depth" => {
                next.void_depth = value.as_f64().ok_or("void_depth must be a number")? as f32;
            }
            "fixed_hz" => {
                next.fixed_hz = value.as_f64().ok_or("fixed_hz must be a number")? as f32;
            }
            "seed" => {
                next.seed = value.as_u64().ok_or("seed must be an unsigned integer")?;
            }
            other => return Err(format!("Unsupported config override key: {other}")),
        }
    }
    next.validate()?;
    *config = next;
    Ok(())
}
