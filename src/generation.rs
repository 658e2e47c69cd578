use bevy::math::{Quat, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::locomotion_core::SurfaceTag;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    Normal,
    Trampoline,
    Extended,
    Goal,
}

impl PlatformKind {
    pub fn label(self) -> &'static str {
        match self {
            PlatformKind::Normal => "normal",
            PlatformKind::Trampoline => "trampoline",
            PlatformKind::Extended => "extended",
            PlatformKind::Goal => "goal",
        }
    }
}

/// One placement command. Produced once by the generator, consumed by whatever builds geometry.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub kind: PlatformKind,
    pub index: usize,
}

impl PlatformSpec {
    pub fn surface_tag(&self, bounce_force: f32) -> SurfaceTag {
        match self.kind {
            PlatformKind::Trampoline => SurfaceTag::Trampoline(bounce_force),
            PlatformKind::Goal => SurfaceTag::Goal,
            PlatformKind::Normal | PlatformKind::Extended => SurfaceTag::None,
        }
    }

    /// World-space height of the walkable top face.
    pub fn top(&self) -> f32 {
        self.position.y + self.scale.y * 0.5
    }
}

/// A spike prop sitting on top of a generated platform.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct HazardSpec {
    pub position: Vec3,
    pub platform_index: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub count: i32,
    pub start: Vec3,
    pub p_trampoline: f32,
    pub p_extended: f32,
    pub min_offset: Vec3,
    pub max_offset: Vec3,
    pub long_jump_multiplier: f32,
    pub extended_length_factor: f32,
    pub random_rotation: bool,
    /// Degrees either side of zero.
    pub rotation_range: f32,
    pub base_scale: Vec3,
    pub bounce_force: f32,
    pub hazard_probability: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            count: 20,
            start: Vec3::ZERO,
            p_trampoline: 0.2,
            p_extended: 0.1,
            min_offset: Vec3::new(-2.0, 1.5, 4.0),
            max_offset: Vec3::new(2.0, 3.0, 7.0),
            long_jump_multiplier: 2.5,
            extended_length_factor: 3.0,
            random_rotation: false,
            rotation_range: 15.0,
            base_scale: Vec3::new(3.0, 0.5, 3.0),
            bounce_force: 25.0,
            hazard_probability: 0.0,
        }
    }
}

/// Uniform random draws. Seedable implementations make generation reproducible.
pub trait RandomSource {
    fn uniform(&mut self, lo: f32, hi: f32) -> f32;

    fn value(&mut self) -> f32 {
        self.uniform(0.0, 1.0)
    }
}

pub struct SeededRandom(SmallRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            return lo;
        }
        self.0.gen_range(lo..hi)
    }
}

/// Cursor state for a single pass. Never outlives `generate`.
#[derive(Clone, Copy, Debug)]
pub struct GenerationState {
    pub cursor_position: Vec3,
    pub next_jump_is_long: bool,
}

impl GenerationState {
    fn new(start: Vec3) -> Self {
        Self {
            cursor_position: start,
            next_jump_is_long: false,
        }
    }
}

fn random_offset(config: &LevelConfig, rng: &mut impl RandomSource) -> Vec3 {
    Vec3::new(
        rng.uniform(config.min_offset.x, config.max_offset.x),
        rng.uniform(config.min_offset.y, config.max_offset.y),
        rng.uniform(config.min_offset.z, config.max_offset.z),
    )
}

fn roll_kind(config: &LevelConfig, rng: &mut impl RandomSource) -> PlatformKind {
    let r = rng.value();
    if r < config.p_trampoline {
        PlatformKind::Trampoline
    } else if r < config.p_trampoline + config.p_extended {
        PlatformKind::Extended
    } else {
        PlatformKind::Normal
    }
}

/// Lay out a chain of `count` platforms starting at `start`.
///
/// Variant platforms are only rolled while at least two platforms remain after the current one
/// and the previous step was not a trampoline, so the last gap before the goal is always a
/// standard jump. A non-positive `count` yields an empty level.
pub fn generate(
    count: i32,
    start: Vec3,
    config: &LevelConfig,
    rng: &mut impl RandomSource,
) -> Vec<PlatformSpec> {
    if count <= 0 {
        return Vec::new();
    }
    let count = count as usize;
    let mut state = GenerationState::new(start);
    let mut out = Vec::with_capacity(count);

    for i in 0..count {
        let eligible = !state.next_jump_is_long && i + 2 < count;
        let kind = if i + 1 == count {
            PlatformKind::Goal
        } else if eligible {
            roll_kind(config, rng)
        } else {
            PlatformKind::Normal
        };
        // The long gap only ever applies to the step right after a trampoline.
        state.next_jump_is_long = kind == PlatformKind::Trampoline;

        let offset = random_offset(config, rng);

        let mut scale = config.base_scale;
        let mut compensation = Vec3::ZERO;
        if kind == PlatformKind::Extended {
            let factor = config.extended_length_factor.max(1.0);
            scale.z *= factor;
            compensation = Vec3::Z * (config.base_scale.z * (factor - 1.0) * 0.5);
        }

        // Extended platforms carry a ramp that only lines up unrotated.
        let rotation = if config.random_rotation && kind != PlatformKind::Extended {
            let yaw = rng.uniform(-config.rotation_range, config.rotation_range);
            Quat::from_rotation_y(yaw.to_radians())
        } else {
            Quat::IDENTITY
        };

        // Shifted forward so the rear edge stays where a base-size platform's would be.
        out.push(PlatformSpec {
            position: state.cursor_position + compensation,
            rotation,
            scale,
            kind,
            index: i,
        });

        let step = if kind == PlatformKind::Trampoline {
            let m = config.long_jump_multiplier;
            Vec3::new(offset.x, offset.y * m, offset.z * m)
        } else {
            offset
        };
        state.cursor_position += compensation * 2.0 + step;
    }

    out
}

/// Scatter spikes on Normal platforms away from the start and the final approach.
/// Makes no draws when the probability is zero.
pub fn place_hazards(
    platforms: &[PlatformSpec],
    probability: f32,
    rng: &mut impl RandomSource,
) -> Vec<HazardSpec> {
    if probability <= 0.0 || platforms.len() < 4 {
        return Vec::new();
    }
    let last_eligible = platforms.len() - 2;
    platforms
        .iter()
        .filter(|p| p.kind == PlatformKind::Normal && p.index >= 1 && p.index < last_eligible)
        .filter_map(|p| {
            if rng.value() >= probability {
                return None;
            }
            let half_x = p.scale.x * 0.35;
            let local = Vec3::new(rng.uniform(-half_x, half_x), 0.0, 0.0);
            Some(HazardSpec {
                position: Vec3::new(p.position.x, p.top(), p.position.z) + p.rotation * local,
                platform_index: p.index,
            })
        })
        .collect()
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct LevelMetrics {
    pub normal: u32,
    pub trampolines: u32,
    pub extended: u32,
    pub goals: u32,
    pub max_forward_gap: f32,
    pub total_rise: f32,
    pub goal_position: Option<Vec3>,
}

pub fn summarize(platforms: &[PlatformSpec]) -> LevelMetrics {
    let mut metrics = LevelMetrics::default();
    for p in platforms {
        match p.kind {
            PlatformKind::Normal => metrics.normal += 1,
            PlatformKind::Trampoline => metrics.trampolines += 1,
            PlatformKind::Extended => metrics.extended += 1,
            PlatformKind::Goal => {
                metrics.goals += 1;
                metrics.goal_position = Some(p.position);
            }
        }
    }
    for pair in platforms.windows(2) {
        let gap = pair[1].position.z - pair[0].position.z;
        metrics.max_forward_gap = metrics.max_forward_gap.max(gap);
    }
    if let (Some(first), Some(last)) = (platforms.first(), platforms.last()) {
        metrics.total_rise = last.position.y - first.position.y;
    }
    metrics
}

/// Owns the most recent level so regeneration replaces it wholesale.
#[derive(Clone, Debug, Default)]
pub struct LevelGenerator {
    pub config: LevelConfig,
    platforms: Vec<PlatformSpec>,
    hazards: Vec<HazardSpec>,
}

impl LevelGenerator {
    pub fn new(config: LevelConfig) -> Self {
        Self {
            config,
            platforms: Vec::new(),
            hazards: Vec::new(),
        }
    }

    pub fn generate(&mut self, rng: &mut impl RandomSource) -> &[PlatformSpec] {
        self.clear();
        self.platforms = generate(self.config.count, self.config.start, &self.config, rng);
        self.hazards = place_hazards(&self.platforms, self.config.hazard_probability, rng);
        &self.platforms
    }

    pub fn regenerate_with_seed(&mut self, seed: u64) -> &[PlatformSpec] {
        let mut rng = SeededRandom::new(seed);
        self.generate(&mut rng)
    }

    pub fn clear(&mut self) {
        self.platforms.clear();
        self.hazards.clear();
    }

    pub fn platforms(&self) -> &[PlatformSpec] {
        &self.platforms
    }

    pub fn hazards(&self) -> &[HazardSpec] {
        &self.hazards
    }
}
