use bevy::prelude::*;
use serde::Serialize;

use crate::collision::CollisionWorld;
use crate::components::{GameConfig, HazardProp, LevelEntity, Platform};
use crate::events::GameEventBus;
use crate::game_runtime::{LevelRestart, SessionSet};
use crate::generation::{summarize, LevelGenerator, LevelMetrics, PlatformKind};
use crate::hazards::{GoalZone, LevelEntityIndex, Spike, Trampoline};

/// The generated level currently in the world.
#[derive(Resource, Clone, Debug, Default)]
pub struct LevelState {
    pub generator: LevelGenerator,
    pub seed: u64,
    pub metrics: LevelMetrics,
}

#[derive(Serialize, Clone)]
pub struct LevelSnapshot {
    pub seed: u64,
    pub platforms: Vec<crate::generation::PlatformSpec>,
    pub hazards: Vec<crate::generation::HazardSpec>,
    pub metrics: LevelMetrics,
}

impl LevelState {
    pub fn snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            seed: self.seed,
            platforms: self.generator.platforms().to_vec(),
            hazards: self.generator.hazards().to_vec(),
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelSet;

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(LevelState::default())
            .insert_resource(CollisionWorld::default())
            .add_systems(Startup, spawn_initial_level.in_set(LevelSet))
            .add_systems(
                Update,
                regenerate_level.in_set(LevelSet).after(SessionSet),
            );
    }
}

struct LevelTargets<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    level: &'a mut LevelState,
    world: &'a mut CollisionWorld,
    index: &'a mut LevelEntityIndex,
    bus: &'a mut GameEventBus,
}

/// Generate a fresh level for `seed` and spawn one entity per placement command.
fn build_level(targets: LevelTargets<'_, '_, '_>, config: &GameConfig, seed: u64) {
    let LevelTargets {
        commands,
        level,
        world,
        index,
        bus,
    } = targets;

    level.generator = LevelGenerator::new(config.level.clone());
    level.generator.regenerate_with_seed(seed);
    level.seed = seed;
    level.metrics = summarize(level.generator.platforms());

    let trampoline = Trampoline {
        bounce_force: config.level.bounce_force,
    };
    index.platforms.clear();
    index.hazards.clear();

    for spec in level.generator.platforms() {
        let mut entity = commands.spawn((
            LevelEntity,
            Platform {
                index: spec.index,
                kind: spec.kind,
            },
            Name::new(format!("platform_{}_{}", spec.index, spec.kind.label())),
            Transform::from_translation(spec.position)
                .with_rotation(spec.rotation)
                .with_scale(spec.scale),
        ));
        match spec.kind {
            PlatformKind::Trampoline => {
                entity.insert(trampoline);
            }
            PlatformKind::Goal => {
                entity.insert(GoalZone::default());
            }
            PlatformKind::Normal | PlatformKind::Extended => {}
        }
        index.platforms.push(entity.id());
    }

    for (i, hazard) in level.generator.hazards().iter().enumerate() {
        let entity = commands.spawn((
            LevelEntity,
            HazardProp {
                index: i,
                platform_index: hazard.platform_index,
            },
            Spike {
                push_force: config.spike_push_force,
            },
            Name::new(format!("spike_{i}")),
            Transform::from_translation(hazard.position),
        ));
        index.hazards.push(entity.id());
    }

    *world = CollisionWorld::from_level(
        level.generator.platforms(),
        level.generator.hazards(),
        level.generator.config.start,
        trampoline.bounce_force,
        config.void_depth,
    );

    let m = &level.metrics;
    info!(
        "[Skyhop level] Generated {} platforms (seed {}): {} normal, {} trampoline, {} extended, {} spikes",
        level.generator.platforms().len(),
        seed,
        m.normal,
        m.trampolines,
        m.extended,
        level.generator.hazards().len()
    );
    bus.emit(
        "level_generated",
        serde_json::json!({
            "seed": seed,
            "platforms": level.generator.platforms().len(),
            "hazards": level.generator.hazards().len(),
        }),
        None,
    );
}

fn spawn_initial_level(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut level: ResMut<LevelState>,
    mut world: ResMut<CollisionWorld>,
    mut index: ResMut<LevelEntityIndex>,
    mut bus: ResMut<GameEventBus>,
) {
    let targets = LevelTargets {
        commands: &mut commands,
        level: &mut level,
        world: &mut world,
        index: &mut index,
        bus: &mut bus,
    };
    build_level(targets, &config, config.seed);
}

/// Clears everything the previous generation spawned before building the next level.
fn regenerate_level(
    mut commands: Commands,
    mut restarts: EventReader<LevelRestart>,
    existing: Query<Entity, With<LevelEntity>>,
    config: Res<GameConfig>,
    mut level: ResMut<LevelState>,
    mut world: ResMut<CollisionWorld>,
    mut index: ResMut<LevelEntityIndex>,
    mut bus: ResMut<GameEventBus>,
) {
    let Some(seed) = restarts.read().last().map(|r| r.seed) else {
        return;
    };
    for entity in &existing {
        commands.entity(entity).despawn_recursive();
    }
    level.generator.clear();
    let targets = LevelTargets {
        commands: &mut commands,
        level: &mut level,
        world: &mut world,
        index: &mut index,
        bus: &mut bus,
    };
    build_level(targets, &config, seed);
}
