use bevy::prelude::*;
use serde::Serialize;

use crate::collision::{ColliderOwner, Contact};
use crate::components::{BodyContacts, GameConfig, Player};
use crate::events::GameEventBus;
use crate::game_runtime::GameSession;
use crate::locomotion_core::{Locomotion, SurfaceTag};

/// Bounce pad data. The ground probe reads it through the collider's surface tag.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Trampoline {
    pub bounce_force: f32,
}

impl Trampoline {
    pub fn surface_tag(&self) -> SurfaceTag {
        SurfaceTag::Trampoline(self.bounce_force)
    }
}

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Spike {
    pub push_force: f32,
}

impl Spike {
    /// Horizontal unit direction from the spike towards the player. Zero when stacked vertically.
    pub fn push_direction(spike: Vec3, player: Vec3) -> Vec3 {
        let mut dir = player - spike;
        dir.y = 0.0;
        dir.normalize_or_zero()
    }
}

#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct GoalZone {
    reached: bool,
}

impl GoalZone {
    pub fn reached(&self) -> bool {
        self.reached
    }

    /// Returns true only on the first touch.
    pub fn touch(&mut self, completion: &mut impl LevelCompletion) -> bool {
        if self.reached {
            return false;
        }
        self.reached = true;
        completion.level_complete();
        true
    }
}

/// Anything that can be knocked back.
pub trait ImpulseSink {
    fn apply_impulse(&mut self, direction: Vec3, force: f32);
}

impl ImpulseSink for Locomotion {
    fn apply_impulse(&mut self, direction: Vec3, force: f32) {
        Locomotion::apply_impulse(self, direction, force);
    }
}

/// Receiver for terminal level outcomes.
pub trait LevelCompletion {
    fn level_complete(&mut self);
    fn game_over(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContactOutcome {
    Nothing,
    Knockback { direction: Vec3, force: f32 },
    GoalReached,
    Killed,
}

/// Resolve one contact reported by the collision layer. Lethal colliders take priority over
/// whatever surface they carry.
pub fn dispatch_contact(
    contact: &Contact,
    player_position: Vec3,
    spike: &Spike,
    goal: &mut GoalZone,
    sink: &mut impl ImpulseSink,
    completion: &mut impl LevelCompletion,
) -> ContactOutcome {
    if contact.lethal {
        completion.game_over();
        return ContactOutcome::Killed;
    }
    match contact.tag {
        SurfaceTag::None | SurfaceTag::Trampoline(_) => ContactOutcome::Nothing,
        SurfaceTag::Hazard => {
            let direction = Spike::push_direction(contact.origin, player_position);
            sink.apply_impulse(direction, spike.push_force);
            ContactOutcome::Knockback {
                direction,
                force: spike.push_force,
            }
        }
        SurfaceTag::Goal => {
            if goal.touch(completion) {
                ContactOutcome::GoalReached
            } else {
                ContactOutcome::Nothing
            }
        }
    }
}

/// Maps collider owners back to level entities.
#[derive(Resource, Clone, Debug, Default)]
pub struct LevelEntityIndex {
    pub platforms: Vec<Entity>,
    pub hazards: Vec<Entity>,
}

impl LevelEntityIndex {
    pub fn entity_for(&self, owner: ColliderOwner) -> Option<Entity> {
        match owner {
            ColliderOwner::Platform(i) => self.platforms.get(i).copied(),
            ColliderOwner::Hazard(i) => self.hazards.get(i).copied(),
            ColliderOwner::Void => None,
        }
    }
}

pub struct HazardsPlugin;

impl Plugin for HazardsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(LevelEntityIndex::default()).add_systems(
            FixedUpdate,
            resolve_player_contacts
                .after(crate::locomotion::LocomotionSet)
                .run_if(crate::game_runtime::gameplay_systems_enabled),
        );
    }
}

fn resolve_player_contacts(
    mut players: Query<
        (Entity, &Transform, &mut Locomotion, &BodyContacts),
        With<Player>,
    >,
    mut goals: Query<&mut GoalZone>,
    spikes: Query<&Spike>,
    index: Res<LevelEntityIndex>,
    config: Res<GameConfig>,
    mut session: ResMut<GameSession>,
    mut bus: ResMut<GameEventBus>,
) {
    let fallback_spike = Spike {
        push_force: config.spike_push_force,
    };
    let mut unclaimed_goal = GoalZone::default();

    for (entity, transform, mut locomotion, contacts) in &mut players {
        for contact in &contacts.contacts {
            let owner_entity = index.entity_for(contact.owner);
            let spike = owner_entity
                .and_then(|e| spikes.get(e).ok())
                .copied()
                .unwrap_or(fallback_spike);
            let mut goal_slot = owner_entity.and_then(|e| goals.get_mut(e).ok());
            let goal = match goal_slot.as_deref_mut() {
                Some(goal) => goal,
                None => &mut unclaimed_goal,
            };

            let outcome = dispatch_contact(
                contact,
                transform.translation,
                &spike,
                goal,
                &mut *locomotion,
                &mut *session,
            );
            let source = Some(entity.to_bits());
            let p = transform.translation;
            match outcome {
                ContactOutcome::Nothing => {}
                ContactOutcome::Knockback { direction, force } => bus.emit(
                    "spike_hit",
                    serde_json::json!({
                        "direction": [direction.x, direction.y, direction.z],
                        "force": force,
                    }),
                    source,
                ),
                ContactOutcome::GoalReached => {
                    info!("[Skyhop] Goal reached");
                    bus.emit(
                        "goal_reached",
                        serde_json::json!({ "x": p.x, "y": p.y, "z": p.z }),
                        source,
                    );
                }
                ContactOutcome::Killed => {
                    info!("[Skyhop] Player fell into the void");
                    bus.emit(
                        "death",
                        serde_json::json!({ "x": p.x, "y": p.y, "z": p.z }),
                        source,
                    );
                }
            }
            if !matches!(outcome, ContactOutcome::Nothing) && !session.is_playing() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_runtime::{RuntimeStatePlugin, SessionOutcome};
    use crate::input::VirtualInput;
    use crate::level::{LevelPlugin, LevelState};
    use crate::locomotion::LocomotionPlugin;
    use crate::player::PlayerPlugin;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        impulses: Vec<(Vec3, f32)>,
        completed: u32,
        deaths: u32,
    }

    impl ImpulseSink for Recorder {
        fn apply_impulse(&mut self, direction: Vec3, force: f32) {
            self.impulses.push((direction, force));
        }
    }

    impl LevelCompletion for Recorder {
        fn level_complete(&mut self) {
            self.completed += 1;
        }
        fn game_over(&mut self) {
            self.deaths += 1;
        }
    }

    fn contact(tag: SurfaceTag, lethal: bool, origin: Vec3) -> Contact {
        Contact {
            owner: ColliderOwner::Platform(0),
            tag,
            lethal,
            origin,
            point: Vec3::ZERO,
        }
    }

    #[test]
    fn spike_pushes_horizontally_away() {
        let mut sink = Recorder::default();
        let mut completion = Recorder::default();
        let mut goal = GoalZone::default();
        let outcome = dispatch_contact(
            &contact(SurfaceTag::Hazard, false, Vec3::new(0.0, 5.0, 0.0)),
            Vec3::new(3.0, 0.0, 4.0),
            &Spike { push_force: 15.0 },
            &mut goal,
            &mut sink,
            &mut completion,
        );
        let (dir, force) = sink.impulses[0];
        assert_eq!(dir.y, 0.0);
        assert!((dir - Vec3::new(0.6, 0.0, 0.8)).length() < 1e-5);
        assert_eq!(force, 15.0);
        assert!(matches!(outcome, ContactOutcome::Knockback { .. }));
    }

    #[test]
    fn goal_latches_once() {
        let mut sink = Recorder::default();
        let mut completion = Recorder::default();
        let mut goal = GoalZone::default();
        let spike = Spike { push_force: 15.0 };
        let c = contact(SurfaceTag::Goal, false, Vec3::ZERO);
        let first = dispatch_contact(&c, Vec3::ZERO, &spike, &mut goal, &mut sink, &mut completion);
        let second = dispatch_contact(&c, Vec3::ZERO, &spike, &mut goal, &mut sink, &mut completion);
        assert_eq!(first, ContactOutcome::GoalReached);
        assert_eq!(second, ContactOutcome::Nothing);
        assert_eq!(completion.completed, 1);
        assert!(goal.reached());
    }

    #[test]
    fn lethal_contact_ends_the_game() {
        let mut sink = Recorder::default();
        let mut completion = Recorder::default();
        let mut goal = GoalZone::default();
        let outcome = dispatch_contact(
            &contact(SurfaceTag::None, true, Vec3::ZERO),
            Vec3::ZERO,
            &Spike { push_force: 15.0 },
            &mut goal,
            &mut sink,
            &mut completion,
        );
        assert_eq!(outcome, ContactOutcome::Killed);
        assert_eq!(completion.deaths, 1);
        assert!(sink.impulses.is_empty());
    }

    #[test]
    fn trampoline_and_plain_surfaces_do_nothing_on_contact() {
        let mut sink = Recorder::default();
        let mut completion = Recorder::default();
        let mut goal = GoalZone::default();
        for tag in [SurfaceTag::None, Trampoline { bounce_force: 25.0 }.surface_tag()] {
            let outcome = dispatch_contact(
                &contact(tag, false, Vec3::ZERO),
                Vec3::ONE,
                &Spike { push_force: 15.0 },
                &mut goal,
                &mut sink,
                &mut completion,
            );
            assert_eq!(outcome, ContactOutcome::Nothing);
        }
        assert!(sink.impulses.is_empty());
        assert_eq!(completion.completed + completion.deaths, 0);
    }

    #[test]
    fn locomotion_is_an_impulse_sink() {
        let mut locomotion = Locomotion::new(Default::default(), true);
        ImpulseSink::apply_impulse(&mut locomotion, Vec3::X, 15.0);
        assert_eq!(locomotion.state.knockback_velocity, Vec3::new(15.0, 7.5, 0.0));
    }

    fn level_app(tweak: impl FnOnce(&mut GameConfig)) -> App {
        let mut config = GameConfig::default();
        config.level.p_trampoline = 0.0;
        config.level.p_extended = 0.0;
        tweak(&mut config);
        let mut app = App::new();
        app.insert_resource(config)
            .insert_resource(GameEventBus::default())
            .insert_resource(VirtualInput::default())
            .add_plugins(RuntimeStatePlugin)
            .add_plugins(LevelPlugin)
            .add_plugins(PlayerPlugin)
            .add_plugins(LocomotionPlugin)
            .add_plugins(HazardsPlugin);
        app.update();
        app.insert_resource(Time::<()>::default());
        app
    }

    fn tick(app: &mut App) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(1.0 / 60.0));
        app.world_mut().run_schedule(FixedUpdate);
    }

    fn place_player(app: &mut App, feet: Vec3) {
        let mut q = app
            .world_mut()
            .query_filtered::<&mut Transform, With<Player>>();
        q.single_mut(app.world_mut()).translation = feet;
    }

    fn count_events(app: &App, name: &str) -> usize {
        let bus = app.world().resource::<GameEventBus>();
        bus.recent.iter().filter(|e| e.name == name).count()
    }

    #[test]
    fn standing_on_the_goal_completes_the_level_once() {
        let mut app = level_app(|config| config.level.count = 1);
        tick(&mut app);
        tick(&mut app);

        assert_eq!(count_events(&app, "goal_reached"), 1);
        assert_eq!(
            app.world().resource::<GameSession>().outcome(),
            SessionOutcome::LevelComplete
        );
        let goal_entity = *app
            .world()
            .resource::<LevelEntityIndex>()
            .platforms
            .last()
            .expect("goal platform");
        let goal = app
            .world()
            .get::<GoalZone>(goal_entity)
            .expect("goal component");
        assert!(goal.reached());
    }

    #[test]
    fn void_contact_ends_the_session() {
        let mut app = level_app(|config| config.level.count = 5);
        let void_top = {
            let level = app.world().resource::<LevelState>();
            let first = level.generator.platforms()[0];
            let lowest = level
                .generator
                .platforms()
                .iter()
                .map(|p| p.position.y - p.scale.y * 0.5)
                .fold(f32::INFINITY, f32::min);
            Vec3::new(first.position.x, lowest - 20.0, first.position.z)
        };
        place_player(&mut app, void_top);
        tick(&mut app);
        tick(&mut app);

        assert_eq!(count_events(&app, "death"), 1);
        assert_eq!(count_events(&app, "goal_reached"), 0);
        assert_eq!(
            app.world().resource::<GameSession>().outcome(),
            SessionOutcome::GameOver
        );
    }

    #[test]
    fn spike_hit_uses_the_touched_spike_force() {
        let mut app = level_app(|config| {
            config.level.count = 8;
            config.level.hazard_probability = 1.0;
        });
        let hazard = app.world().resource::<LevelState>().generator.hazards()[0];
        let spike_entity = app.world().resource::<LevelEntityIndex>().hazards[0];
        app.world_mut()
            .get_mut::<Spike>(spike_entity)
            .expect("spike component")
            .push_force = 40.0;
        place_player(&mut app, hazard.position + Vec3::new(0.3, 0.6, 0.0));
        tick(&mut app);

        let bus = app.world().resource::<GameEventBus>();
        let hit = bus
            .recent
            .iter()
            .find(|e| e.name == "spike_hit")
            .expect("spike_hit event");
        assert_eq!(hit.data["force"].as_f64(), Some(40.0));
        assert!(app.world().resource::<GameSession>().is_playing());

        let mut q = app
            .world_mut()
            .query_filtered::<&Locomotion, With<Player>>();
        let locomotion = q.single(app.world());
        assert!(locomotion.state.knockback_velocity.x > 0.0);
    }
}
