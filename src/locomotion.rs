use bevy::prelude::*;

use crate::camera::CameraRig;
use crate::collision::CollisionWorld;
use crate::components::{AnimatorParams, Body, BodyContacts, Player, Velocity};
use crate::events::GameEventBus;
use crate::input::VirtualInput;
use crate::locomotion_core::{Locomotion, LocomotionInput};
use crate::simulation::{step_character, ContactFlags};

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocomotionSet;

pub struct LocomotionPlugin;

impl Plugin for LocomotionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            drive_locomotion
                .in_set(LocomotionSet)
                .run_if(crate::game_runtime::gameplay_systems_enabled),
        );
    }
}

/// Edges are taken here so each press drives exactly one tick.
fn read_input(input: &mut VirtualInput, rig: Option<&CameraRig>) -> LocomotionInput {
    LocomotionInput {
        move_axis: input.move_axis(),
        run_held: input.pressed("run"),
        jump_pressed: input.take_just_pressed("jump"),
        jump_released: input.take_just_released("jump"),
        camera_yaw: rig.map(|r| r.yaw),
    }
}

fn drive_locomotion(
    time: Res<Time>,
    world: Res<CollisionWorld>,
    rig: Option<Res<CameraRig>>,
    mut input: ResMut<VirtualInput>,
    mut bus: ResMut<GameEventBus>,
    mut players: Query<
        (
            Entity,
            &mut Transform,
            &mut Locomotion,
            &Body,
            &mut Velocity,
            &mut BodyContacts,
            &mut AnimatorParams,
        ),
        With<Player>,
    >,
) {
    let dt = time.delta_secs();
    let loco_input = read_input(&mut input, rig.as_deref());

    for (entity, mut transform, mut locomotion, body, mut velocity, mut contacts, mut anim) in
        &mut players
    {
        if !locomotion.enabled() {
            continue;
        }
        let flags = ContactFlags {
            grounded: contacts.grounded,
            ceiling: contacts.ceiling,
        };
        let step = step_character(
            &world,
            body.0,
            transform.translation,
            flags,
            &mut locomotion,
            &loco_input,
            dt,
        );

        transform.translation = step.movement.position;
        transform.rotation = step.output.facing;
        velocity.0 = step.output.velocity;
        anim.0 = step.output.anim;
        *contacts = BodyContacts {
            grounded: step.movement.grounded,
            ceiling: step.movement.ceiling,
            contacts: step.movement.contacts,
        };

        let p = transform.translation;
        for event in &step.output.events {
            bus.emit(
                event.name(),
                serde_json::json!({
                    "event": event,
                    "x": p.x,
                    "y": p.y,
                    "z": p.z,
                }),
                Some(entity.to_bits()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::GameConfig;
    use crate::game_runtime::RuntimeStatePlugin;
    use crate::hazards::LevelEntityIndex;
    use crate::level::LevelPlugin;
    use crate::player::PlayerPlugin;
    use std::time::Duration;

    fn test_app() -> App {
        let mut config = GameConfig::default();
        config.level.p_trampoline = 0.0;
        config.level.p_extended = 0.0;
        let mut app = App::new();
        app.insert_resource(config)
            .insert_resource(GameEventBus::default())
            .insert_resource(LevelEntityIndex::default())
            .insert_resource(VirtualInput::default())
            .add_plugins(RuntimeStatePlugin)
            .add_plugins(LevelPlugin)
            .add_plugins(PlayerPlugin)
            .add_plugins(LocomotionPlugin);
        app.update();
        app
    }

    fn tick(app: &mut App) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(1.0 / 60.0));
        app.world_mut().run_schedule(FixedUpdate);
    }

    fn player_state(app: &mut App) -> (Vec3, u32, bool) {
        let mut q = app
            .world_mut()
            .query_filtered::<(&Transform, &Locomotion), With<Player>>();
        let (t, l) = q.single(app.world());
        (t.translation, l.state.jumps_used, l.state.grounded)
    }

    #[test]
    fn player_settles_and_jumps_from_virtual_input() {
        let mut app = test_app();
        app.insert_resource(Time::<()>::default());
        for _ in 0..5 {
            tick(&mut app);
        }
        let (rest, jumps, grounded) = player_state(&mut app);
        assert!(grounded);
        assert_eq!(jumps, 0);

        app.world_mut().resource_mut::<VirtualInput>().press("jump");
        tick(&mut app);
        tick(&mut app);
        let (pos, jumps, _) = player_state(&mut app);
        assert_eq!(jumps, 1);
        assert!(pos.y > rest.y);
        assert!(!app.world().resource::<VirtualInput>().just_pressed.contains("jump"));
        let bus = app.world().resource::<GameEventBus>();
        assert!(bus.recent.iter().any(|e| e.name == "jump"));
    }

    #[test]
    fn forward_input_moves_along_world_z_without_camera() {
        let mut app = test_app();
        app.insert_resource(Time::<()>::default());
        let (start, _, _) = player_state(&mut app);
        app.world_mut().resource_mut::<VirtualInput>().press("forward");
        for _ in 0..10 {
            tick(&mut app);
        }
        let (pos, _, _) = player_state(&mut app);
        assert!(pos.z > start.z);
        assert!((pos.x - start.x).abs() < 1e-3);
    }
}
