use bevy::prelude::*;

use crate::components::*;
use crate::game_runtime::LevelRestart;
use crate::input::VirtualInput;
use crate::level::{LevelSet, LevelState};
use crate::locomotion_core::Locomotion;
use crate::simulation::spawn_position;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_player.after(LevelSet))
            .add_systems(Update, respawn_player.after(LevelSet));
    }
}

fn spawn_player(mut commands: Commands, config: Res<GameConfig>, level: Res<LevelState>) {
    let body = config.body.is_usable();
    let spawn = spawn_position(&level.generator);

    let mut entity = commands.spawn((
        Player,
        Name::new("player"),
        Transform::from_translation(spawn),
        Velocity::default(),
        BodyContacts::default(),
        AnimatorParams::default(),
        Locomotion::new(config.locomotion.clone(), body),
    ));

    if body {
        entity.insert(Body(config.body));
    } else {
        warn!(
            "[Skyhop] Player body is degenerate (radius {}, height {}); locomotion disabled",
            config.body.radius, config.body.height
        );
    }
}

/// Put the player back on the first platform of the new level with fresh locomotion state.
fn respawn_player(
    mut restarts: EventReader<LevelRestart>,
    config: Res<GameConfig>,
    level: Res<LevelState>,
    mut input: ResMut<VirtualInput>,
    mut players: Query<
        (
            &mut Transform,
            &mut Locomotion,
            &mut Velocity,
            &mut BodyContacts,
            &mut AnimatorParams,
        ),
        With<Player>,
    >,
) {
    if restarts.read().last().is_none() {
        return;
    }
    let spawn = spawn_position(&level.generator);
    for (mut transform, mut locomotion, mut velocity, mut contacts, mut anim) in &mut players {
        transform.translation = spawn;
        transform.rotation = Quat::IDENTITY;
        locomotion.config = config.locomotion.clone();
        locomotion.reset();
        *velocity = Velocity::default();
        *contacts = BodyContacts::default();
        *anim = AnimatorParams::default();
    }
    input.clear_frame();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_runtime::{GameSession, RuntimeStatePlugin};
    use crate::hazards::LevelEntityIndex;
    use crate::events::GameEventBus;
    use crate::level::LevelPlugin;

    fn test_app(config: GameConfig) -> App {
        let mut app = App::new();
        app.insert_resource(config)
            .insert_resource(GameEventBus::default())
            .insert_resource(LevelEntityIndex::default())
            .insert_resource(VirtualInput::default())
            .add_plugins(RuntimeStatePlugin)
            .add_plugins(LevelPlugin)
            .add_plugins(PlayerPlugin);
        app
    }

    fn player(app: &mut App) -> (Transform, bool, bool) {
        let mut q = app
            .world_mut()
            .query_filtered::<(&Transform, &Locomotion, Option<&Body>), With<Player>>();
        let (t, l, b) = q.single(app.world());
        (*t, l.enabled(), b.is_some())
    }

    #[test]
    fn player_starts_on_first_platform() {
        let mut app = test_app(GameConfig::default());
        app.update();
        let (transform, enabled, body) = player(&mut app);
        assert!(enabled && body);
        let first = app.world().resource::<LevelState>().generator.platforms()[0];
        assert_eq!(transform.translation, first.position + Vec3::Y * first.scale.y * 0.5);
    }

    #[test]
    fn missing_body_disables_locomotion() {
        let mut config = GameConfig::default();
        config.body.radius = 0.0;
        let mut app = test_app(config);
        app.update();
        let (_, enabled, body) = player(&mut app);
        assert!(!enabled);
        assert!(!body);
    }

    #[test]
    fn restart_moves_player_back_to_spawn() {
        let mut app = test_app(GameConfig::default());
        app.update();
        {
            let mut q = app
                .world_mut()
                .query_filtered::<&mut Transform, With<Player>>();
            let mut t = q.single_mut(app.world_mut());
            t.translation = Vec3::new(50.0, -30.0, 2.0);
        }
        {
            let mut q = app
                .world_mut()
                .query_filtered::<&mut Locomotion, With<Player>>();
            let mut locomotion = q.single_mut(app.world_mut());
            locomotion.state.jumps_used = 2;
            locomotion.state.vertical_velocity = -9.0;
        }
        app.world_mut().resource_mut::<GameConfig>().locomotion.jump_force = 20.0;
        app.world_mut().resource_mut::<GameSession>().request_level(5);
        app.update();
        let (transform, enabled, _) = player(&mut app);
        assert!(enabled);
        let level = app.world().resource::<LevelState>();
        assert_eq!(level.seed, 5);
        assert_eq!(transform.translation, spawn_position(&level.generator));

        let mut q = app
            .world_mut()
            .query_filtered::<&Locomotion, With<Player>>();
        let locomotion = q.single(app.world());
        assert_eq!(locomotion.state.jumps_used, 0);
        assert_eq!(locomotion.state.vertical_velocity, 0.0);
        assert_eq!(locomotion.config.jump_force, 20.0);
    }

    #[test]
    fn restart_keeps_a_bodiless_player_disabled() {
        let mut config = GameConfig::default();
        config.body.height = 0.0;
        let mut app = test_app(config);
        app.update();
        app.world_mut().resource_mut::<GameSession>().request_restart();
        app.update();
        let (_, enabled, body) = player(&mut app);
        assert!(!enabled);
        assert!(!body);
    }
}
