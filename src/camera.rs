use bevy::prelude::*;

use crate::components::{HeadlessMode, Player};
use crate::input::VirtualInput;

/// Orbit camera state. Its yaw is the reference frame for movement input; without this resource
/// input is interpreted in world space.
#[derive(Resource, Clone)]
pub struct CameraRig {
    pub yaw: f32,
    pub distance: f32,
    pub height: f32,
    /// Radians per second while a turn action is held.
    pub turn_speed: f32,
    pub follow_speed: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            distance: 8.0,
            height: 4.0,
            turn_speed: 2.0,
            follow_speed: 0.15,
        }
    }
}

impl CameraRig {
    /// Desired eye position for a target.
    pub fn eye_for(&self, target: Vec3) -> Vec3 {
        target + Quat::from_rotation_y(self.yaw) * Vec3::new(0.0, self.height, -self.distance)
    }
}

#[derive(Component)]
pub struct MainCamera;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CameraRig::default())
            .add_systems(Startup, spawn_camera)
            .add_systems(Update, (orbit_camera, camera_follow).chain());
    }
}

fn spawn_camera(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    let rig = CameraRig::default();
    commands.spawn((
        MainCamera,
        Camera3d::default(),
        Transform::from_translation(rig.eye_for(Vec3::ZERO)).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 12.0, -6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn orbit_camera(time: Res<Time>, input: Res<VirtualInput>, mut rig: ResMut<CameraRig>) {
    let turn = input.camera_turn();
    if turn != 0.0 {
        rig.yaw += turn * rig.turn_speed * time.delta_secs();
    }
}

fn camera_follow(
    time: Res<Time>,
    rig: Res<CameraRig>,
    player_query: Query<&Transform, (With<Player>, Without<MainCamera>)>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let Ok(mut cam_transform) = camera_query.get_single_mut() else {
        return;
    };
    let Ok(player) = player_query.get_single() else {
        return;
    };
    let target = player.translation + Vec3::Y;
    let alpha = (rig.follow_speed * time.delta_secs() * 60.0).clamp(0.0, 1.0);
    cam_transform.translation = cam_transform.translation.lerp(rig.eye_for(target), alpha);
    cam_transform.look_at(target, Vec3::Y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn eye_sits_behind_target() {
        let rig = CameraRig::default();
        let eye = rig.eye_for(Vec3::ZERO);
        assert!((eye - Vec3::new(0.0, 4.0, -8.0)).length() < 1e-5);
    }

    #[test]
    fn turn_actions_rotate_the_rig() {
        let mut app = App::new();
        app.insert_resource(HeadlessMode(true))
            .insert_resource(VirtualInput::default())
            .insert_resource(Time::<()>::default())
            .add_plugins(CameraPlugin);
        app.world_mut().resource_mut::<VirtualInput>().press("camera_right");
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_millis(500));
        app.update();
        let rig = app.world().resource::<CameraRig>();
        assert!((rig.yaw - 1.0).abs() < 1e-4);
    }
}
