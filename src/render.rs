use crate::components::*;
use crate::generation::PlatformKind;
use bevy::prelude::*;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_palette)
            .add_systems(Update, (attach_platform_meshes, attach_spike_meshes, attach_player_mesh));
    }
}

/// Shared unit meshes and one material per platform kind.
#[derive(Resource)]
struct Palette {
    cube: Handle<Mesh>,
    cone: Handle<Mesh>,
    capsule: Handle<Mesh>,
    normal: Handle<StandardMaterial>,
    trampoline: Handle<StandardMaterial>,
    extended: Handle<StandardMaterial>,
    goal: Handle<StandardMaterial>,
    spike: Handle<StandardMaterial>,
    player: Handle<StandardMaterial>,
}

impl Palette {
    fn material(&self, kind: PlatformKind) -> Handle<StandardMaterial> {
        match kind {
            PlatformKind::Normal => self.normal.clone(),
            PlatformKind::Trampoline => self.trampoline.clone(),
            PlatformKind::Extended => self.extended.clone(),
            PlatformKind::Goal => self.goal.clone(),
        }
    }
}

fn load_palette(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<GameConfig>,
) {
    let mut color = |r: f32, g: f32, b: f32| materials.add(Color::srgb(r, g, b));
    commands.insert_resource(Palette {
        cube: meshes.add(Cuboid::new(1.0, 1.0, 1.0)),
        cone: meshes.add(Cone {
            radius: 0.4,
            height: 0.6,
        }),
        capsule: meshes.add(Capsule3d::new(
            config.body.radius,
            (config.body.height - 2.0 * config.body.radius).max(0.0),
        )),
        normal: color(0.55, 0.6, 0.68),
        trampoline: color(0.95, 0.45, 0.2),
        extended: color(0.45, 0.7, 0.5),
        goal: color(0.95, 0.85, 0.25),
        spike: color(0.8, 0.15, 0.2),
        player: color(0.2, 0.4, 0.9),
    });
}

fn attach_platform_meshes(
    mut commands: Commands,
    palette: Option<Res<Palette>>,
    query: Query<(Entity, &Platform), Added<Platform>>,
) {
    let Some(palette) = palette else {
        return;
    };
    for (entity, platform) in &query {
        commands.entity(entity).insert((
            Mesh3d(palette.cube.clone()),
            MeshMaterial3d(palette.material(platform.kind)),
        ));
    }
}

fn attach_spike_meshes(
    mut commands: Commands,
    palette: Option<Res<Palette>>,
    query: Query<Entity, Added<HazardProp>>,
) {
    let Some(palette) = palette else {
        return;
    };
    for entity in &query {
        commands.entity(entity).with_children(|parent| {
            parent.spawn((
                Mesh3d(palette.cone.clone()),
                MeshMaterial3d(palette.spike.clone()),
                Transform::from_xyz(0.0, 0.3, 0.0),
            ));
        });
    }
}

fn attach_player_mesh(
    mut commands: Commands,
    palette: Option<Res<Palette>>,
    config: Res<GameConfig>,
    query: Query<Entity, (Added<Player>, With<Body>)>,
) {
    let Some(palette) = palette else {
        return;
    };
    for entity in &query {
        commands.entity(entity).with_children(|parent| {
            parent.spawn((
                Mesh3d(palette.capsule.clone()),
                MeshMaterial3d(palette.player.clone()),
                Transform::from_xyz(0.0, config.body.height * 0.5, 0.0),
            ));
        });
    }
}
