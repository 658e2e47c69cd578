use bevy::prelude::*;
use std::collections::HashSet;

/// Abstraction layer between raw input and game systems.
/// Both keyboard (windowed) and the API (headless) write to this.
///
/// Edges accumulate until a consumer takes them, so a press is never lost when a frame runs no
/// fixed ticks and never applied twice when it runs several.
#[derive(Resource, Default, Clone)]
pub struct VirtualInput {
    pub active: HashSet<String>,
    pub just_pressed: HashSet<String>,
    pub just_released: HashSet<String>,
}

impl VirtualInput {
    pub fn pressed(&self, action: &str) -> bool {
        self.active.contains(action)
    }

    pub fn press(&mut self, action: &str) {
        if self.active.insert(action.to_string()) {
            self.just_pressed.insert(action.to_string());
        }
    }

    pub fn release(&mut self, action: &str) {
        if self.active.remove(action) {
            self.just_released.insert(action.to_string());
        }
    }

    pub fn take_just_pressed(&mut self, action: &str) -> bool {
        self.just_pressed.remove(action)
    }

    pub fn take_just_released(&mut self, action: &str) -> bool {
        self.just_released.remove(action)
    }

    /// Camera-relative stick: +y forward, +x right.
    pub fn move_axis(&self) -> Vec2 {
        let mut axis = Vec2::ZERO;
        if self.pressed("forward") {
            axis.y += 1.0;
        }
        if self.pressed("back") {
            axis.y -= 1.0;
        }
        if self.pressed("right") {
            axis.x += 1.0;
        }
        if self.pressed("left") {
            axis.x -= 1.0;
        }
        axis
    }

    /// -1, 0 or 1 for orbiting the camera.
    pub fn camera_turn(&self) -> f32 {
        let mut turn = 0.0;
        if self.pressed("camera_left") {
            turn -= 1.0;
        }
        if self.pressed("camera_right") {
            turn += 1.0;
        }
        turn
    }

    pub fn clear_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.clear_frame();
    }
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default()).add_systems(
            PreUpdate,
            keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
        );
    }
}

const BINDINGS: &[(&str, &[KeyCode])] = &[
    ("forward", &[KeyCode::KeyW, KeyCode::ArrowUp]),
    ("back", &[KeyCode::KeyS, KeyCode::ArrowDown]),
    ("left", &[KeyCode::KeyA, KeyCode::ArrowLeft]),
    ("right", &[KeyCode::KeyD, KeyCode::ArrowRight]),
    ("run", &[KeyCode::ShiftLeft, KeyCode::ShiftRight]),
    ("jump", &[KeyCode::Space]),
    ("camera_left", &[KeyCode::KeyQ]),
    ("camera_right", &[KeyCode::KeyE]),
    ("restart", &[KeyCode::KeyR]),
];

/// Translate keyboard input to VirtualInput action names
fn keyboard_to_virtual(keyboard: Res<ButtonInput<KeyCode>>, mut vinput: ResMut<VirtualInput>) {
    for (action, keys) in BINDINGS {
        // Only edges are forwarded so actions held through the API survive idle keyboards.
        if keyboard.any_just_pressed(keys.iter().copied()) {
            vinput.press(action);
        } else if keyboard.any_just_released(keys.iter().copied())
            && !keyboard.any_pressed(keys.iter().copied())
        {
            vinput.release(action);
        }
    }
}
