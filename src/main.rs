#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

#[cfg(not(target_arch = "wasm32"))]
mod api;
mod camera;
mod collision;
mod components;
mod events;
mod game_runtime;
mod generation;
mod hazards;
mod input;
mod level;
mod locomotion;
mod locomotion_core;
mod player;
mod render;
mod simulation;
mod telemetry;

use bevy::prelude::*;
use components::{apply_config_overrides, GameConfig, HeadlessMode};

#[derive(serde::Deserialize, Default)]
struct StartupConfig {
    window_title: Option<String>,
    window_width: Option<f32>,
    window_height: Option<f32>,
    background_color: Option<[f32; 3]>,
    /// Partial gameplay config layered over the defaults.
    game: Option<serde_json::Value>,
}

fn load_startup_config() -> StartupConfig {
    let path = std::env::var("SKYHOP_GAME_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "game.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
            Ok(cfg) => {
                println!("[Skyhop] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Skyhop] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

fn resolve_game_config(overrides: Option<&serde_json::Value>) -> GameConfig {
    let mut config = GameConfig::default();
    if let Some(overrides) = overrides {
        if let Err(e) = apply_config_overrides(&mut config, overrides) {
            eprintln!("[Skyhop] Ignoring invalid game config: {}", e);
        }
    }
    config
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let startup_config = load_startup_config();
    let game_config = resolve_game_config(startup_config.game.as_ref());
    let mut app = App::new();

    app.insert_resource(HeadlessMode(headless));

    if headless {
        // Headless mode: no window, no rendering, just ECS + API
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::log::LogPlugin::default());
        println!("[Skyhop] Starting in HEADLESS mode");
    } else {
        let window_title = startup_config
            .window_title
            .unwrap_or_else(|| "Skyhop".to_string());
        let window_width = startup_config.window_width.unwrap_or(1280.0);
        let window_height = startup_config.window_height.unwrap_or(720.0);

        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window_title,
                resolution: (window_width, window_height).into(),
                present_mode: bevy::window::PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }));
        let bg = startup_config.background_color.unwrap_or([0.53, 0.75, 0.92]);
        app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])));
        app.add_plugins(render::RenderPlugin);
        println!("[Skyhop] Starting in WINDOWED mode");
    }

    app.insert_resource(Time::<Fixed>::from_hz(game_config.fixed_hz as f64))
        .insert_resource(game_config)
        .add_plugins(input::InputPlugin)
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(game_runtime::RuntimeStatePlugin)
        .add_plugins(level::LevelPlugin)
        .add_plugins(player::PlayerPlugin)
        .add_plugins(locomotion::LocomotionPlugin)
        .add_plugins(hazards::HazardsPlugin)
        .add_plugins(camera::CameraPlugin)
        .add_plugins(telemetry::TelemetryPlugin);

    #[cfg(not(target_arch = "wasm32"))]
    app.add_plugins(api::ApiPlugin);

    app.run();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_section_overrides_defaults() {
        let cfg: StartupConfig = serde_json::from_str(
            r#"{ "window_title": "Test", "game": { "seed": 9, "level": { "count": 4 } } }"#,
        )
        .expect("parse");
        let game = resolve_game_config(cfg.game.as_ref());
        assert_eq!(game.seed, 9);
        assert_eq!(game.level.count, 4);
    }

    #[test]
    fn invalid_game_section_falls_back_to_defaults() {
        let overrides = serde_json::json!({ "fixed_hz": 0.0 });
        let game = resolve_game_config(Some(&overrides));
        assert_eq!(game.fixed_hz, GameConfig::default().fixed_hz);
    }
}
