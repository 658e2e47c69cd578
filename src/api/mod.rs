mod command_runtime;
mod commands;
mod router;
mod routes;
mod state;
pub mod types;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::sync::{Arc, RwLock};

use crate::components::*;
use crate::events::{GameEvent, GameEventBus};
use crate::game_runtime::{GameSession, SessionSet};
use crate::input::VirtualInput;
use crate::level::{LevelSnapshot, LevelState};
use crate::locomotion_core::Locomotion;
use crate::simulation::{self, SimulationRequest, SimulationResult};
use crate::telemetry::GameplayTelemetry;
use command_runtime::*;
use commands::*;
use router::build_router;
use routes::*;
use state::*;
use types::*;

const DEFAULT_API_ADDR: &str = "127.0.0.1:3000";

pub struct ApiPlugin;

impl Plugin for ApiPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<ApiCommand>();

        let initial_config = app
            .world()
            .get_resource::<GameConfig>()
            .cloned()
            .unwrap_or_default();
        let snapshot = Arc::new(RwLock::new(SnapshotData {
            config: initial_config,
        }));

        app.insert_resource(ApiChannels { receiver: rx })
            .insert_resource(SharedSnapshot {
                data: snapshot.clone(),
            })
            .add_systems(
                Update,
                (update_snapshot, process_api_commands)
                    .chain()
                    .before(SessionSet),
            );

        let state = AppState {
            sender: tx,
            snapshot,
        };
        let addr = std::env::var("SKYHOP_API_ADDR").unwrap_or_else(|_| DEFAULT_API_ADDR.into());
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("[Skyhop API] Failed to start runtime: {e}");
                    return;
                }
            };
            rt.block_on(async {
                let app = build_router(state);

                let listener = match tokio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        eprintln!("[Skyhop API] Failed to bind {addr}: {e}");
                        return;
                    }
                };

                println!("[Skyhop API] Listening on http://{addr}");

                if let Err(e) = axum::serve(listener, app).await {
                    eprintln!("[Skyhop API] Server stopped: {e}");
                }
            });
        });
    }
}

/// Keep the shared snapshot in sync with current game state
fn update_snapshot(config: Res<GameConfig>, shared: Res<SharedSnapshot>) {
    if config.is_changed() {
        if let Ok(mut snap) = shared.data.try_write() {
            snap.config = config.clone();
        }
    }
}
