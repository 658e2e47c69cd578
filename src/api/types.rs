use serde::{Deserialize, Serialize};

use crate::game_runtime::GameSessionSnapshot;
use crate::locomotion_core::AnimParams;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> ApiResponse<String> {
        ApiResponse {
            ok: true,
            data: Some("ok".to_string()),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> ApiResponse<String> {
        ApiResponse {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct PlayerState {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub facing_yaw: f32,
    pub grounded: bool,
    pub jumps_used: u32,
    pub vertical_velocity: f32,
    pub knockback: [f32; 3],
    pub enabled: bool,
    pub anim: AnimParams,
}

#[derive(Serialize, Clone)]
pub struct GameState {
    pub session: GameSessionSnapshot,
    pub frame: u64,
    pub seed: u64,
    pub platforms: usize,
    pub player: Option<PlayerState>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ImpulseRequest {
    pub direction: [f32; 3],
    pub force: f32,
}

/// Actions to hold down or let go of. Unknown names are accepted and simply never read.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct InputRequest {
    pub press: Vec<String>,
    pub release: Vec<String>,
    pub release_all: bool,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct GenerateLevelRequest {
    pub seed: Option<u64>,
    /// Partial `level` config applied before generating.
    pub config: Option<serde_json::Value>,
}

#[derive(Deserialize, Clone, Copy, Debug)]
pub struct EventsQuery {
    pub since: Option<u64>,
    #[serde(default = "default_event_limit")]
    pub limit: usize,
}

fn default_event_limit() -> usize {
    100
}

impl Default for EventsQuery {
    fn default() -> Self {
        Self {
            since: None,
            limit: default_event_limit(),
        }
    }
}
