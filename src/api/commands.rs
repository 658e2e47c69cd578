use super::*;

type Reply<T> = tokio::sync::oneshot::Sender<T>;

/// Commands sent from API -> Bevy
pub enum ApiCommand {
    GetState(Reply<GameState>),
    GetPlayer(Reply<Option<PlayerState>>),
    GetLevel(Reply<LevelSnapshot>),
    GenerateLevel(GenerateLevelRequest, Reply<Result<(), String>>),
    GetConfig(Reply<GameConfig>),
    SetConfig(serde_json::Value, Reply<Result<GameConfig, String>>),
    ApplyImpulse(ImpulseRequest, Reply<Result<(), String>>),
    SetInput(InputRequest, Reply<Result<(), String>>),
    Restart(Reply<Result<(), String>>),
    GetEvents(EventsQuery, Reply<Vec<GameEvent>>),
    GetTelemetry(Reply<GameplayTelemetry>),
}

#[derive(Resource)]
pub struct ApiChannels {
    pub receiver: Receiver<ApiCommand>,
}

/// Shared snapshot of game data for simulation (updated when the config changes)
#[derive(Resource)]
pub struct SharedSnapshot {
    pub(super) data: Arc<RwLock<SnapshotData>>,
}
