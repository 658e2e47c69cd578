use super::*;

/// Ten minutes of play at 60 Hz.
const MAX_SIMULATION_FRAMES: u32 = 36_000;

fn closed<T: Serialize>() -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        ok: false,
        data: None,
        error: Some("Channel closed".into()),
    })
}

type Ack = Result<Result<(), String>, tokio::sync::oneshot::error::RecvError>;

fn ack(reply: Ack) -> Json<ApiResponse<String>> {
    match reply {
        Ok(Ok(())) => Json(ApiResponse::ok()),
        Ok(Err(e)) => Json(ApiResponse::err(e)),
        Err(_) => Json(ApiResponse::err("Channel closed")),
    }
}

pub(super) async fn get_state(State(state): State<AppState>) -> Json<ApiResponse<GameState>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::GetState(tx));
    match rx.await {
        Ok(game_state) => Json(ApiResponse::success(game_state)),
        Err(_) => closed(),
    }
}

pub(super) async fn get_player(State(state): State<AppState>) -> Json<ApiResponse<PlayerState>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::GetPlayer(tx));
    match rx.await {
        Ok(Some(player)) => Json(ApiResponse::success(player)),
        Ok(None) => Json(ApiResponse {
            ok: false,
            data: None,
            error: Some("No player in the world".into()),
        }),
        Err(_) => closed(),
    }
}

pub(super) async fn apply_impulse(
    State(state): State<AppState>,
    Json(req): Json<ImpulseRequest>,
) -> Json<ApiResponse<String>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::ApplyImpulse(req, tx));
    ack(rx.await)
}

pub(super) async fn get_level(State(state): State<AppState>) -> Json<ApiResponse<LevelSnapshot>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::GetLevel(tx));
    match rx.await {
        Ok(level) => Json(ApiResponse::success(level)),
        Err(_) => closed(),
    }
}

pub(super) async fn generate_level(
    State(state): State<AppState>,
    Json(req): Json<GenerateLevelRequest>,
) -> Json<ApiResponse<String>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::GenerateLevel(req, tx));
    ack(rx.await)
}

pub(super) async fn get_config(State(state): State<AppState>) -> Json<ApiResponse<GameConfig>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::GetConfig(tx));
    match rx.await {
        Ok(config) => Json(ApiResponse::success(config)),
        Err(_) => closed(),
    }
}

pub(super) async fn set_config(
    State(state): State<AppState>,
    Json(overrides): Json<serde_json::Value>,
) -> Json<ApiResponse<GameConfig>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::SetConfig(overrides, tx));
    match rx.await {
        Ok(Ok(config)) => Json(ApiResponse::success(config)),
        Ok(Err(e)) => Json(ApiResponse {
            ok: false,
            data: None,
            error: Some(e),
        }),
        Err(_) => closed(),
    }
}

pub(super) async fn set_input(
    State(state): State<AppState>,
    Json(req): Json<InputRequest>,
) -> Json<ApiResponse<String>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::SetInput(req, tx));
    ack(rx.await)
}

pub(super) async fn restart_game(State(state): State<AppState>) -> Json<ApiResponse<String>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::Restart(tx));
    ack(rx.await)
}

pub(super) async fn get_events(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<EventsQuery>,
) -> Json<ApiResponse<Vec<GameEvent>>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::GetEvents(query, tx));
    match rx.await {
        Ok(events) => Json(ApiResponse::success(events)),
        Err(_) => closed(),
    }
}

pub(super) async fn get_telemetry(
    State(state): State<AppState>,
) -> Json<ApiResponse<GameplayTelemetry>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _ = state.sender.send(ApiCommand::GetTelemetry(tx));
    match rx.await {
        Ok(telemetry) => Json(ApiResponse::success(telemetry)),
        Err(_) => closed(),
    }
}

/// Runs headless against the last published config; never touches the live world.
pub(super) async fn simulate(
    State(state): State<AppState>,
    Json(req): Json<SimulationRequest>,
) -> Json<ApiResponse<SimulationResult>> {
    let config = match state.snapshot.read() {
        Ok(snap) => snap.config.clone(),
        Err(_) => {
            return Json(ApiResponse {
                ok: false,
                data: None,
                error: Some("Config snapshot unavailable".into()),
            })
        }
    };
    if req.max_frames > MAX_SIMULATION_FRAMES {
        return Json(ApiResponse {
            ok: false,
            data: None,
            error: Some(format!("max_frames must not exceed {MAX_SIMULATION_FRAMES}")),
        });
    }
    if let Some(level) = &req.level {
        let mut candidate = config.clone();
        candidate.level = level.clone();
        if let Err(e) = candidate.validate() {
            return Json(ApiResponse {
                ok: false,
                data: None,
                error: Some(e),
            });
        }
    }

    let result = simulation::run_simulation(&config, &req);
    Json(ApiResponse::success(result))
}
