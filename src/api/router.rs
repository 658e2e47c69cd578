use super::*;

pub(super) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/player", get(get_player))
        .route("/player/impulse", post(apply_impulse))
        .route("/level", get(get_level))
        .route("/level/generate", post(generate_level))
        .route("/config", get(get_config))
        .route("/config", post(set_config))
        .route("/input", post(set_input))
        .route("/game/restart", post(restart_game))
        .route("/events", get(get_events))
        .route("/telemetry", get(get_telemetry))
        .route("/simulate", post(simulate))
        .with_state(state)
}
