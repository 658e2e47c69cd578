use super::*;
use bevy::ecs::system::SystemParam;

type PlayerItem<'a> = (
    &'a Transform,
    &'a mut Locomotion,
    &'a Velocity,
    &'a BodyContacts,
    &'a AnimatorParams,
);

#[derive(SystemParam)]
pub(super) struct ApiRuntimeCtx<'w, 's> {
    channels: Res<'w, ApiChannels>,
    config: ResMut<'w, GameConfig>,
    session: ResMut<'w, GameSession>,
    level: Res<'w, LevelState>,
    event_bus: Res<'w, GameEventBus>,
    telemetry: Res<'w, GameplayTelemetry>,
    input: ResMut<'w, VirtualInput>,
    fixed_time: Option<ResMut<'w, Time<Fixed>>>,
    players: Query<'w, 's, PlayerItem<'static>, With<Player>>,
}

fn player_state(
    (transform, locomotion, velocity, contacts, anim): (
        &Transform,
        &Locomotion,
        &Velocity,
        &BodyContacts,
        &AnimatorParams,
    ),
) -> PlayerState {
    let (facing_yaw, _, _) = locomotion.state.facing.to_euler(EulerRot::YXZ);
    PlayerState {
        position: transform.translation.to_array(),
        velocity: velocity.0.to_array(),
        facing_yaw,
        grounded: contacts.grounded,
        jumps_used: locomotion.state.jumps_used,
        vertical_velocity: locomotion.state.vertical_velocity,
        knockback: locomotion.state.knockback_velocity.to_array(),
        enabled: locomotion.enabled(),
        anim: anim.0,
    }
}

fn current_player(players: &Query<PlayerItem<'static>, With<Player>>) -> Option<PlayerState> {
    players.iter().next().map(player_state)
}

/// Drain pending API commands. Each command replies on its oneshot even when it fails.
pub(super) fn process_api_commands(ctx: ApiRuntimeCtx<'_, '_>) {
    let ApiRuntimeCtx {
        channels,
        mut config,
        mut session,
        level,
        event_bus,
        telemetry,
        mut input,
        mut fixed_time,
        mut players,
    } = ctx;

    while let Ok(cmd) = channels.receiver.try_recv() {
        match cmd {
            ApiCommand::GetState(tx) => {
                let _ = tx.send(GameState {
                    session: session.snapshot(),
                    frame: event_bus.frame,
                    seed: level.seed,
                    platforms: level.generator.platforms().len(),
                    player: current_player(&players),
                });
            }
            ApiCommand::GetPlayer(tx) => {
                let _ = tx.send(current_player(&players));
            }
            ApiCommand::GetLevel(tx) => {
                let _ = tx.send(level.snapshot());
            }
            ApiCommand::GenerateLevel(req, tx) => {
                if let Some(overrides) = req.config {
                    let mut next = config.clone();
                    let patch = serde_json::json!({ "level": overrides });
                    if let Err(e) = apply_config_overrides(&mut next, &patch) {
                        let _ = tx.send(Err(e));
                        continue;
                    }
                    *config = next;
                }
                match req.seed {
                    Some(seed) => session.request_level(seed),
                    None => session.request_restart(),
                }
                let _ = tx.send(Ok(()));
            }
            ApiCommand::GetConfig(tx) => {
                let _ = tx.send(config.clone());
            }
            ApiCommand::SetConfig(overrides, tx) => {
                let mut next = config.clone();
                if let Err(e) = apply_config_overrides(&mut next, &overrides) {
                    warn!("[Skyhop API] Rejected config override: {e}");
                    let _ = tx.send(Err(e));
                    continue;
                }
                for (_, mut locomotion, _, _, _) in &mut players {
                    locomotion.config = next.locomotion.clone();
                }
                if let Some(fixed) = fixed_time.as_mut() {
                    fixed.set_timestep_hz(next.fixed_hz as f64);
                }
                *config = next.clone();
                let _ = tx.send(Ok(next));
            }
            ApiCommand::ApplyImpulse(req, tx) => {
                let direction = Vec3::from_array(req.direction);
                if !direction.is_finite() || !req.force.is_finite() {
                    let _ = tx.send(Err("direction and force must be finite".into()));
                    continue;
                }
                let Some((_, mut locomotion, _, _, _)) = players.iter_mut().next() else {
                    let _ = tx.send(Err("No player in the world".into()));
                    continue;
                };
                locomotion.apply_impulse(direction, req.force);
                let _ = tx.send(Ok(()));
            }
            ApiCommand::SetInput(req, tx) => {
                if req.release_all {
                    input.clear();
                }
                for action in &req.release {
                    input.release(action);
                }
                for action in &req.press {
                    input.press(action);
                }
                let _ = tx.send(Ok(()));
            }
            ApiCommand::Restart(tx) => {
                session.request_restart();
                let _ = tx.send(Ok(()));
            }
            ApiCommand::GetEvents(query, tx) => {
                let _ = tx.send(event_bus.tail(query.since, query.limit.min(500)));
            }
            ApiCommand::GetTelemetry(tx) => {
                let _ = tx.send(telemetry.clone());
            }
        }
    }
}
