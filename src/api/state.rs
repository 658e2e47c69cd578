use super::*;

/// Read-only data the HTTP thread can use without a round trip through the ECS.
pub(super) struct SnapshotData {
    pub config: GameConfig,
}

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) sender: Sender<ApiCommand>,
    pub(super) snapshot: Arc<RwLock<SnapshotData>>,
}
