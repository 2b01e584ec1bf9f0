//! Shared runtime state for the sidecar tasks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::conf::SidecarConfig;
use crate::store::ArtifactStore;

pub type SharedState = Arc<SidecarState>;

pub struct SidecarState {
    pub config: SidecarConfig,
    pub store: ArtifactStore,
    /// Container ids whose artifacts await safe deletion. Destroyed
    /// containers land here; only the scanner removes entries.
    pub watch_set: DashMap<String, ()>,
    /// Serializes event handling, reconciliation, and scan passes so an
    /// artifact is never written and deleted concurrently.
    pub process_lock: Mutex<()>,
}

impl SidecarState {
    pub fn new(config: SidecarConfig, store: ArtifactStore) -> Self {
        Self {
            config,
            store,
            watch_set: DashMap::new(),
            process_lock: Mutex::new(()),
        }
    }
}
