//! Scan domain — safe deletion of artifacts for destroyed containers.
//!
//! An artifact leaves the watch set only when every log file it claims
//! has been fully read by the shipper, or when another live artifact
//! still claims the same path. Files on runtime-internal mounts are
//! never considered done while unread bytes remain, even if claimed
//! elsewhere.

mod registry;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::state::SharedState;
use crate::store::StoreError;

pub use registry::load_registry;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("registry io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Scanner {
    state: SharedState,
    registry_path: PathBuf,
    interval: Duration,
}

impl Scanner {
    pub fn new(state: SharedState, registry_path: PathBuf, interval: Duration) -> Self {
        Self {
            state,
            registry_path,
            interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let _guard = self.state.process_lock.lock().await;
            if let Err(e) = self.scan() {
                warn!(error = %e, "scan pass failed");
            }
        }
    }

    /// One deletion pass over the watch set.
    pub fn scan(&self) -> Result<(), ScanError> {
        if self.state.watch_set.is_empty() {
            return Ok(());
        }

        let offsets = load_registry(&self.registry_path)?;
        let watched: HashSet<String> = self
            .state
            .watch_set
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let claimed = self
            .state
            .store
            .claimed_paths(|id| watched.contains(id));

        for id in watched {
            if !self.state.store.exists(&id) {
                warn!(container = %id, "watched artifact already gone");
                self.state.watch_set.remove(&id);
                continue;
            }
            // Errors on one artifact never stop the rest of the pass.
            match self.can_remove(&id, &offsets, &claimed) {
                Ok(true) => match self.state.store.remove(&id) {
                    Ok(()) => {
                        info!(container = %id, "artifact removed");
                        self.state.watch_set.remove(&id);
                    }
                    Err(e) => warn!(container = %id, error = %e, "failed to remove artifact"),
                },
                Ok(false) => {}
                Err(e) => warn!(container = %id, error = %e, "deletion check failed"),
            }
        }
        Ok(())
    }

    fn can_remove(
        &self,
        id: &str,
        offsets: &HashMap<String, u64>,
        claimed: &HashMap<String, String>,
    ) -> Result<bool, ScanError> {
        let base_dir = self.state.config.base_dir.trim_end_matches('/');
        for path_glob in self.state.store.read_paths(id)? {
            let auto_mount = is_runtime_mount(base_dir, &path_glob);
            let entries = match glob::glob(&path_glob) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(container = %id, pattern = %path_glob, error = %e, "bad path glob");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let size = match std::fs::metadata(&entry) {
                    Ok(metadata) => metadata.len(),
                    Err(_) => continue,
                };
                let path = entry.to_string_lossy().to_string();
                let Some(offset) = offsets.get(&path) else {
                    warn!(container = %id, file = %path, "no registry offset for file");
                    continue;
                };
                if *offset < size {
                    if auto_mount {
                        return Ok(false);
                    }
                    if !claimed.contains_key(&path_glob) {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }
}

/// Paths under the runtime's own data dirs disappear with the
/// container; unread bytes there are unrecoverable once deleted.
fn is_runtime_mount(base_dir: &str, path_glob: &str) -> bool {
    let parent = Path::new(path_glob)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    parent.starts_with(&format!("{}/var/lib/docker", base_dir))
        || parent.starts_with(&format!("{}/var/lib/kubelet", base_dir))
}
