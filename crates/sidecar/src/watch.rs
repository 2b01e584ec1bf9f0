//! Watch domain — container lifecycle events driving artifact sync.
//!
//! One subscription attempt at a time: reconcile the full container
//! list, then drain events until the stream fails or ends cleanly. A
//! failed stream is resubscribed after a short delay and followed by a
//! fresh reconciliation to cover events lost in the gap.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collect::{compile, fold_env_labels, CompileError, FormatRegistry};
use crate::runtime::{ContainerRecord, ContainerRuntime, RuntimeError, RuntimeEvent};
use crate::state::SharedState;
use crate::store::StoreError;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Watcher {
    runtime: Arc<dyn ContainerRuntime>,
    state: SharedState,
    formats: FormatRegistry,
}

impl Watcher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, state: SharedState) -> Self {
        Self {
            runtime,
            state,
            formats: FormatRegistry::standard(),
        }
    }

    /// Event loop. Returns only on a clean end-of-stream, which the
    /// caller treats as shutdown.
    pub async fn run(self) {
        loop {
            let mut events = self.runtime.subscribe();

            if let Err(e) = self.reconcile().await {
                warn!(error = %e, "reconciliation failed");
            }

            let mut stream_failed = false;
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        let _guard = self.state.process_lock.lock().await;
                        if let Err(e) = self.handle_event(&event).await {
                            warn!(
                                container = event.container_id(),
                                error = %e,
                                "event handling failed"
                            );
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "event stream failed, resubscribing");
                        stream_failed = true;
                        break;
                    }
                }
            }

            if !stream_failed {
                info!("event stream ended");
                return;
            }
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    }

    /// Bring artifacts in line with the full container list. Errors on
    /// one container never block the rest.
    pub async fn reconcile(&self) -> Result<(), WatchError> {
        let _guard = self.state.process_lock.lock().await;
        let containers = self.runtime.list_containers().await?;
        for container in containers {
            if container.state == "removing" {
                continue;
            }
            if self.state.store.exists(&container.id) {
                continue;
            }
            if let Err(e) = self.materialize(&container.id).await {
                warn!(container = %container.id, error = %e, "failed to materialize artifact");
            }
        }
        Ok(())
    }

    async fn materialize(&self, id: &str) -> Result<(), WatchError> {
        let record = self.runtime.inspect(id).await?;
        self.apply(&record)
    }

    /// Compile the container's declarations and write its artifact.
    fn apply(&self, record: &ContainerRecord) -> Result<(), WatchError> {
        let config = &self.state.config;
        let mut labels = record.labels.clone();
        fold_env_labels(&config.log_prefix, &record.env, &mut labels);

        let log_path = join_base(&config.base_dir, &record.log_path);
        let specs = compile(&config.log_prefix, &labels, &log_path, &self.formats)?;
        if specs.is_empty() {
            debug!(container = %record.id, "no log declarations");
            return Ok(());
        }

        let identity = record.identity_tags(&config.node_name);
        self.state
            .store
            .write(&record.id, &identity, &specs, &config.output)?;
        info!(container = %record.id, sources = specs.len(), "artifact written");
        Ok(())
    }

    async fn handle_event(&self, event: &RuntimeEvent) -> Result<(), WatchError> {
        match event {
            RuntimeEvent::Created(id) | RuntimeEvent::Started(id) | RuntimeEvent::Restarted(id) => {
                if self.state.store.exists(id) {
                    debug!(container = %id, "artifact already present");
                    return Ok(());
                }
                self.materialize(id).await
            }
            RuntimeEvent::Destroyed(id) => {
                // Deletion is deferred to the scanner so unread log
                // tails keep their input until shipped.
                if self.state.store.exists(id) {
                    info!(container = %id, "artifact queued for safe deletion");
                    self.state.watch_set.insert(id.clone(), ());
                }
                Ok(())
            }
        }
    }
}

/// Prefix a runtime-relative log path with the host mount base.
fn join_base(base_dir: &str, log_path: &str) -> String {
    if log_path.is_empty() {
        return String::new();
    }
    format!(
        "{}/{}",
        base_dir.trim_end_matches('/'),
        log_path.trim_start_matches('/')
    )
}
