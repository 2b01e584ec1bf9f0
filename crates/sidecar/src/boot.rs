//! Boot — logging init, config load, runtime connection, task spawn.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::{RuntimeKind, SidecarConfig};
use crate::runtime::containerd::ContainerdRuntime;
use crate::runtime::docker::DockerRuntime;
use crate::runtime::ContainerRuntime;
use crate::scan::Scanner;
use crate::shipper;
use crate::shipper::Supervisor;
use crate::state::{SharedState, SidecarState};
use crate::store::ArtifactStore;
use crate::watch::Watcher;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sidecar=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config, sweep stale artifacts, start the shipper and the
/// background tasks.
///
/// Returns `(SharedState, Supervisor)` on success.
pub async fn boot() -> Result<(SharedState, Supervisor), Box<dyn std::error::Error>> {
    info!("Starting watchlog sidecar v{}", env!("CARGO_PKG_VERSION"));

    let config = SidecarConfig::load()?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    let kind = config
        .runtime
        .ok_or("no container runtime configured")?;
    info!(
        "Loaded configuration: runtime={}, log_prefix={}, base_dir={}",
        kind.as_str(),
        config.log_prefix,
        config.base_dir
    );

    // Artifacts from a previous run are stale until reconciliation
    // rewrites them.
    let store = ArtifactStore::new(shipper::conf_dir());
    store.clean()?;
    info!("Cleaned artifact directory: {}", store.conf_dir().display());

    let state = Arc::new(SidecarState::new(config.clone(), store));

    let supervisor = Supervisor::new(shipper::exec_path(), shipper::conf_file());
    supervisor.start()?;

    let scanner = Scanner::new(
        Arc::clone(&state),
        shipper::registry_file(),
        Duration::from_secs(config.scan_interval_secs),
    );
    info!(
        "Starting scan task (interval: {}s)",
        config.scan_interval_secs
    );
    tokio::spawn(scanner.run());

    let runtime: Arc<dyn ContainerRuntime> = match kind {
        RuntimeKind::Docker => Arc::new(DockerRuntime::new(&config.docker_socket).map_err(|e| {
            error!("Failed to connect to Docker: {}", e);
            e
        })?),
        RuntimeKind::Containerd => Arc::new(
            ContainerdRuntime::connect(&config.containerd_socket, &config.containerd_namespace)
                .await
                .map_err(|e| {
                    error!("Failed to connect to containerd: {}", e);
                    e
                })?,
        ),
    };
    info!("Connected to {} runtime", kind.as_str());

    tokio::spawn(Watcher::new(runtime, Arc::clone(&state)).run());

    Ok((state, supervisor))
}

/// Block until SIGINT or SIGTERM.
pub async fn wait_for_shutdown() -> std::io::Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}
