//! Shipper process supervision.
//!
//! The shipper runs as a child process for the sidecar's whole
//! lifetime. It picks up artifact changes itself by watching its
//! inputs directory, so supervision is only liveness: respawn on exit,
//! kill on shutdown.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const RESTART_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("shipper already running")]
    AlreadyRunning,
    #[error("failed to spawn shipper: {0}")]
    Spawn(#[from] std::io::Error),
}

pub struct Supervisor {
    binary: PathBuf,
    config_file: PathBuf,
    running: Arc<AtomicBool>,
    // Level-triggered: a stop request raised while the supervise loop
    // is sleeping or respawning must still be observed.
    shutdown: watch::Sender<bool>,
}

impl Supervisor {
    pub fn new(binary: PathBuf, config_file: PathBuf) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            binary,
            config_file,
            running: Arc::new(AtomicBool::new(false)),
            shutdown,
        }
    }

    fn spawn_child(binary: &PathBuf, config_file: &PathBuf) -> Result<Child, std::io::Error> {
        Command::new(binary)
            .arg("-c")
            .arg(config_file)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
    }

    /// Spawn the shipper and a background task keeping it alive.
    pub fn start(&self) -> Result<(), SupervisorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SupervisorError::AlreadyRunning);
        }
        self.shutdown.send_replace(false);

        let child = match Self::spawn_child(&self.binary, &self.config_file) {
            Ok(child) => child,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(SupervisorError::Spawn(e));
            }
        };
        info!(pid = child.id(), "shipper started");

        let binary = self.binary.clone();
        let config_file = self.config_file.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.subscribe();
        tokio::spawn(supervise(child, binary, config_file, running, shutdown));
        Ok(())
    }

    /// Stop the shipper and end supervision.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// The shipper reloads its inputs directory on its own; nothing to
    /// signal.
    pub fn reload(&self) {
        debug!("shipper reload requested, inputs dir is self-reloading");
    }
}

async fn supervise(
    mut child: Child,
    binary: PathBuf,
    config_file: PathBuf,
    running: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) => warn!(%status, "shipper exited"),
                    Err(e) => warn!(error = %e, "failed to await shipper"),
                }
                tokio::time::sleep(RESTART_DELAY).await;
                // a stop raised during the delay ends supervision here;
                // the child is already gone
                if *shutdown.borrow() {
                    running.store(false, Ordering::SeqCst);
                    info!("shipper stopped");
                    return;
                }
                match Supervisor::spawn_child(&binary, &config_file) {
                    Ok(respawned) => {
                        info!(pid = respawned.id(), "shipper restarted");
                        child = respawned;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to restart shipper");
                        running.store(false, Ordering::SeqCst);
                        return;
                    }
                }
            }
            // a dropped sender also ends supervision
            _ = shutdown.changed() => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill shipper");
                }
                running.store(false, Ordering::SeqCst);
                info!("shipper stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_double_start_rejected() {
        let supervisor = Supervisor::new(PathBuf::from("sleep"), PathBuf::from("30"));
        supervisor.start().unwrap();
        assert!(matches!(
            supervisor.start(),
            Err(SupervisorError::AlreadyRunning)
        ));
        supervisor.stop();
    }

    #[tokio::test]
    async fn test_failed_spawn_clears_running_flag() {
        let supervisor = Supervisor::new(
            PathBuf::from("/nonexistent/shipper"),
            PathBuf::from("conf.yml"),
        );
        assert!(matches!(
            supervisor.start(),
            Err(SupervisorError::Spawn(_))
        ));
        // flag cleared, a retry is allowed to attempt a spawn again
        assert!(matches!(
            supervisor.start(),
            Err(SupervisorError::Spawn(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_during_restart_delay_is_honored() {
        // `true` exits immediately, so the supervise loop spends nearly
        // all its time inside the restart delay
        let supervisor = Supervisor::new(PathBuf::from("true"), PathBuf::from("conf.yml"));
        supervisor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        supervisor.stop();
        tokio::time::sleep(RESTART_DELAY + Duration::from_millis(500)).await;
        assert!(!supervisor.running.load(Ordering::SeqCst));

        // supervision ended, a fresh start is accepted
        supervisor.start().unwrap();
        supervisor.stop();
    }
}
