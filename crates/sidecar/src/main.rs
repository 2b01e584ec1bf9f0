use sidecar::boot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let (state, supervisor) = boot::boot().await?;

    boot::wait_for_shutdown().await?;
    info!("Shutdown signal received");

    // Let any in-flight artifact write or scan pass finish.
    let _guard = state.process_lock.lock().await;
    supervisor.stop();
    info!("Watchlog sidecar stopped");
    Ok(())
}
