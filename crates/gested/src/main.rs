use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod state;
mod telemetry;

use config::Config;
use state::SharedState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("gested starting");

    let config = Config::load().context("loading configuration")?;
    tracing::info!(
        device_id = config.device_id(),
        server = %config.telemetry.server_url,
        "gesture legend: fist = off, 1-5 fingers = 20%-100% brightness"
    );

    let state = Arc::new(SharedState::new());
    let stop = Arc::new(AtomicBool::new(false));

    // Fail-fast: camera or model problems must prevent startup.
    let (engine_done_tx, engine_done_rx) = oneshot::channel();
    let engine = engine::spawn_engine(
        &config.camera.device,
        &config.model_path(),
        state.clone(),
        stop.clone(),
        engine_done_tx,
    )
    .context("starting capture engine")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = telemetry::Reporter::new(
        config.telemetry.clone(),
        config.device_id().to_string(),
        state.clone(),
    )
    .context("building telemetry reporter")?;
    let reporter_task = tokio::spawn(reporter.run(shutdown_rx));

    // The status surface is best-effort: a missing session bus must not
    // take the gesture pipeline down with it.
    let _dbus = match dbus_interface::serve(state.clone()).await {
        Ok(connection) => Some(connection),
        Err(e) => {
            tracing::warn!(error = %e, "D-Bus status surface unavailable");
            None
        }
    };

    tracing::info!("gested ready");

    let engine_failed = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
            false
        }
        _ = engine_done_rx => {
            tracing::error!("capture engine stopped");
            true
        }
    };

    // Orderly shutdown: stop the frame loop, let the reporter deregister.
    stop.store(true, Ordering::Relaxed);
    let _ = shutdown_tx.send(true);
    if let Err(e) = reporter_task.await {
        tracing::warn!(error = %e, "reporter task failed");
    }
    let _ = engine.join();

    tracing::info!("gested shutting down");

    if engine_failed {
        anyhow::bail!("capture engine stopped unexpectedly");
    }
    Ok(())
}
