//! Standalone mode — state store, autoscaler loop, and REST API in one
//! process.
//!
//! In this mode, the daemon:
//! 1. Opens the ledger store under the data directory
//! 2. Runs the autoscaler on the configured interval
//! 3. Serves the REST API and `/metrics`
//! 4. Stops both on Ctrl-C

use std::net::SocketAddr;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use slotgrid_autoscale::{Autoscaler, BoxFuture, ProvisionCallback};

use crate::config::SlotgridConfig;

/// Provisioning callback that records requests in the log.
///
/// Instance launch belongs to the cloud/agent layer; the daemon only
/// reports how many agents it wants.
fn logging_provisioner() -> ProvisionCallback {
    Box::new(|agents: u32| {
        Box::pin(async move {
            info!(agents, "agent provisioning requested");
            Ok(())
        }) as BoxFuture
    })
}

/// Wait for the control loop to finish. A panic or cancellation is logged.
async fn join_autoscaler(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, panicked = e.is_panic(), "autoscaler task ended abnormally");
            false
        }
    }
}

/// Run the standalone daemon.
pub async fn run_standalone(config: SlotgridConfig) -> anyhow::Result<()> {
    info!("SlotGrid daemon starting in standalone mode");

    // Ensure data directory exists.
    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("slotgrid.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let state = slotgrid_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let settings = config.autoscale.settings();
    let interval = config.autoscale.interval()?;
    let mut autoscaler =
        Autoscaler::new(state.clone(), settings).with_provision_fn(logging_provisioner());
    info!(
        interval_secs = interval.as_secs(),
        slots_per_agent = settings.slots_per_agent,
        scale_bound = settings.scale_bound,
        "autoscaler initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let autoscale_handle = tokio::spawn(async move {
        autoscaler.run(interval, shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = slotgrid_api::build_router(state, settings);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    join_autoscaler(autoscale_handle).await;

    info!("SlotGrid daemon stopped");
    Ok(())
}
