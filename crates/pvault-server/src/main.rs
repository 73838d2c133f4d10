//! `pvault` server entry point.
//!
//! Opens the vault database, binds the loopback listener, and serves until
//! SIGINT/SIGTERM. On shutdown the vault is locked (zeroizing the master
//! key) before the listener closes, and the session and pid files are
//! removed.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use pvault_core::hardening;
use pvault_core::vault::Vault;
use pvault_server::config::ServerConfig;
use pvault_server::routes::build_router;
use pvault_server::state::{write_mode_0600, AppState};

/// PID file written by the foreground server, mode 0600.
const PID_FILE: &str = "pvault.pid";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Harden before any key material can exist.
    hardening::disable_core_dumps();

    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let vault = Arc::new(
        Vault::open(&config.vault_dir)
            .with_context(|| format!("open vault at {}", config.vault_dir.display()))?,
    );

    let pid_path = config.vault_dir.join(PID_FILE);
    if let Err(e) = write_mode_0600(&pid_path, &format!("{}\n", std::process::id())) {
        warn!(error = %e, "failed to write pid file");
    }

    let state = Arc::new(AppState::new(Arc::clone(&vault)));
    let app = build_router(Arc::clone(&state));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, dir = %config.vault_dir.display(), "pvault server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&vault)))
        .await
        .context("server error")?;

    state.remove_session_file();
    if let Err(e) = std::fs::remove_file(&pid_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "failed to remove pid file");
        }
    }

    info!("pvault server stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, locking the vault before the listener
/// closes so the master key is zeroized first.
async fn shutdown_signal(vault: Arc<Vault>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, locking vault");
    vault.lock().await;
}
