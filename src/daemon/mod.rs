//! Daemon module for the Claude session monitor.
//!
//! This module provides process lifecycle management, daemonization, and the
//! main entry point for running the monitor.

pub mod activity;
pub mod collector;
pub mod exec;
pub mod hook_log;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod pool;
pub mod store;

// Re-export commonly used types for convenience
pub use monitor::Monitor;
pub use store::SnapshotStore;

use std::error::Error;
use std::path::Path;

use fork::{daemon, Fork};
use tokio::runtime::Runtime;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigLoader};

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, Box<dyn Error>>;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// This async function blocks until either Ctrl+C (SIGINT) or SIGTERM
/// is received, enabling graceful shutdown of the daemon.
///
/// If SIGTERM handler registration fails, falls back to SIGINT only
/// with a warning message.
async fn wait_for_shutdown() {
    match unix_signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received SIGINT (Ctrl+C), shutting down");
                },
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                },
            }
        }
        Err(e) => {
            warn!(error = %e, "could not register SIGTERM handler, using SIGINT only");
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "failed waiting for SIGINT");
            } else {
                info!("received SIGINT (Ctrl+C), shutting down");
            }
        }
    }
}

/// Daemonize the current process.
///
/// Forks the process and detaches it from the terminal. The parent exits
/// immediately with code 0; the child continues as a background daemon.
///
/// # Arguments
///
/// * `nochdir` - If false, changes the working directory to `/`.
/// * `noclose` - If false, redirects stdin/stdout/stderr to /dev/null.
///
/// # Note
///
/// This function MUST be called BEFORE starting the Tokio runtime, as
/// forking after Tokio initialization corrupts global state for signal
/// handling.
pub fn daemonize_process(nochdir: bool, noclose: bool) -> DaemonResult<()> {
    match daemon(nochdir, noclose) {
        Ok(Fork::Child) => Ok(()),
        Ok(Fork::Parent(_)) => {
            // Parent exits immediately
            std::process::exit(0);
        }
        Err(e) => Err(Box::new(std::io::Error::other(format!(
            "Failed to daemonize: {}",
            e
        )))),
    }
}

/// Load configuration from an explicit path or the default location.
pub fn load_config(config_path: Option<&Path>) -> DaemonResult<Config> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::load_default()?,
    };
    Ok(config)
}

/// Run the daemon.
///
/// This is the main entry point. Configuration is loaded before any fork
/// so errors still reach the terminal; daemonization (when requested)
/// happens before the Tokio runtime starts; then the monitor loop runs
/// until SIGINT/SIGTERM.
///
/// Only startup resource failures — unloadable explicit config, pool
/// creation, runtime creation — are fatal. Per-tick errors are handled
/// inside the loop and never terminate the process.
pub fn run_daemon(config_path: Option<&Path>, daemonize: bool) -> DaemonResult<()> {
    // Load config BEFORE forking so errors are visible in the terminal.
    let config = load_config(config_path)?;

    // CRITICAL: Daemonize BEFORE starting Tokio runtime.
    if daemonize {
        // Production mode: change to /, redirect stdio to /dev/null
        daemonize_process(false, false)?;
    }

    // Initialize logging after daemonize (stderr may be redirected).
    logging::init(config.daemon.log_level);

    info!(
        daemonize,
        version = crate::DAEMON_VERSION,
        "claude monitor daemon starting"
    );

    // Create Tokio runtime AFTER daemonization.
    let runtime = Runtime::new().map_err(|e| {
        Box::new(std::io::Error::other(format!(
            "Failed to create Tokio runtime: {}",
            e
        ))) as Box<dyn Error>
    })?;

    runtime.block_on(async {
        // Pool creation failure inside Monitor::new is startup-fatal.
        let mut monitor = Monitor::new(config)?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let loop_handle = tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        });

        wait_for_shutdown().await;
        let _ = shutdown_tx.send(());
        if let Err(e) = loop_handle.await {
            error!(error = %e, "monitor loop ended abnormally");
        }
        Ok::<(), Box<dyn Error>>(())
    })?;

    info!("daemon stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_missing_explicit_path_is_fatal() {
        let err = load_config(Some(Path::new("/nonexistent/cmon-config.toml")))
            .expect_err("explicit missing config should fail");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn load_config_explicit_path_parses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pool]\nmax_workers = 7\n").expect("write config");
        let config = load_config(Some(&path)).expect("should load");
        assert_eq!(config.pool.max_workers, 7);
    }
}
