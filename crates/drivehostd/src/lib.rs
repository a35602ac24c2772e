//! The drivehost daemon.
//!
//! `drivehostd` hosts storage drivers for a file-listing service. Built-in
//! drivers are compiled in; further drivers come from plugin executables
//! discovered in the configured plugin directories and spoken to over
//! JSON-RPC. Start-up resolves configuration, installs telemetry, registers
//! the built-in [`local`] driver, loads every plugin and only then mounts the
//! configured storages. Shutdown runs in the opposite order: the storages are
//! closed while their plugins still answer, then plugin processes stop.

mod bootstrap;
mod host;
pub mod local;
mod shutdown;
pub mod storage;
mod telemetry;

use thiserror::Error;
use tracing::info;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use host::{Host, StartReport};
pub use shutdown::{STOP_SIGNALS, ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use storage::{StorageError, StorageSet, load_storages};
pub use telemetry::{TelemetryError, TelemetryHandle};

/// Tracing target for daemon-level events.
pub(crate) const DAEMON_TARGET: &str = "drivehostd";

/// Errors that end a daemon run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The storage list could not be read.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The shutdown listener could not be installed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Runs the daemon until `signal` fires.
///
/// # Errors
///
/// Returns [`RunError`] when bootstrap fails, the configured storage file
/// cannot be loaded, or the shutdown listener cannot be installed. Plugins
/// and storages started before a listener failure are still stopped.
pub fn run(loader: &dyn ConfigLoader, signal: &dyn ShutdownSignal) -> Result<(), RunError> {
    let daemon = bootstrap_with(loader)?;
    let host = daemon.into_host();
    let storages = match host.config().storage_file() {
        Some(path) => load_storages(path)?,
        None => Vec::new(),
    };

    let report = host.start(&storages);
    info!(
        target: DAEMON_TARGET,
        plugins = ?report.plugins,
        mounted = ?report.mounted,
        "daemon running"
    );
    let waited = signal.wait();
    host.stop();
    waited.map_err(RunError::from)
}

#[cfg(test)]
mod tests;
