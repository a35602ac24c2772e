//! Blocking until the daemon is asked to stop.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level::signal_name;
use thiserror::Error;
use tracing::info;

use crate::DAEMON_TARGET;

/// Signals that end a daemon run.
pub const STOP_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Source of the stop request the run loop waits on.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once the daemon should stop.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the listener cannot be installed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Failures of a shutdown listener.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Waits for the first of [`STOP_SIGNALS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals =
            Signals::new(STOP_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        if let Some(received) = signals.forever().next() {
            info!(
                target: DAEMON_TARGET,
                signal = signal_name(received).unwrap_or("unknown"),
                "stopping"
            );
        }
        Ok(())
    }
}
