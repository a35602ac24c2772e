//! Ownership and termination of plugin child processes.

use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::{LAUNCHER_TARGET, PluginProcess};
use crate::error::PluginError;
use crate::transport::RpcChannel;

/// Time a plugin gets to exit on its own after its input is closed.
const GRACE_PERIOD: Duration = Duration::from_millis(200);

/// A plugin child process together with its RPC channel.
///
/// Terminating closes the channel first, so adapters still holding the
/// plugin's client fail with a transport error instead of blocking.
#[derive(Debug)]
pub struct ChildProcess {
    path: PathBuf,
    pid: u32,
    child: Option<Child>,
    channel: Arc<RpcChannel>,
}

impl ChildProcess {
    /// Takes ownership of a handshaked child.
    #[must_use]
    pub fn new(path: &Path, child: Child, channel: Arc<RpcChannel>) -> Self {
        Self {
            path: path.to_path_buf(),
            pid: child.id(),
            child: Some(child),
            channel,
        }
    }

    /// Executable the process was started from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PluginProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> Result<(), PluginError> {
        self.channel.close();
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        terminate_child(&mut child, &self.path)
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.channel.close();
        if let Some(mut child) = self.child.take() {
            reap(&mut child, &self.path);
        }
    }
}

/// Waits briefly for the child to exit, then kills it.
fn terminate_child(child: &mut Child, path: &Path) -> Result<(), PluginError> {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(
                target: LAUNCHER_TARGET,
                path = %path.display(),
                ?status,
                "plugin exited"
            );
            return Ok(());
        }
        Ok(None) => {}
        Err(error) => {
            warn!(
                target: LAUNCHER_TARGET,
                path = %path.display(),
                %error,
                "failed to check plugin status, waiting before killing"
            );
        }
    }

    thread::sleep(GRACE_PERIOD);
    if let Ok(Some(status)) = child.try_wait() {
        debug!(
            target: LAUNCHER_TARGET,
            path = %path.display(),
            ?status,
            "plugin exited during grace period"
        );
        return Ok(());
    }

    if let Err(error) = child.kill() {
        debug!(
            target: LAUNCHER_TARGET,
            path = %path.display(),
            %error,
            "kill failed; process may already be gone"
        );
    }
    child
        .wait()
        .map(|status| {
            debug!(
                target: LAUNCHER_TARGET,
                path = %path.display(),
                ?status,
                "plugin killed"
            );
        })
        .map_err(|error| PluginError::Termination {
            plugin: path.display().to_string(),
            source: Arc::new(error),
        })
}

/// Kills and reaps a child without a grace period.
pub(super) fn reap(child: &mut Child, path: &Path) {
    if let Err(error) = child.kill() {
        debug!(
            target: LAUNCHER_TARGET,
            path = %path.display(),
            %error,
            "kill failed; process may already be gone"
        );
    }
    if let Err(error) = child.wait() {
        warn!(
            target: LAUNCHER_TARGET,
            path = %path.display(),
            %error,
            "failed to reap plugin process"
        );
    }
}
