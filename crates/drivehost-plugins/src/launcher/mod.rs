//! Spawning plugin executables and completing the handshake.
//!
//! [`PluginLauncher`] is the seam the lifecycle manager uses to obtain a
//! running, handshaked plugin. [`ProcessLauncher`] is the production
//! implementation: it starts the executable with piped stdio, passes the
//! magic cookie and protocol version through the environment and waits for
//! the plugin's [`HandshakeAnnouncement`](crate::protocol::HandshakeAnnouncement)
//! before wiring up the RPC channel.

mod process;

use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use drivehost_config::Config;
use tracing::{debug, warn};

pub use self::process::ChildProcess;
use crate::client::{PluginClient, RpcPluginClient};
use crate::error::PluginError;
use crate::protocol::{HandshakeAnnouncement, HandshakeConfig, PROTOCOL_VERSION_ENV};
use crate::transport::{FrameReader, RpcChannel};

/// Log target for launcher operations.
pub(crate) const LAUNCHER_TARGET: &str = "drivehost_plugins::launcher";

/// A running plugin process owned by the lifecycle manager.
pub trait PluginProcess: Send + Sync {
    /// Operating system process identifier, when known.
    fn id(&self) -> Option<u32>;

    /// Stops the process and closes its channel.
    ///
    /// Best-effort and idempotent: calling it on a stopped process is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Termination`] when the process could not be
    /// reaped.
    fn terminate(&mut self) -> Result<(), PluginError>;
}

/// A plugin that completed its handshake.
pub struct LaunchedPlugin {
    /// Stub for the plugin's remote calls.
    pub client: Arc<dyn PluginClient>,
    /// Handle owning the plugin process.
    pub process: Box<dyn PluginProcess>,
}

impl fmt::Debug for LaunchedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedPlugin")
            .field("pid", &self.process.id())
            .finish_non_exhaustive()
    }
}

/// Starts plugin executables.
pub trait PluginLauncher: Send + Sync {
    /// Spawns `path` and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Handshake`] when the executable cannot be
    /// started, exits early, or announces the wrong version or cookie. The
    /// process is killed before the error is returned.
    fn launch(&self, path: &Path) -> Result<LaunchedPlugin, PluginError>;
}

/// Launches plugins as child processes speaking JSON-RPC over stdio.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    handshake: HandshakeConfig,
    handshake_timeout: Duration,
    call_timeout: Duration,
    extra_env: Vec<(OsString, OsString)>,
}

impl ProcessLauncher {
    /// Creates a launcher with explicit handshake values and deadlines.
    #[must_use]
    pub const fn new(
        handshake: HandshakeConfig,
        handshake_timeout: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            handshake,
            handshake_timeout,
            call_timeout,
            extra_env: Vec::new(),
        }
    }

    /// Creates a launcher from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            HandshakeConfig::from_config(config),
            config.handshake_timeout(),
            config.call_timeout(),
        )
    }

    /// Adds an environment variable passed to every plugin.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.extra_env.push((key.into(), value.into()));
        self
    }

    /// Handshake values expected from plugins.
    #[must_use]
    pub const fn handshake(&self) -> &HandshakeConfig {
        &self.handshake
    }

    fn spawn(&self, path: &Path) -> Result<Child, PluginError> {
        debug!(
            target: LAUNCHER_TARGET,
            path = %path.display(),
            "spawning plugin process"
        );
        let mut command = Command::new(path);
        command
            .env(
                self.handshake.magic_cookie_key(),
                self.handshake.magic_cookie_value(),
            )
            .env(
                PROTOCOL_VERSION_ENV,
                self.handshake.protocol_version().to_string(),
            )
            .envs(self.extra_env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
            .spawn()
            .map_err(|error| PluginError::handshake_io(path, "failed to spawn plugin", error))
    }

    fn await_handshake(
        &self,
        path: &Path,
        stdout: ChildStdout,
    ) -> Result<(FrameReader<ChildStdout>, HandshakeAnnouncement), PluginError> {
        let (sender, receiver) = mpsc::channel();
        let mut reader = FrameReader::new(stdout);
        thread::Builder::new()
            .name(String::from("drivehost-handshake"))
            .spawn(move || {
                let frame = reader.read_frame();
                if sender.send((reader, frame)).is_err() {
                    debug!(target: LAUNCHER_TARGET, "handshake abandoned by launcher");
                }
            })
            .map_err(|error| {
                PluginError::handshake_io(path, "failed to start handshake reader", error)
            })?;

        let (returned, frame) = receiver.recv_timeout(self.handshake_timeout).map_err(|_| {
            PluginError::handshake(
                path,
                format!(
                    "no handshake within {}ms",
                    self.handshake_timeout.as_millis()
                ),
            )
        })?;
        let bytes = frame
            .map_err(|error| PluginError::handshake(path, format!("unreadable handshake: {error}")))?
            .ok_or_else(|| {
                PluginError::handshake(path, "plugin exited before completing the handshake")
            })?;
        let announcement = serde_json::from_slice(&bytes).map_err(|error| {
            PluginError::handshake(path, format!("malformed handshake announcement: {error}"))
        })?;
        Ok((returned, announcement))
    }

    fn connect(&self, path: &Path, child: &mut Child) -> Result<Arc<RpcChannel>, PluginError> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PluginError::handshake(path, "failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::handshake(path, "failed to capture stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(path, stderr);
        }

        let (reader, announcement) = self.await_handshake(path, stdout)?;
        self.handshake
            .verify(&announcement)
            .map_err(|mismatch| PluginError::handshake(path, mismatch.to_string()))?;

        let label = path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        let channel = RpcChannel::start(label, reader, stdin, self.call_timeout).map_err(
            |error| PluginError::handshake(path, format!("failed to start channel: {error}")),
        )?;
        Ok(Arc::new(channel))
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PluginLauncher for ProcessLauncher {
    fn launch(&self, path: &Path) -> Result<LaunchedPlugin, PluginError> {
        let mut child = self.spawn(path)?;
        let pid = child.id();
        match self.connect(path, &mut child) {
            Ok(channel) => {
                debug!(
                    target: LAUNCHER_TARGET,
                    path = %path.display(),
                    pid,
                    "plugin handshake complete"
                );
                let client: Arc<dyn PluginClient> =
                    Arc::new(RpcPluginClient::new(Arc::clone(&channel)));
                Ok(LaunchedPlugin {
                    client,
                    process: Box::new(ChildProcess::new(path, child, channel)),
                })
            }
            Err(error) => {
                warn!(
                    target: LAUNCHER_TARGET,
                    path = %path.display(),
                    pid,
                    %error,
                    "plugin handshake failed; killing process"
                );
                process::reap(&mut child, path);
                Err(error)
            }
        }
    }
}

fn forward_stderr(path: &Path, stderr: ChildStderr) {
    let plugin = path.display().to_string();
    let spawned = thread::Builder::new()
        .name(String::from("drivehost-plugin-stderr"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                debug!(target: LAUNCHER_TARGET, plugin = %plugin, line = %line, "plugin stderr");
            }
        });
    if let Err(error) = spawned {
        warn!(
            target: LAUNCHER_TARGET,
            path = %path.display(),
            %error,
            "failed to forward plugin stderr"
        );
    }
}
