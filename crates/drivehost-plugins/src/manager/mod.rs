//! Plugin lifecycle manager.
//!
//! [`PluginManager`] owns every loaded plugin: it launches executables
//! through a [`PluginLauncher`], asks each plugin for its identity and
//! drivers, registers one [`PluginDriver`] constructor per driver with the
//! host registry, and tears everything down again on unload or shutdown.
//!
//! The table of loaded plugins sits behind a single `RwLock`. Spawning and
//! the handshake happen before the write lock is taken; the identity check,
//! driver enumeration and registration happen under it, so readers never
//! observe a half-registered plugin.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use drivehost_config::Config;
use tracing::{debug, error, info, warn};

use crate::adapter::{PluginDriver, RemoteDriverBinding};
use crate::client::PluginClient;
use crate::codec::Envelope;
use crate::discovery;
use crate::error::PluginError;
use crate::launcher::{LaunchedPlugin, PluginLauncher, PluginProcess, ProcessLauncher};
use crate::protocol::PluginInfo;
use crate::registry::DriverRegistry;

/// Log target for lifecycle operations.
const MANAGER_TARGET: &str = "drivehost_plugins::manager";

/// Result of a successful [`PluginManager::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The plugin was started and its drivers registered.
    Loaded {
        /// Plugin name.
        name: String,
        /// Drivers actually registered, in the plugin's order.
        drivers: Vec<String>,
    },
    /// A plugin with the same identity was already running; the new process
    /// was stopped.
    AlreadyLoaded {
        /// Plugin name.
        name: String,
    },
}

impl LoadOutcome {
    /// Name of the plugin the outcome concerns.
    #[must_use]
    pub const fn name(&self) -> &str {
        match self {
            Self::Loaded { name, .. } | Self::AlreadyLoaded { name } => name.as_str(),
        }
    }
}

/// Snapshot of a loaded plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSummary {
    info: PluginInfo,
    path: PathBuf,
    drivers: Vec<String>,
    pid: Option<u32>,
    config: Envelope,
}

impl PluginSummary {
    /// Identity reported by the plugin.
    #[must_use]
    pub const fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Executable the plugin was started from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drivers the plugin contributed.
    #[must_use]
    pub fn drivers(&self) -> &[String] {
        &self.drivers
    }

    /// Process identifier, when known.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Plugin-level configuration.
    #[must_use]
    pub const fn config(&self) -> &Envelope {
        &self.config
    }
}

struct PluginEntry {
    info: PluginInfo,
    path: PathBuf,
    client: Arc<dyn PluginClient>,
    process: Box<dyn PluginProcess>,
    drivers: Vec<String>,
    config: Envelope,
}

impl PluginEntry {
    fn summary(&self) -> PluginSummary {
        PluginSummary {
            info: self.info.clone(),
            path: self.path.clone(),
            drivers: self.drivers.clone(),
            pid: self.process.id(),
            config: self.config.clone(),
        }
    }
}

/// Discovers, starts, supervises and stops plugin processes.
pub struct PluginManager<L: PluginLauncher = ProcessLauncher> {
    launcher: L,
    registry: Arc<dyn DriverRegistry>,
    plugin_dirs: Vec<PathBuf>,
    plugins: RwLock<HashMap<String, PluginEntry>>,
}

impl PluginManager<ProcessLauncher> {
    /// Creates a manager launching real processes with the configured
    /// handshake, deadlines and plugin directories.
    #[must_use]
    pub fn from_config(config: &Config, registry: Arc<dyn DriverRegistry>) -> Self {
        Self::new(
            ProcessLauncher::from_config(config),
            registry,
            config.plugin_dirs().to_vec(),
        )
    }
}

impl<L: PluginLauncher> PluginManager<L> {
    /// Creates a manager with no plugins loaded.
    #[must_use]
    pub fn new(launcher: L, registry: Arc<dyn DriverRegistry>, plugin_dirs: Vec<PathBuf>) -> Self {
        Self {
            launcher,
            registry,
            plugin_dirs,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, PluginEntry>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, PluginEntry>> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the plugin at `path` and registers its drivers.
    ///
    /// Drivers whose names are already registered are skipped with a
    /// warning; the outcome lists only the drivers actually registered.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Handshake`] when the process cannot be started
    /// or handshaked, [`PluginError::InvalidIdentity`] for an empty plugin
    /// name and [`PluginError::Transport`] when the identity or driver
    /// enumeration call fails. No entry is recorded and the process is
    /// stopped in every error case.
    pub fn load(&self, path: &Path) -> Result<LoadOutcome, PluginError> {
        let LaunchedPlugin {
            client,
            mut process,
        } = self.launcher.launch(path)?;
        let label = path.display().to_string();

        let info = match client.get_info() {
            Ok(info) => info,
            Err(source) => {
                stop(process.as_mut(), &label);
                return Err(PluginError::Transport {
                    plugin: label,
                    source,
                });
            }
        };
        if info.name().trim().is_empty() {
            stop(process.as_mut(), &label);
            return Err(PluginError::InvalidIdentity {
                path: path.to_path_buf(),
            });
        }
        let name = info.name().to_owned();

        let mut plugins = self.write();
        if plugins.contains_key(&name) {
            drop(plugins);
            info!(
                target: MANAGER_TARGET,
                plugin = %name,
                path = %path.display(),
                "plugin already loaded; stopping duplicate process"
            );
            stop(process.as_mut(), &name);
            return Ok(LoadOutcome::AlreadyLoaded { name });
        }

        let offered = match client.get_drivers() {
            Ok(offered) => offered,
            Err(source) => {
                drop(plugins);
                stop(process.as_mut(), &name);
                return Err(PluginError::Transport {
                    plugin: name,
                    source,
                });
            }
        };
        let drivers = self.register_drivers(&name, &client, &offered);

        info!(
            target: MANAGER_TARGET,
            plugin = %name,
            version = info.version(),
            path = %path.display(),
            pid = process.id(),
            drivers = ?drivers,
            "plugin loaded"
        );
        plugins.insert(
            name.clone(),
            PluginEntry {
                info,
                path: path.to_path_buf(),
                client,
                process,
                drivers: drivers.clone(),
                config: Envelope::new(),
            },
        );
        Ok(LoadOutcome::Loaded { name, drivers })
    }

    fn register_drivers(
        &self,
        plugin: &str,
        client: &Arc<dyn PluginClient>,
        offered: &[String],
    ) -> Vec<String> {
        let mut registered: Vec<String> = Vec::with_capacity(offered.len());
        for driver in offered {
            if driver.trim().is_empty() || registered.contains(driver) {
                warn!(
                    target: MANAGER_TARGET,
                    plugin,
                    driver = %driver,
                    "plugin offered an empty or repeated driver name; skipping"
                );
                continue;
            }
            if self.registry.is_registered(driver) {
                warn!(
                    target: MANAGER_TARGET,
                    plugin,
                    driver = %driver,
                    "driver name already registered; skipping"
                );
                continue;
            }
            let binding = Arc::new(RemoteDriverBinding::resolve(
                Arc::clone(client),
                driver.as_str(),
            ));
            match self
                .registry
                .register(driver, PluginDriver::constructor(binding))
            {
                Ok(()) => {
                    debug!(
                        target: MANAGER_TARGET,
                        plugin,
                        driver = %driver,
                        "registered plugin driver"
                    );
                    registered.push(driver.clone());
                }
                Err(error) => warn!(
                    target: MANAGER_TARGET,
                    plugin,
                    driver = %driver,
                    %error,
                    "failed to register plugin driver; skipping"
                ),
            }
        }
        registered
    }

    fn unregister_drivers(&self, plugin: &str, drivers: &[String]) {
        for driver in drivers {
            if let Err(error) = self.registry.unregister(driver) {
                warn!(
                    target: MANAGER_TARGET,
                    plugin,
                    driver = %driver,
                    %error,
                    "failed to unregister plugin driver"
                );
            }
        }
    }

    /// Unregisters the plugin's drivers and stops its process.
    ///
    /// Driver instances created earlier keep working only until the process
    /// is gone; afterwards their calls fail with a closed-channel error.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if no plugin called `name` is
    /// loaded.
    pub fn unload(&self, name: &str) -> Result<(), PluginError> {
        let mut entry = {
            let mut plugins = self.write();
            let removed = plugins.remove(name).ok_or_else(|| PluginError::NotFound {
                name: name.to_owned(),
            })?;
            self.unregister_drivers(name, &removed.drivers);
            removed
        };
        stop(entry.process.as_mut(), name);
        info!(target: MANAGER_TARGET, plugin = name, "plugin unloaded");
        Ok(())
    }

    /// Unloads the plugin and loads it again from the same executable.
    ///
    /// If the new load fails the plugin stays unloaded.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if the plugin is not loaded, or the
    /// error raised by [`PluginManager::load`].
    pub fn reload(&self, name: &str) -> Result<LoadOutcome, PluginError> {
        let path = self
            .read()
            .get(name)
            .map(|entry| entry.path.clone())
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_owned(),
            })?;
        self.unload(name)?;
        info!(
            target: MANAGER_TARGET,
            plugin = name,
            path = %path.display(),
            "reloading plugin"
        );
        self.load(&path)
    }

    /// Loads every plugin candidate in `dir`.
    ///
    /// Executables already loaded from the same path are not started again.
    /// A failing candidate is logged and the scan continues. Returns the
    /// names of the plugins newly loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Discovery`] when `dir` exists but cannot be
    /// read. A missing directory loads nothing and is not an error.
    pub fn load_from_directory(&self, dir: &Path) -> Result<Vec<String>, PluginError> {
        let mut loaded = Vec::new();
        for candidate in discovery::plugin_candidates(dir)? {
            if self.is_path_loaded(&candidate) {
                debug!(
                    target: MANAGER_TARGET,
                    path = %candidate.display(),
                    "executable already loaded; skipping"
                );
                continue;
            }
            match self.load(&candidate) {
                Ok(LoadOutcome::Loaded { name, .. }) => loaded.push(name),
                Ok(LoadOutcome::AlreadyLoaded { .. }) => {}
                Err(error) => error!(
                    target: MANAGER_TARGET,
                    path = %candidate.display(),
                    %error,
                    "failed to load plugin"
                ),
            }
        }
        Ok(loaded)
    }

    /// Scans every configured plugin directory in order.
    ///
    /// Unreadable directories are logged and skipped. Returns the names of
    /// the plugins newly loaded.
    #[must_use]
    pub fn rescan(&self) -> Vec<String> {
        let mut loaded = Vec::new();
        for dir in &self.plugin_dirs {
            match self.load_from_directory(dir) {
                Ok(names) => loaded.extend(names),
                Err(error) => error!(
                    target: MANAGER_TARGET,
                    path = %dir.display(),
                    %error,
                    "failed to scan plugin directory"
                ),
            }
        }
        info!(
            target: MANAGER_TARGET,
            loaded = loaded.len(),
            total = self.read().len(),
            "plugin scan complete"
        );
        loaded
    }

    /// Stops every plugin and unregisters their drivers.
    ///
    /// Failures are logged; the table is always left empty.
    pub fn shutdown(&self) {
        let drained: Vec<(String, PluginEntry)> = {
            let mut plugins = self.write();
            let entries: Vec<(String, PluginEntry)> = plugins.drain().collect();
            for (name, entry) in &entries {
                self.unregister_drivers(name, &entry.drivers);
            }
            entries
        };
        let count = drained.len();
        for (name, mut entry) in drained {
            stop(entry.process.as_mut(), &name);
        }
        info!(target: MANAGER_TARGET, count, "plugins shut down");
    }

    /// Summaries of every loaded plugin, sorted by name.
    #[must_use]
    pub fn list_loaded(&self) -> Vec<PluginSummary> {
        let mut summaries: Vec<PluginSummary> =
            self.read().values().map(PluginEntry::summary).collect();
        summaries.sort_by(|left, right| left.info.name().cmp(right.info.name()));
        summaries
    }

    /// Summary of the plugin called `name`.
    #[must_use]
    pub fn summary(&self, name: &str) -> Option<PluginSummary> {
        self.read().get(name).map(PluginEntry::summary)
    }

    /// Drivers contributed by the plugin called `name`.
    #[must_use]
    pub fn drivers_of(&self, name: &str) -> Option<Vec<String>> {
        self.read().get(name).map(|entry| entry.drivers.clone())
    }

    /// Returns `true` if a plugin called `name` is loaded.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Remote-call stub of the plugin called `name`.
    #[must_use]
    pub fn client(&self, name: &str) -> Option<Arc<dyn PluginClient>> {
        self.read().get(name).map(|entry| Arc::clone(&entry.client))
    }

    /// Replaces the plugin-level configuration of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if the plugin is not loaded.
    pub fn set_config(&self, name: &str, config: Envelope) -> Result<(), PluginError> {
        let mut plugins = self.write();
        let entry = plugins.get_mut(name).ok_or_else(|| PluginError::NotFound {
            name: name.to_owned(),
        })?;
        entry.config = config;
        Ok(())
    }

    fn is_path_loaded(&self, path: &Path) -> bool {
        self.read().values().any(|entry| entry.path == path)
    }

    /// Directories scanned by [`PluginManager::rescan`].
    #[must_use]
    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Registry receiving plugin drivers.
    #[must_use]
    pub const fn registry(&self) -> &Arc<dyn DriverRegistry> {
        &self.registry
    }

    /// Launcher used to start plugins.
    #[must_use]
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }
}

impl<L: PluginLauncher> fmt::Debug for PluginManager<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded: Vec<String> = self.read().keys().cloned().collect();
        f.debug_struct("PluginManager")
            .field("plugin_dirs", &self.plugin_dirs)
            .field("loaded", &loaded)
            .finish_non_exhaustive()
    }
}

fn stop(process: &mut dyn PluginProcess, plugin: &str) {
    if let Err(error) = process.terminate() {
        warn!(
            target: MANAGER_TARGET,
            plugin,
            pid = process.id(),
            %error,
            "failed to stop plugin process"
        );
    }
}
