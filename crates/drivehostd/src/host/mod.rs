//! The daemon's composition root.
//!
//! [`Host`] owns the driver registry, the single plugin manager and the
//! mounted storages. Start-up loads plugins before any storage is mounted so
//! plugin drivers are available to them; stop closes the storages while their
//! plugins are still alive and only then shuts the plugins down.

use std::sync::Arc;

use drivehost_config::Config;
use drivehost_plugins::{
    CallContext, DriverRegistry, HostDriverRegistry, PluginLauncher, PluginManager,
    ProcessLauncher, Storage,
};
use tracing::{error, info};

use crate::DAEMON_TARGET;
use crate::storage::StorageSet;

/// What [`Host::start`] brought up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    /// Plugins loaded from the plugin directories.
    pub plugins: Vec<String>,
    /// Storages mounted successfully.
    pub mounted: Vec<String>,
    /// Storages that failed to mount, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Registry, plugins and storages of one daemon process.
pub struct Host<L: PluginLauncher = ProcessLauncher> {
    config: Config,
    registry: Arc<HostDriverRegistry>,
    plugins: PluginManager<L>,
    storages: StorageSet,
}

impl Host<ProcessLauncher> {
    /// Builds a host that launches real plugin processes.
    #[must_use]
    pub fn from_config(config: Config, registry: Arc<HostDriverRegistry>) -> Self {
        let launcher = ProcessLauncher::from_config(&config);
        Self::with_launcher(config, registry, launcher)
    }
}

impl<L: PluginLauncher> Host<L> {
    /// Builds a host around an explicit plugin launcher.
    #[must_use]
    pub fn with_launcher(config: Config, registry: Arc<HostDriverRegistry>, launcher: L) -> Self {
        let shared: Arc<dyn DriverRegistry> = Arc::<HostDriverRegistry>::clone(&registry);
        let plugins = PluginManager::new(launcher, shared, config.plugin_dirs().to_vec());
        Self {
            config,
            registry,
            plugins,
            storages: StorageSet::new(),
        }
    }

    /// Loads plugins from every configured directory, then mounts `storages`.
    ///
    /// Failures are logged and reported; start-up never aborts on them.
    pub fn start(&self, storages: &[Storage]) -> StartReport {
        let plugins = self.plugins.rescan();
        let mut report = StartReport {
            plugins,
            ..StartReport::default()
        };

        let ctx = CallContext::with_timeout(self.config.call_timeout());
        for storage in storages {
            if storage.disabled {
                info!(
                    target: DAEMON_TARGET,
                    mount_path = %storage.mount_path,
                    "storage disabled, not mounting"
                );
                continue;
            }
            let mount_path = storage.mount_path.clone();
            match self.storages.mount(&self.registry, storage.clone(), &ctx) {
                Ok(()) => report.mounted.push(mount_path),
                Err(failure) => {
                    error!(
                        target: DAEMON_TARGET,
                        mount_path = %mount_path,
                        error = %failure,
                        "failed to mount storage"
                    );
                    report.failed.push((mount_path, failure.to_string()));
                }
            }
        }
        info!(
            target: DAEMON_TARGET,
            plugins = report.plugins.len(),
            drivers = ?self.registry.driver_names(),
            mounted = report.mounted.len(),
            failed = report.failed.len(),
            "host started"
        );
        report
    }

    /// Closes the storages, then shuts plugins down.
    pub fn stop(&self) {
        let ctx = CallContext::with_timeout(self.config.call_timeout());
        self.storages.close_all(&ctx);
        self.plugins.shutdown();
        info!(target: DAEMON_TARGET, "host stopped");
    }

    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Driver registry shared with the plugin manager.
    #[must_use]
    pub const fn registry(&self) -> &Arc<HostDriverRegistry> {
        &self.registry
    }

    /// The plugin manager.
    #[must_use]
    pub const fn plugins(&self) -> &PluginManager<L> {
        &self.plugins
    }

    /// Mounted storages.
    #[must_use]
    pub const fn storages(&self) -> &StorageSet {
        &self.storages
    }
}

impl<L: PluginLauncher> std::fmt::Debug for Host<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("registry", &self.registry)
            .field("plugins", &self.plugins)
            .field("storages", &self.storages)
            .finish_non_exhaustive()
    }
}
