//! Daemon bootstrap: configuration, telemetry and the built-in drivers.

use std::sync::Arc;

use drivehost_config::{Config, ConfigError};
use drivehost_plugins::{HostDriverRegistry, RegistryError};
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use crate::DAEMON_TARGET;
use crate::host::Host;
use crate::local::register_local;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Loads the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the layered loader's error when a source cannot be read or
    /// merged.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but cannot be used.
    #[error("invalid configuration: {source}")]
    Invalid {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A built-in driver could not be registered.
    #[error("failed to register built-in drivers: {source}")]
    Builtin {
        /// Registry rejection.
        #[source]
        source: RegistryError,
    },
}

/// A bootstrapped daemon ready to start.
#[derive(Debug)]
pub struct Daemon {
    host: Host,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// The host owning plugins and storages.
    #[must_use]
    pub const fn host(&self) -> &Host {
        &self.host
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Consumes the daemon and returns its host.
    #[must_use]
    pub fn into_host(self) -> Host {
        self.host
    }
}

/// Bootstraps the daemon from the configuration `loader` yields.
///
/// Plugins are not launched here; [`Host::start`] does that.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration, telemetry or built-in
/// driver registration fails.
pub fn bootstrap_with(loader: &dyn ConfigLoader) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::Invalid { source })?;
    let handle =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;

    let registry = Arc::new(HostDriverRegistry::new());
    register_local(&registry).map_err(|source| BootstrapError::Builtin { source })?;

    info!(
        target: DAEMON_TARGET,
        plugin_dirs = ?config.plugin_dirs(),
        builtin = ?registry.driver_names(),
        "bootstrap complete"
    );
    Ok(Daemon {
        host: Host::from_config(config, registry),
        telemetry: handle,
    })
}
