//! Host driver registry.
//!
//! The registry maps driver names to constructors and to the configuration
//! items derived from each driver's descriptor. The plugin manager only
//! needs [`DriverRegistry`]; the host's own code uses the richer lookups on
//! [`HostDriverRegistry`].

mod items;

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use self::items::{additional_items, common_items};
use crate::driver::{ConfigItem, Driver, DriverConfig, DriverConstructor};

/// Log target for registry operations.
const REGISTRY_TARGET: &str = "drivehost_plugins::registry";

/// Errors raised by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A driver with this name is already registered.
    #[error("driver '{name}' is already registered")]
    NameConflict {
        /// Driver name.
        name: String,
    },

    /// No driver with this name is registered.
    #[error("driver '{name}' is not registered")]
    NotFound {
        /// Driver name.
        name: String,
    },
}

/// Registry operations consumed by the plugin manager.
pub trait DriverRegistry: Send + Sync {
    /// Registers `constructor` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NameConflict`] if `name` is taken; the
    /// existing registration is left untouched.
    fn register(&self, name: &str, constructor: DriverConstructor) -> Result<(), RegistryError>;

    /// Removes the registration for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `name` is not registered.
    fn unregister(&self, name: &str) -> Result<(), RegistryError>;

    /// Returns `true` if `name` is registered.
    fn is_registered(&self, name: &str) -> bool;
}

/// Configuration schema derived for a registered driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverInfo {
    /// Items shared by every storage.
    pub common: Vec<ConfigItem>,
    /// Items specific to this driver.
    pub additional: Vec<ConfigItem>,
    /// The driver's descriptor.
    pub config: DriverConfig,
}

impl DriverInfo {
    fn derive(driver: &dyn Driver) -> Self {
        let config = driver.config();
        Self {
            common: common_items(&config),
            additional: additional_items(&config, &driver.addition()),
            config,
        }
    }
}

struct Registration {
    constructor: DriverConstructor,
    info: DriverInfo,
}

/// The host's name-to-constructor map.
#[derive(Default)]
pub struct HostDriverRegistry {
    drivers: RwLock<HashMap<String, Registration>>,
}

impl HostDriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Registration>> {
        self.drivers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Registration>> {
        self.drivers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `constructor` under the name its drivers report.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NameConflict`] if that name is taken.
    pub fn register_constructor(
        &self,
        constructor: DriverConstructor,
    ) -> Result<String, RegistryError> {
        let name = constructor().config().name;
        self.register(&name, constructor)?;
        Ok(name)
    }

    /// Constructor registered under `name`.
    #[must_use]
    pub fn constructor(&self, name: &str) -> Option<DriverConstructor> {
        self.read()
            .get(name)
            .map(|registration| Arc::clone(&registration.constructor))
    }

    /// Creates a fresh driver instance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `name` is not registered.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Driver>, RegistryError> {
        let constructor = self.constructor(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_owned(),
        })?;
        Ok(constructor())
    }

    /// Registered driver names, sorted.
    #[must_use]
    pub fn driver_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Schema derived for `name`.
    #[must_use]
    pub fn driver_info(&self, name: &str) -> Option<DriverInfo> {
        self.read()
            .get(name)
            .map(|registration| registration.info.clone())
    }

    /// Schemas of every registered driver, keyed by name.
    #[must_use]
    pub fn info_map(&self) -> BTreeMap<String, DriverInfo> {
        self.read()
            .iter()
            .map(|(name, registration)| (name.clone(), registration.info.clone()))
            .collect()
    }
}

impl DriverRegistry for HostDriverRegistry {
    fn register(&self, name: &str, constructor: DriverConstructor) -> Result<(), RegistryError> {
        if self.is_registered(name) {
            return Err(RegistryError::NameConflict {
                name: name.to_owned(),
            });
        }

        // Instantiated outside the lock: constructors may be arbitrarily slow.
        let sample = constructor();
        let info = DriverInfo::derive(&*sample);

        match self.write().entry(name.to_owned()) {
            Entry::Occupied(_) => Err(RegistryError::NameConflict {
                name: name.to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Registration { constructor, info });
                debug!(target: REGISTRY_TARGET, driver = name, "registered driver");
                Ok(())
            }
        }
    }

    fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        match self.write().remove(name) {
            Some(_) => {
                debug!(target: REGISTRY_TARGET, driver = name, "unregistered driver");
                Ok(())
            }
            None => Err(RegistryError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    fn is_registered(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }
}

impl std::fmt::Debug for HostDriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostDriverRegistry")
            .field("drivers", &self.driver_names())
            .finish()
    }
}
