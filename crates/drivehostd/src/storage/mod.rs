//! Storages mounted by the daemon.
//!
//! A storage binds a mount path to a fresh driver instance taken from the
//! registry. Mounting sets the storage on the instance and runs its `init`;
//! closing runs `drop_driver` on every instance in reverse mount order.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use drivehost_plugins::{CallContext, Driver, DriverError, HostDriverRegistry, RegistryError, Storage};
use thiserror::Error;
use tracing::{info, warn};

use crate::DAEMON_TARGET;

/// Errors raised while loading or mounting storages.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage list could not be read.
    #[error("failed to read storage list {path}: {source}")]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The storage list is not a JSON array of storages.
    #[error("invalid storage list {path}: {message}")]
    Parse {
        /// File being read.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// Another storage already uses this mount path.
    #[error("mount path '{mount_path}' is already in use")]
    DuplicateMount {
        /// Conflicting mount path.
        mount_path: String,
    },

    /// No driver with the storage's driver name is registered.
    #[error("storage '{mount_path}' uses an unknown driver: {source}")]
    UnknownDriver {
        /// Storage mount path.
        mount_path: String,
        /// Registry lookup failure.
        #[source]
        source: RegistryError,
    },

    /// The driver rejected the storage.
    #[error("storage '{mount_path}' failed to initialise: {source}")]
    Init {
        /// Storage mount path.
        mount_path: String,
        /// Driver failure.
        #[source]
        source: DriverError,
    },
}

/// Reads a JSON array of storages.
///
/// # Errors
///
/// Returns [`StorageError::Read`] or [`StorageError::Parse`].
pub fn load_storages(path: &Path) -> Result<Vec<Storage>, StorageError> {
    let text = fs::read_to_string(path).map_err(|error| StorageError::Read {
        path: path.to_path_buf(),
        source: Arc::new(error),
    })?;
    serde_json::from_str(&text).map_err(|error| StorageError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}

struct MountedStorage {
    order: usize,
    driver: Box<dyn Driver>,
}

#[derive(Default)]
struct Mounts {
    mounted: BTreeMap<String, MountedStorage>,
    // Paths whose driver is still initialising.
    reserved: BTreeSet<String>,
    next_order: usize,
}

impl Mounts {
    fn is_taken(&self, mount_path: &str) -> bool {
        self.mounted.contains_key(mount_path) || self.reserved.contains(mount_path)
    }
}

/// The set of mounted storages, keyed by mount path.
///
/// A mount path is reserved before its driver initialises, so two concurrent
/// mounts of one path run `init` once and the loser sees
/// [`StorageError::DuplicateMount`].
#[derive(Default)]
pub struct StorageSet {
    mounts: Mutex<Mounts>,
}

impl StorageSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Mounts> {
        self.mounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, mount_path: &str) -> Result<(), StorageError> {
        let mut mounts = self.lock();
        if mounts.is_taken(mount_path) {
            return Err(StorageError::DuplicateMount {
                mount_path: mount_path.to_owned(),
            });
        }
        mounts.reserved.insert(mount_path.to_owned());
        Ok(())
    }

    fn release(&self, mount_path: &str) {
        self.lock().reserved.remove(mount_path);
    }

    /// Instantiates the storage's driver and initialises it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the mount path is taken or being
    /// mounted, the driver is unknown or its `init` fails. Nothing is mounted
    /// in that case and the path is free again.
    pub fn mount(
        &self,
        registry: &HostDriverRegistry,
        storage: Storage,
        ctx: &CallContext,
    ) -> Result<(), StorageError> {
        let mount_path = storage.mount_path.clone();
        self.reserve(&mount_path)?;
        let driver_name = storage.driver.clone();
        let driver = match initialise(registry, storage, ctx) {
            Ok(driver) => driver,
            Err(failure) => {
                self.release(&mount_path);
                return Err(failure);
            }
        };

        {
            let mut mounts = self.lock();
            mounts.reserved.remove(&mount_path);
            let order = mounts.next_order;
            mounts.next_order += 1;
            mounts
                .mounted
                .insert(mount_path.clone(), MountedStorage { order, driver });
        }
        info!(
            target: DAEMON_TARGET,
            mount_path = %mount_path,
            driver = %driver_name,
            "storage mounted"
        );
        Ok(())
    }

    /// Mount paths in sorted order.
    #[must_use]
    pub fn mount_paths(&self) -> Vec<String> {
        self.lock().mounted.keys().cloned().collect()
    }

    /// Runs `f` against the driver mounted at `mount_path`.
    #[must_use]
    pub fn with_driver<R>(&self, mount_path: &str, f: impl FnOnce(&dyn Driver) -> R) -> Option<R> {
        self.lock()
            .mounted
            .get(mount_path)
            .map(|mounted| f(mounted.driver.as_ref()))
    }

    /// Drops every storage, most recently mounted first.
    ///
    /// Failures are logged; the set is always left empty.
    pub fn close_all(&self, ctx: &CallContext) {
        let mut drained: Vec<(String, MountedStorage)> = {
            let mut mounts = self.lock();
            std::mem::take(&mut mounts.mounted).into_iter().collect()
        };
        drained.sort_by(|left, right| right.1.order.cmp(&left.1.order));
        for (mount_path, mut storage) in drained {
            match storage.driver.drop_driver(ctx) {
                Ok(()) => info!(
                    target: DAEMON_TARGET,
                    mount_path = %mount_path,
                    "storage closed"
                ),
                Err(error) => warn!(
                    target: DAEMON_TARGET,
                    mount_path = %mount_path,
                    %error,
                    "storage did not close cleanly"
                ),
            }
        }
    }
}

fn initialise(
    registry: &HostDriverRegistry,
    storage: Storage,
    ctx: &CallContext,
) -> Result<Box<dyn Driver>, StorageError> {
    let mount_path = storage.mount_path.clone();
    let mut driver =
        registry
            .instantiate(&storage.driver)
            .map_err(|source| StorageError::UnknownDriver {
                mount_path: mount_path.clone(),
                source,
            })?;
    driver.set_storage(storage);
    driver
        .init(ctx)
        .map_err(|source| StorageError::Init { mount_path, source })?;
    Ok(driver)
}

impl std::fmt::Debug for StorageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSet")
            .field("mounted", &self.mount_paths())
            .finish()
    }
}

#[cfg(test)]
mod tests;
