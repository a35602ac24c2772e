//! Host driver contract.
//!
//! Built-in drivers and plugin-backed drivers implement the same two traits:
//! [`Meta`] for configuration and lifecycle, [`Reader`] for browsing. The
//! registry stores [`DriverConstructor`] factories and never needs to know
//! which kind of driver it holds.

mod config;
mod context;

use std::io;
use std::sync::Arc;

use thiserror::Error;

pub use self::config::{ConfigItem, DriverConfig, ItemType};
pub use self::context::CallContext;
use crate::codec::{CodecError, Envelope};
use crate::model::{Link, LinkArgs, ListArgs, Object, Storage};
use crate::transport::TransportError;

/// Driver-specific settings offered to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Addition {
    /// Items the host can present and validate field by field.
    Structured(Vec<ConfigItem>),
    /// Settings the host must treat as an opaque map.
    Opaque(Envelope),
}

/// The single error shape for built-in and plugin drivers.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver was used before a storage was bound to it.
    #[error("driver '{driver}' has no storage bound")]
    StorageNotSet {
        /// Driver name.
        driver: String,
    },

    /// The plugin serving the driver could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A record could not cross the process boundary.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The backend rejected the operation.
    #[error("driver '{driver}' failed: {message}")]
    Backend {
        /// Driver name.
        driver: String,
        /// Description of the failure.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<io::Error>>,
    },
}

/// Configuration and lifecycle half of the driver contract.
pub trait Meta: Send + Sync {
    /// Static descriptor of the driver.
    fn config(&self) -> DriverConfig;

    /// Storage currently bound to this instance.
    fn storage(&self) -> Option<&Storage>;

    /// Binds a storage to this instance.
    fn set_storage(&mut self, storage: Storage);

    /// Driver-specific settings.
    fn addition(&self) -> Addition;

    /// Prepares the driver for the bound storage.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when no storage is bound or the backend fails.
    fn init(&mut self, ctx: &CallContext) -> Result<(), DriverError>;

    /// Releases whatever [`Meta::init`] acquired.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the backend fails.
    fn drop_driver(&mut self, ctx: &CallContext) -> Result<(), DriverError>;
}

/// Browsing half of the driver contract.
pub trait Reader: Send + Sync {
    /// Lists the children of `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the backend fails or replies with an
    /// unexpected shape.
    fn list(
        &self,
        ctx: &CallContext,
        dir: &Object,
        args: &ListArgs,
    ) -> Result<Vec<Object>, DriverError>;

    /// Resolves a download link for `file`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the backend fails or replies with an
    /// unexpected shape.
    fn link(&self, ctx: &CallContext, file: &Object, args: &LinkArgs)
    -> Result<Link, DriverError>;
}

/// A complete driver.
pub trait Driver: Meta + Reader {}

impl<T: Meta + Reader + ?Sized> Driver for T {}

/// Factory producing fresh driver instances.
pub type DriverConstructor = Arc<dyn Fn() -> Box<dyn Driver> + Send + Sync>;
