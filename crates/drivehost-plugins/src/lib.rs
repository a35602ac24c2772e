//! Out-of-process storage driver plugins for drivehost.
//!
//! A plugin is a separately built executable that contributes one or more
//! storage drivers. The host starts it as a child process, checks its
//! handshake, and talks to it over JSON-RPC messages framed with
//! `Content-Length` headers on the child's standard input and output.
//!
//! Two pieces carry the weight:
//!
//! - [`PluginManager`] discovers plugin executables, launches them, records
//!   their identity and registers a driver constructor for every driver they
//!   offer. Unload, reload and shutdown undo that work.
//! - [`PluginDriver`] implements the host driver contract ([`Meta`] and
//!   [`Reader`]) by encoding arguments into [`Envelope`]s and forwarding each
//!   operation through the plugin's [`PluginClient`].
//!
//! The registry, the host records in [`model`] and the launcher are seams:
//! tests substitute in-process doubles for each of them.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use drivehost_config::Config;
//! use drivehost_plugins::{DriverRegistry, HostDriverRegistry, PluginManager};
//!
//! let config = Config::default();
//! let registry = Arc::new(HostDriverRegistry::new());
//! let shared: Arc<dyn DriverRegistry> = Arc::<HostDriverRegistry>::clone(&registry);
//! let manager = PluginManager::from_config(&config, shared);
//! let loaded = manager.rescan();
//! println!("loaded {loaded:?}; drivers: {:?}", registry.driver_names());
//! manager.shutdown();
//! ```

pub mod adapter;
pub mod client;
pub mod codec;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod tests;

pub use self::adapter::{PluginDriver, RemoteDriverBinding};
pub use self::client::{PluginClient, RpcPluginClient};
pub use self::codec::{CodecError, Envelope};
pub use self::driver::{
    Addition, CallContext, ConfigItem, Driver, DriverConfig, DriverConstructor, DriverError,
    ItemType, Meta, Reader,
};
pub use self::error::PluginError;
pub use self::launcher::{LaunchedPlugin, PluginLauncher, PluginProcess, ProcessLauncher};
pub use self::manager::{LoadOutcome, PluginManager, PluginSummary};
pub use self::model::{Link, LinkArgs, ListArgs, Object, Storage};
pub use self::protocol::{HandshakeConfig, PluginInfo};
pub use self::registry::{DriverInfo, DriverRegistry, HostDriverRegistry, RegistryError};
pub use self::transport::TransportError;
