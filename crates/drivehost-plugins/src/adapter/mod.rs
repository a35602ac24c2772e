//! Driver boundary adapter.
//!
//! [`PluginDriver`] implements the host driver contract for one remote
//! driver by forwarding each operation through the plugin's
//! [`PluginClient`]. Arguments are encoded as envelopes; list and link
//! replies are decoded from their byte payloads. Nothing is retried.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::PluginClient;
use crate::codec::{self, Envelope};
use crate::driver::{
    Addition, CallContext, Driver, DriverConfig, DriverConstructor, DriverError, Meta, Reader,
};
use crate::model::{Link, LinkArgs, ListArgs, Object, Storage};
use crate::protocol::method;
use crate::transport::TransportError;

/// Log target for adapter operations.
const ADAPTER_TARGET: &str = "drivehost_plugins::adapter";

/// Root folder assumed when a plugin declares no configuration.
const FALLBACK_ROOT: &str = "/";

/// A plugin client paired with one of its driver names.
///
/// The driver's declared configuration is fetched once when the binding is
/// resolved. After the owning plugin is unloaded every call through the
/// binding fails with [`TransportError::Closed`].
pub struct RemoteDriverBinding {
    client: Arc<dyn PluginClient>,
    driver_name: String,
    config: DriverConfig,
}

impl RemoteDriverBinding {
    /// Binds `driver_name` and fetches its declared configuration.
    ///
    /// When the plugin cannot supply a usable configuration the defaults are
    /// used and a warning is logged.
    #[must_use]
    pub fn resolve(client: Arc<dyn PluginClient>, driver_name: impl Into<String>) -> Self {
        let name = driver_name.into();
        let config = fetch_config(client.as_ref(), &name);
        Self {
            client,
            driver_name: name,
            config,
        }
    }

    /// Binds `driver_name` with an already known configuration.
    #[must_use]
    pub fn with_config(
        client: Arc<dyn PluginClient>,
        driver_name: impl Into<String>,
        config: DriverConfig,
    ) -> Self {
        let name = driver_name.into();
        Self {
            client,
            config: DriverConfig {
                name: name.clone(),
                ..config
            },
            driver_name: name,
        }
    }

    /// Remote driver name.
    #[must_use]
    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    /// Declared configuration, named after the binding.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Client of the owning plugin.
    #[must_use]
    pub fn client(&self) -> &dyn PluginClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for RemoteDriverBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDriverBinding")
            .field("driver_name", &self.driver_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn fetch_config(client: &dyn PluginClient, driver: &str) -> DriverConfig {
    let declared = client
        .get_driver_config(driver)
        .map_err(DriverError::from)
        .and_then(|envelope| codec::decode::<DriverConfig>(&envelope).map_err(DriverError::from));
    match declared {
        Ok(config) => DriverConfig {
            name: driver.to_owned(),
            ..config
        },
        Err(error) => {
            warn!(
                target: ADAPTER_TARGET,
                driver,
                %error,
                "plugin did not supply a driver configuration; using defaults"
            );
            DriverConfig {
                default_root: String::from(FALLBACK_ROOT),
                ..DriverConfig::named(driver)
            }
        }
    }
}

/// Host driver served by a plugin process.
#[derive(Debug)]
pub struct PluginDriver {
    binding: Arc<RemoteDriverBinding>,
    storage: Option<Storage>,
}

impl PluginDriver {
    /// Creates an unbound driver instance.
    #[must_use]
    pub const fn new(binding: Arc<RemoteDriverBinding>) -> Self {
        Self {
            binding,
            storage: None,
        }
    }

    /// Registry constructor producing fresh instances over `binding`.
    #[must_use]
    pub fn constructor(binding: Arc<RemoteDriverBinding>) -> DriverConstructor {
        Arc::new(move || -> Box<dyn Driver> { Box::new(Self::new(Arc::clone(&binding))) })
    }

    /// The binding this instance forwards to.
    #[must_use]
    pub const fn binding(&self) -> &Arc<RemoteDriverBinding> {
        &self.binding
    }

    fn driver_name(&self) -> &str {
        self.binding.driver_name()
    }

    /// Refuses to start `name` once `ctx` has expired.
    ///
    /// The error reports a zero budget: nothing was left when the call was
    /// attempted.
    fn ensure_live(&self, ctx: &CallContext, name: &str) -> Result<(), DriverError> {
        if ctx.is_expired() {
            debug!(
                target: ADAPTER_TARGET,
                driver = self.driver_name(),
                method = name,
                "context expired before the call"
            );
            return Err(DriverError::Transport(TransportError::Timeout {
                method: name.to_owned(),
                timeout_ms: 0,
            }));
        }
        Ok(())
    }
}

impl Meta for PluginDriver {
    fn config(&self) -> DriverConfig {
        self.binding.config().clone()
    }

    fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    fn set_storage(&mut self, storage: Storage) {
        self.storage = Some(storage);
    }

    fn addition(&self) -> Addition {
        Addition::Opaque(Envelope::new())
    }

    fn init(&mut self, ctx: &CallContext) -> Result<(), DriverError> {
        self.ensure_live(ctx, method::INIT_DRIVER)?;
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| DriverError::StorageNotSet {
                driver: self.driver_name().to_owned(),
            })?;
        let envelope = codec::encode(storage)?;
        self.binding
            .client()
            .init_driver(self.driver_name(), &envelope)?;
        Ok(())
    }

    fn drop_driver(&mut self, ctx: &CallContext) -> Result<(), DriverError> {
        self.ensure_live(ctx, method::DROP_DRIVER)?;
        self.binding.client().drop_driver(self.driver_name())?;
        Ok(())
    }
}

impl Reader for PluginDriver {
    fn list(
        &self,
        ctx: &CallContext,
        dir: &Object,
        args: &ListArgs,
    ) -> Result<Vec<Object>, DriverError> {
        self.ensure_live(ctx, method::LIST)?;
        let dir_data = codec::encode(dir)?;
        let args_data = codec::encode(args)?;
        let payload = self
            .binding
            .client()
            .list(self.driver_name(), &dir_data, &args_data)?;
        Ok(codec::decode_payload(&payload)?)
    }

    fn link(
        &self,
        ctx: &CallContext,
        file: &Object,
        args: &LinkArgs,
    ) -> Result<Link, DriverError> {
        self.ensure_live(ctx, method::LINK)?;
        let file_data = codec::encode(file)?;
        let args_data = codec::encode(args)?;
        let payload = self
            .binding
            .client()
            .link(self.driver_name(), &file_data, &args_data)?;
        Ok(codec::decode_payload(&payload)?)
    }
}
