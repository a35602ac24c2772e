//! Typed stub for the remote calls a plugin serves.
//!
//! [`PluginClient`] is the seam between the lifecycle manager or the driver
//! adapter and the process boundary; tests substitute doubles for it.
//! [`RpcPluginClient`] is the production implementation over an
//! [`RpcChannel`]. Every call blocks until the plugin replies, the channel
//! fails or the call deadline expires. No call is retried.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::Envelope;
use crate::protocol::{
    DriverNameParams, InitDriverParams, LinkParams, ListParams, PluginInfo, decode_bytes, method,
};
use crate::transport::{RpcChannel, TransportError};

/// Remote calls offered by a plugin process.
pub trait PluginClient: Send + Sync {
    /// Identity of the plugin.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    fn get_info(&self) -> Result<PluginInfo, TransportError>;

    /// Names of the drivers the plugin serves, in the plugin's order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    fn get_drivers(&self) -> Result<Vec<String>, TransportError>;

    /// Configuration declared by `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    fn get_driver_config(&self, driver: &str) -> Result<Envelope, TransportError>;

    /// Materialises remote state for `driver` and the encoded storage.
    ///
    /// Not idempotent: callers invoke it at most once per driver and storage.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    fn init_driver(&self, driver: &str, storage: &Envelope) -> Result<(), TransportError>;

    /// Releases remote state for `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    fn drop_driver(&self, driver: &str) -> Result<(), TransportError>;

    /// Lists a folder; the reply is a serialised sequence of objects.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    fn list(&self, driver: &str, dir: &Envelope, args: &Envelope)
    -> Result<Vec<u8>, TransportError>;

    /// Resolves a link; the reply is a serialised link record.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    fn link(
        &self,
        driver: &str,
        file: &Envelope,
        args: &Envelope,
    ) -> Result<Vec<u8>, TransportError>;
}

/// [`PluginClient`] over a JSON-RPC channel.
#[derive(Debug, Clone)]
pub struct RpcPluginClient {
    channel: Arc<RpcChannel>,
}

impl RpcPluginClient {
    /// Wraps a running channel.
    #[must_use]
    pub const fn new(channel: Arc<RpcChannel>) -> Self {
        Self { channel }
    }

    /// The underlying channel.
    #[must_use]
    pub const fn channel(&self) -> &Arc<RpcChannel> {
        &self.channel
    }

    fn call<P, R>(&self, name: &str, params: Option<&P>) -> Result<R, TransportError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let encoded = params
            .map(serde_json::to_value)
            .transpose()
            .map_err(|error| TransportError::InvalidRequest {
                method: name.to_owned(),
                message: error.to_string(),
            })?;
        let result = self.channel.call(name, encoded)?;
        serde_json::from_value(result).map_err(|error| TransportError::MalformedReply {
            method: name.to_owned(),
            message: error.to_string(),
        })
    }

    fn call_for_bytes<P: Serialize>(&self, name: &str, params: &P) -> Result<Vec<u8>, TransportError> {
        let text: String = self.call(name, Some(params))?;
        decode_bytes(&text).map_err(|error| TransportError::MalformedReply {
            method: name.to_owned(),
            message: error.to_string(),
        })
    }

    fn call_for_unit<P: Serialize>(&self, name: &str, params: &P) -> Result<(), TransportError> {
        let _: Value = self.call(name, Some(params))?;
        Ok(())
    }
}

impl PluginClient for RpcPluginClient {
    fn get_info(&self) -> Result<PluginInfo, TransportError> {
        self.call::<(), _>(method::GET_INFO, None)
    }

    fn get_drivers(&self) -> Result<Vec<String>, TransportError> {
        self.call::<(), _>(method::GET_DRIVERS, None)
    }

    fn get_driver_config(&self, driver: &str) -> Result<Envelope, TransportError> {
        let params = DriverNameParams {
            driver_name: driver.to_owned(),
        };
        self.call(method::GET_DRIVER_CONFIG, Some(&params))
    }

    fn init_driver(&self, driver: &str, storage: &Envelope) -> Result<(), TransportError> {
        let params = InitDriverParams {
            driver_name: driver.to_owned(),
            storage_data: storage.clone(),
        };
        self.call_for_unit(method::INIT_DRIVER, &params)
    }

    fn drop_driver(&self, driver: &str) -> Result<(), TransportError> {
        let params = DriverNameParams {
            driver_name: driver.to_owned(),
        };
        self.call_for_unit(method::DROP_DRIVER, &params)
    }

    fn list(
        &self,
        driver: &str,
        dir: &Envelope,
        args: &Envelope,
    ) -> Result<Vec<u8>, TransportError> {
        let params = ListParams {
            driver_name: driver.to_owned(),
            dir_data: dir.clone(),
            args_data: args.clone(),
        };
        self.call_for_bytes(method::LIST, &params)
    }

    fn link(
        &self,
        driver: &str,
        file: &Envelope,
        args: &Envelope,
    ) -> Result<Vec<u8>, TransportError> {
        let params = LinkParams {
            driver_name: driver.to_owned(),
            file_data: file.clone(),
            args_data: args.clone(),
        };
        self.call_for_bytes(method::LINK, &params)
    }
}
