//! Request dispatch for the demo plugin.

use std::collections::HashMap;

use drivehost_plugins::codec::{self, Envelope};
use drivehost_plugins::driver::DriverConfig;
use drivehost_plugins::model::{Link, Object, Storage};
use drivehost_plugins::protocol::{
    DriverNameParams, InitDriverParams, LinkParams, ListParams, PluginInfo, encode_bytes, method,
};
use drivehost_plugins::transport::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::DemoTree;

/// Name the plugin reports in `Plugin.GetInfo`.
pub const PLUGIN_NAME: &str = "demo";

/// The single driver served by the plugin.
pub const DRIVER_NAME: &str = "DemoFS";

/// JSON-RPC error code for driver-level failures.
pub const DRIVER_FAILURE: i64 = -32_000;

/// Seconds a link produced by the demo driver stays valid.
const LINK_TTL_SECS: u64 = 300;

/// Serves one request at a time against a [`DemoTree`].
#[derive(Debug)]
pub struct Dispatcher {
    tree: DemoTree,
    storages: HashMap<String, Storage>,
}

impl Dispatcher {
    /// Creates a dispatcher with no driver initialised.
    #[must_use]
    pub fn new(tree: DemoTree) -> Self {
        Self {
            tree,
            storages: HashMap::new(),
        }
    }

    /// Answers `request`, turning every failure into an error response.
    pub fn respond(&mut self, request: &JsonRpcRequest) -> JsonRpcResponse {
        match self.handle(request) {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::failure(Some(request.id), error),
        }
    }

    fn handle(&mut self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            method::GET_INFO => to_value(
                &PluginInfo::new(PLUGIN_NAME, env!("CARGO_PKG_VERSION"))
                    .with_description("In-memory demonstration driver")
                    .with_author("drivehost"),
            ),
            method::GET_DRIVERS => to_value(&[DRIVER_NAME]),
            method::GET_DRIVER_CONFIG => {
                let params: DriverNameParams = params(request)?;
                ensure_driver(&params.driver_name)?;
                to_value(&driver_config()?)
            }
            method::INIT_DRIVER => {
                let params: InitDriverParams = params(request)?;
                ensure_driver(&params.driver_name)?;
                let storage: Storage = decode(&params.storage_data)?;
                self.storages.insert(params.driver_name, storage);
                Ok(Value::Null)
            }
            method::DROP_DRIVER => {
                let params: DriverNameParams = params(request)?;
                ensure_driver(&params.driver_name)?;
                self.storages.remove(&params.driver_name);
                Ok(Value::Null)
            }
            method::LIST => {
                let params: ListParams = params(request)?;
                self.storage(&params.driver_name)?;
                let dir: Object = decode(&params.dir_data)?;
                let children = self.tree.children(&dir.path).ok_or_else(|| {
                    JsonRpcError::new(DRIVER_FAILURE, format!("folder '{}' not found", dir.path))
                })?;
                payload(children)
            }
            method::LINK => {
                let params: LinkParams = params(request)?;
                let storage = self.storage(&params.driver_name)?;
                let file: Object = decode(&params.file_data)?;
                let link = self.link(storage, &file)?;
                payload(&link)
            }
            other => Err(JsonRpcError::new(
                JsonRpcError::METHOD_NOT_FOUND,
                format!("unknown method '{other}'"),
            )),
        }
    }

    fn storage(&self, driver: &str) -> Result<&Storage, JsonRpcError> {
        ensure_driver(driver)?;
        self.storages.get(driver).ok_or_else(|| {
            JsonRpcError::new(
                DRIVER_FAILURE,
                format!("driver '{driver}' is not initialised"),
            )
        })
    }

    fn link(&self, storage: &Storage, file: &Object) -> Result<Link, JsonRpcError> {
        match self.tree.find(&file.path) {
            Some(found) if !found.is_folder => Ok(Link {
                url: format!(
                    "demo://{}{}",
                    storage.mount_path.trim_end_matches('/'),
                    found.path
                ),
                expiration_secs: Some(LINK_TTL_SECS),
                ..Link::default()
            }),
            Some(_) => Err(JsonRpcError::new(
                DRIVER_FAILURE,
                format!("'{}' is a folder", file.path),
            )),
            None => Err(JsonRpcError::new(
                DRIVER_FAILURE,
                format!("file '{}' not found", file.path),
            )),
        }
    }
}

fn driver_config() -> Result<Envelope, JsonRpcError> {
    let config = DriverConfig {
        local_sort: true,
        default_root: String::from("/"),
        ..DriverConfig::named(DRIVER_NAME)
    };
    codec::encode(&config).map_err(|error| internal(&error))
}

fn ensure_driver(driver: &str) -> Result<(), JsonRpcError> {
    if driver == DRIVER_NAME {
        Ok(())
    } else {
        Err(JsonRpcError::new(
            DRIVER_FAILURE,
            format!("unknown driver '{driver}'"),
        ))
    }
}

fn params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, JsonRpcError> {
    let raw = request.params.clone().unwrap_or(Value::Null);
    serde_json::from_value(raw)
        .map_err(|error| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, error.to_string()))
}

fn decode<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, JsonRpcError> {
    codec::decode(envelope)
        .map_err(|error| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, error.to_string()))
}

fn payload<T: Serialize + ?Sized>(value: &T) -> Result<Value, JsonRpcError> {
    let bytes = codec::encode_payload(value).map_err(|error| internal(&error))?;
    Ok(Value::String(encode_bytes(&bytes)))
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|error| internal(&error))
}

fn internal(error: &impl std::fmt::Display) -> JsonRpcError {
    JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, error.to_string())
}
