//! Crate-level test doubles and BDD tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Barrier, Mutex, PoisonError};

use mockall::mock;

use crate::client::PluginClient;
use crate::codec::{self, Envelope};
use crate::driver::{Addition, CallContext, DriverConfig, DriverError, Meta, Reader};
use crate::error::PluginError;
use crate::launcher::{LaunchedPlugin, PluginLauncher, PluginProcess};
use crate::model::{Link, LinkArgs, ListArgs, Object, Storage};
use crate::protocol::PluginInfo;
use crate::transport::TransportError;


mock! {
    pub Client {}
    impl PluginClient for Client {
        fn get_info(&self) -> Result<PluginInfo, TransportError>;
        fn get_drivers(&self) -> Result<Vec<String>, TransportError>;
        fn get_driver_config(&self, driver: &str) -> Result<Envelope, TransportError>;
        fn init_driver(&self, driver: &str, storage: &Envelope) -> Result<(), TransportError>;
        fn drop_driver(&self, driver: &str) -> Result<(), TransportError>;
        fn list(
            &self,
            driver: &str,
            dir: &Envelope,
            args: &Envelope,
        ) -> Result<Vec<u8>, TransportError>;
        fn link(
            &self,
            driver: &str,
            file: &Envelope,
            args: &Envelope,
        ) -> Result<Vec<u8>, TransportError>;
    }
}

/// In-process driver with a fixed descriptor.
#[derive(Debug, Clone)]
pub(crate) struct StaticDriver {
    config: DriverConfig,
    addition: Addition,
    storage: Option<Storage>,
}

impl StaticDriver {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            config: DriverConfig::named(name),
            addition: Addition::Structured(Vec::new()),
            storage: None,
        }
    }

    pub(crate) fn with_addition(mut self, addition: Addition) -> Self {
        self.addition = addition;
        self
    }
}

impl Meta for StaticDriver {
    fn config(&self) -> DriverConfig {
        self.config.clone()
    }

    fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    fn set_storage(&mut self, storage: Storage) {
        self.storage = Some(storage);
    }

    fn addition(&self) -> Addition {
        self.addition.clone()
    }

    fn init(&mut self, _ctx: &CallContext) -> Result<(), DriverError> {
        match self.storage {
            Some(_) => Ok(()),
            None => Err(DriverError::StorageNotSet {
                driver: self.config.name.clone(),
            }),
        }
    }

    fn drop_driver(&mut self, _ctx: &CallContext) -> Result<(), DriverError> {
        Ok(())
    }
}

impl Reader for StaticDriver {
    fn list(
        &self,
        _ctx: &CallContext,
        _dir: &Object,
        _args: &ListArgs,
    ) -> Result<Vec<Object>, DriverError> {
        Ok(Vec::new())
    }

    fn link(
        &self,
        _ctx: &CallContext,
        file: &Object,
        _args: &LinkArgs,
    ) -> Result<Link, DriverError> {
        Ok(Link {
            url: format!("static://{}", file.path),
            ..Link::default()
        })
    }
}

/// Behaviour of a plugin served by [`StubLauncher`].
#[derive(Debug, Clone)]
pub(crate) struct StubPlugin {
    info: PluginInfo,
    drivers: Vec<String>,
    fail_get_drivers: bool,
    fail_terminate: bool,
}

impl StubPlugin {
    pub(crate) fn new(name: &str, drivers: &[&str]) -> Self {
        Self {
            info: PluginInfo::new(name, "1.0.0"),
            drivers: drivers.iter().map(|driver| (*driver).to_owned()).collect(),
            fail_get_drivers: false,
            fail_terminate: false,
        }
    }

    pub(crate) const fn failing_get_drivers(mut self) -> Self {
        self.fail_get_drivers = true;
        self
    }

    /// The process refuses to stop and stays alive.
    pub(crate) const fn failing_terminate(mut self) -> Self {
        self.fail_terminate = true;
        self
    }
}

/// Client answering from a [`StubPlugin`] until its process is stopped.
struct StubClient {
    plugin: StubPlugin,
    alive: Arc<AtomicBool>,
}

impl StubClient {
    fn ensure_alive(&self) -> Result<(), TransportError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    fn serves(&self, driver: &str) -> Result<(), TransportError> {
        self.ensure_alive()?;
        if self.plugin.drivers.iter().any(|name| name == driver) {
            Ok(())
        } else {
            Err(TransportError::Remote {
                method: String::from("driver lookup"),
                code: -32000,
                message: format!("unknown driver '{driver}'"),
            })
        }
    }
}

fn payload_error(error: &codec::CodecError) -> TransportError {
    TransportError::MalformedReply {
        method: String::from("stub"),
        message: error.to_string(),
    }
}

impl PluginClient for StubClient {
    fn get_info(&self) -> Result<PluginInfo, TransportError> {
        self.ensure_alive()?;
        Ok(self.plugin.info.clone())
    }

    fn get_drivers(&self) -> Result<Vec<String>, TransportError> {
        self.ensure_alive()?;
        if self.plugin.fail_get_drivers {
            return Err(TransportError::Remote {
                method: String::from("Plugin.GetDrivers"),
                code: -32000,
                message: String::from("driver enumeration failed"),
            });
        }
        Ok(self.plugin.drivers.clone())
    }

    fn get_driver_config(&self, driver: &str) -> Result<Envelope, TransportError> {
        self.serves(driver)?;
        let config = DriverConfig {
            local_sort: true,
            ..DriverConfig::named(driver)
        };
        codec::encode(&config).map_err(|error| payload_error(&error))
    }

    fn init_driver(&self, driver: &str, _storage: &Envelope) -> Result<(), TransportError> {
        self.serves(driver)
    }

    fn drop_driver(&self, driver: &str) -> Result<(), TransportError> {
        self.serves(driver)
    }

    fn list(
        &self,
        driver: &str,
        dir: &Envelope,
        _args: &Envelope,
    ) -> Result<Vec<u8>, TransportError> {
        self.serves(driver)?;
        let folder: Object = codec::decode(dir).map_err(|error| payload_error(&error))?;
        let children = vec![Object {
            id: String::from("1"),
            path: format!("{}/readme.txt", folder.path.trim_end_matches('/')),
            name: String::from("readme.txt"),
            size: 12,
            ..Object::default()
        }];
        codec::encode_payload(&children).map_err(|error| payload_error(&error))
    }

    fn link(
        &self,
        driver: &str,
        file: &Envelope,
        _args: &Envelope,
    ) -> Result<Vec<u8>, TransportError> {
        self.serves(driver)?;
        let object: Object = codec::decode(file).map_err(|error| payload_error(&error))?;
        let link = Link {
            url: format!("stub://{driver}{}", object.path),
            ..Link::default()
        };
        codec::encode_payload(&link).map_err(|error| payload_error(&error))
    }
}

type LiveSet = Arc<Mutex<HashSet<u32>>>;

/// Process handle tracking liveness in a shared set.
struct StubProcess {
    pid: u32,
    alive: Arc<AtomicBool>,
    live: LiveSet,
    fail_terminate: bool,
}

impl PluginProcess for StubProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> Result<(), PluginError> {
        if self.fail_terminate {
            return Err(PluginError::Termination {
                plugin: format!("pid {}", self.pid),
                source: Arc::new(std::io::Error::other("process ignored the kill")),
            });
        }
        self.alive.store(false, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.pid);
        Ok(())
    }
}

/// Launcher producing in-process plugins keyed by executable path.
#[derive(Default)]
pub(crate) struct StubLauncher {
    plugins: Mutex<HashMap<PathBuf, StubPlugin>>,
    next_pid: AtomicU32,
    live: LiveSet,
    launch_gate: Option<Arc<Barrier>>,
}

impl StubLauncher {
    pub(crate) fn with_plugin(self, path: &str, plugin: StubPlugin) -> Self {
        self.add_plugin(path, plugin);
        self
    }

    /// Every launch waits until `parties` launches are in flight.
    pub(crate) fn with_launch_barrier(mut self, parties: usize) -> Self {
        self.launch_gate = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub(crate) fn add_plugin(&self, path: &str, plugin: StubPlugin) {
        self.plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(PathBuf::from(path), plugin);
    }

    pub(crate) fn live_processes(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn is_live(&self, pid: u32) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&pid)
    }
}

impl PluginLauncher for StubLauncher {
    fn launch(&self, path: &Path) -> Result<LaunchedPlugin, PluginError> {
        let plugin = self
            .plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| PluginError::handshake(path, "not a plugin executable"))?;
        if let Some(gate) = &self.launch_gate {
            gate.wait();
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) + 100;
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid);
        let alive = Arc::new(AtomicBool::new(true));
        let fail_terminate = plugin.fail_terminate;
        Ok(LaunchedPlugin {
            client: Arc::new(StubClient {
                plugin,
                alive: Arc::clone(&alive),
            }),
            process: Box::new(StubProcess {
                pid,
                alive,
                live: Arc::clone(&self.live),
                fail_terminate,
            }),
        })
    }
}
