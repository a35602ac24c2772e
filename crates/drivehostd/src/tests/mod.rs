//! Test suites for the daemon bootstrap and run loop.


use std::ffi::OsString;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use drivehost_config::Config;
use ortho_config::{OrthoConfig, OrthoError};

use crate::bootstrap::ConfigLoader;
use crate::shutdown::{ShutdownError, ShutdownSignal};

/// Loader whose command line cannot be parsed.
pub(crate) struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("drivehostd"),
            OsString::from("--call-timeout-secs"),
            OsString::from("soon"),
        ];
        Config::load_from_iter(args)
    }
}

/// Shutdown signal that fires immediately and counts how often it was awaited.
#[derive(Default)]
pub(crate) struct ImmediateSignal {
    waits: AtomicUsize,
    fail: bool,
}

impl ImmediateSignal {
    pub(crate) fn failing() -> Self {
        Self {
            waits: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub(crate) fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl ShutdownSignal for ImmediateSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ShutdownError::Install {
                source: io::Error::other("signals unavailable"),
            });
        }
        Ok(())
    }
}
