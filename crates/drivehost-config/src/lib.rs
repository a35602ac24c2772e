//! Shared configuration for the drivehost binaries and plugin host.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then a
//! configuration file, then `DRIVEHOST_*` environment variables, then command
//! line flags. The resolved [`Config`] carries the logging setup, the plugin
//! directories scanned at start-up, the timing and handshake parameters
//! applied to every plugin process and the storages mounted by the daemon.

mod defaults;
mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_LOG_FILTER,
    DEFAULT_MAGIC_COOKIE_KEY, DEFAULT_MAGIC_COOKIE_VALUE, DEFAULT_PLUGIN_DIRS,
    default_log_filter, default_log_format, default_magic_cookie_key, default_magic_cookie_value,
    default_plugin_dirs,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration shared by the daemon and the plugin host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "DRIVEHOST")]
pub struct Config {
    /// Tracing filter expression (`EnvFilter` syntax).
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Output format of the log subscriber.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Directories scanned for plugin executables, in order.
    #[ortho_config(default = default_plugin_dirs())]
    pub plugin_dirs: Vec<PathBuf>,
    /// Deadline for each remote plugin call, in seconds.
    #[ortho_config(default = DEFAULT_CALL_TIMEOUT_SECS)]
    pub call_timeout_secs: u64,
    /// Deadline for a plugin's handshake announcement, in seconds.
    #[ortho_config(default = DEFAULT_HANDSHAKE_TIMEOUT_SECS)]
    pub handshake_timeout_secs: u64,
    /// Environment variable name handed to plugins as the magic cookie.
    #[ortho_config(default = default_magic_cookie_key())]
    pub magic_cookie_key: String,
    /// Magic cookie value plugins must echo back during the handshake.
    #[ortho_config(default = default_magic_cookie_value())]
    pub magic_cookie_value: String,
    /// JSON file listing the storages mounted at start-up.
    pub storage_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            plugin_dirs: default_plugin_dirs(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            magic_cookie_key: default_magic_cookie_key(),
            magic_cookie_value: default_magic_cookie_value(),
            storage_file: None,
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Plugin directories in scan order.
    #[must_use]
    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Deadline applied to each remote call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Deadline applied to the handshake of a new plugin process.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Magic cookie environment variable name.
    #[must_use]
    pub const fn magic_cookie_key(&self) -> &str {
        self.magic_cookie_key.as_str()
    }

    /// Magic cookie value.
    #[must_use]
    pub const fn magic_cookie_value(&self) -> &str {
        self.magic_cookie_value.as_str()
    }

    /// Storage list read at start-up, if configured.
    #[must_use]
    pub fn storage_file(&self) -> Option<&Path> {
        self.storage_file.as_deref()
    }

    /// Rejects settings the plugin host cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a timeout is zero or the magic cookie is
    /// blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                setting: "call_timeout_secs",
            });
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                setting: "handshake_timeout_secs",
            });
        }
        if self.magic_cookie_key.trim().is_empty() || self.magic_cookie_value.trim().is_empty() {
            return Err(ConfigError::BlankMagicCookie);
        }
        Ok(())
    }
}

/// Errors raised when a loaded configuration is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A timeout setting was zero.
    #[error("'{setting}' must be greater than zero")]
    ZeroTimeout {
        /// Name of the offending setting.
        setting: &'static str,
    },
    /// The magic cookie key or value was blank.
    #[error("the plugin magic cookie key and value must not be blank")]
    BlankMagicCookie,
}
