//! Wire protocol spoken between the host and plugin executables.
//!
//! A plugin is started with the magic cookie and the expected protocol
//! version in its environment. Its first frame on standard output must be a
//! [`HandshakeAnnouncement`]; afterwards it serves JSON-RPC requests for the
//! methods in [`method`]. Record arguments travel as envelopes and list or
//! link replies as base64-encoded byte payloads.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use drivehost_config::{Config, DEFAULT_MAGIC_COOKIE_KEY, DEFAULT_MAGIC_COOKIE_VALUE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::Envelope;

/// Protocol version implemented by this crate.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the protocol version the host expects.
pub const PROTOCOL_VERSION_ENV: &str = "DRIVEHOST_PLUGIN_PROTOCOL_VERSION";

/// Remote method names.
pub mod method {
    /// Returns the plugin's identity.
    pub const GET_INFO: &str = "Plugin.GetInfo";
    /// Returns the names of the drivers the plugin serves.
    pub const GET_DRIVERS: &str = "Plugin.GetDrivers";
    /// Returns a driver's declared configuration.
    pub const GET_DRIVER_CONFIG: &str = "Plugin.GetDriverConfig";
    /// Binds a storage to a driver.
    pub const INIT_DRIVER: &str = "Plugin.InitDriver";
    /// Releases a driver's state.
    pub const DROP_DRIVER: &str = "Plugin.DropDriver";
    /// Lists a folder.
    pub const LIST: &str = "Plugin.List";
    /// Resolves a download link.
    pub const LINK: &str = "Plugin.Link";
}

/// First frame a plugin writes after starting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAnnouncement {
    /// Protocol version the plugin speaks.
    pub protocol_version: u32,
    /// Magic cookie name the plugin observed.
    pub magic_cookie_key: String,
    /// Magic cookie value the plugin observed.
    pub magic_cookie_value: String,
}

/// Why a handshake announcement was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeMismatch {
    /// The plugin speaks another protocol version.
    #[error("plugin speaks protocol version {found}, expected {expected}")]
    ProtocolVersion {
        /// Version the host speaks.
        expected: u32,
        /// Version the plugin announced.
        found: u32,
    },

    /// The plugin echoed the wrong magic cookie.
    #[error("magic cookie '{key}' does not match")]
    MagicCookie {
        /// Cookie name the plugin announced.
        key: String,
    },
}

/// Values a plugin must echo back before it is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    protocol_version: u32,
    magic_cookie_key: String,
    magic_cookie_value: String,
}

impl HandshakeConfig {
    /// Creates a handshake for the current protocol version.
    #[must_use]
    pub fn new(magic_cookie_key: impl Into<String>, magic_cookie_value: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            magic_cookie_key: magic_cookie_key.into(),
            magic_cookie_value: magic_cookie_value.into(),
        }
    }

    /// Builds the handshake from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.magic_cookie_key(), config.magic_cookie_value())
    }

    /// Protocol version expected from plugins.
    #[must_use]
    pub const fn protocol_version(&self) -> u32 {
        self.protocol_version
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

    /// The announcement a conforming plugin sends.
    #[must_use]
    pub fn announcement(&self) -> HandshakeAnnouncement {
        HandshakeAnnouncement {
            protocol_version: self.protocol_version,
            magic_cookie_key: self.magic_cookie_key.clone(),
            magic_cookie_value: self.magic_cookie_value.clone(),
        }
    }

    /// Checks an announcement against the expected values.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeMismatch`] when the version or cookie differ.
    pub fn verify(&self, announcement: &HandshakeAnnouncement) -> Result<(), HandshakeMismatch> {
        if announcement.protocol_version != self.protocol_version {
            return Err(HandshakeMismatch::ProtocolVersion {
                expected: self.protocol_version,
                found: announcement.protocol_version,
            });
        }
        if announcement.magic_cookie_key != self.magic_cookie_key
            || announcement.magic_cookie_value != self.magic_cookie_value
        {
            return Err(HandshakeMismatch::MagicCookie {
                key: announcement.magic_cookie_key.clone(),
            });
        }
        Ok(())
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAGIC_COOKIE_KEY, DEFAULT_MAGIC_COOKIE_VALUE)
    }
}

/// Identity metadata reported by `Plugin.GetInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    name: String,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
}

impl PluginInfo {
    /// Creates an identity with empty description and author.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Unique plugin name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Plugin version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Free-form description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Plugin author.
    #[must_use]
    pub const fn author(&self) -> &str {
        self.author.as_str()
    }
}

/// Parameters naming a single driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverNameParams {
    /// Driver addressed by the call.
    pub driver_name: String,
}

/// Parameters of `Plugin.InitDriver`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitDriverParams {
    /// Driver addressed by the call.
    pub driver_name: String,
    /// Encoded storage record.
    pub storage_data: Envelope,
}

/// Parameters of `Plugin.List`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    /// Driver addressed by the call.
    pub driver_name: String,
    /// Encoded folder record.
    pub dir_data: Envelope,
    /// Encoded list arguments.
    pub args_data: Envelope,
}

/// Parameters of `Plugin.Link`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkParams {
    /// Driver addressed by the call.
    pub driver_name: String,
    /// Encoded file record.
    pub file_data: Envelope,
    /// Encoded link arguments.
    pub args_data: Envelope,
}

/// Encodes a byte payload for transport inside a JSON result.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes a byte payload produced by [`encode_bytes`].
///
/// # Errors
///
/// Returns [`base64::DecodeError`] when the text is not valid base64.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}
