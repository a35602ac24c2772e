//! Domain errors raised by the plugin lifecycle manager.
//!
//! Lower layers keep their own error enums ([`TransportError`],
//! [`CodecError`](crate::codec::CodecError),
//! [`RegistryError`](crate::registry::RegistryError)); this module wraps them
//! with the plugin or path they concern. I/O errors are wrapped in `Arc` to
//! satisfy the `result_large_err` Clippy lint and keep the enum cloneable.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors arising from plugin lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The plugin process could not be started or did not complete the
    /// handshake.
    #[error("plugin at {path} failed the handshake: {message}")]
    Handshake {
        /// Executable that was launched.
        path: PathBuf,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// A remote call made by the manager failed.
    #[error("plugin '{plugin}' call failed")]
    Transport {
        /// Plugin name, or executable path before the identity is known.
        plugin: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The plugin reported an unusable identity.
    #[error("plugin at {path} reported an empty name")]
    InvalidIdentity {
        /// Executable that was launched.
        path: PathBuf,
    },

    /// The requested plugin is not loaded.
    #[error("plugin '{name}' is not loaded")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A plugin directory could not be read.
    #[error("failed to scan plugin directory {path}: {source}")]
    Discovery {
        /// Directory being scanned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The plugin process could not be stopped cleanly.
    #[error("failed to terminate plugin '{plugin}': {source}")]
    Termination {
        /// Plugin name or executable path.
        plugin: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl PluginError {
    /// Builds a handshake failure without an I/O source.
    pub(crate) fn handshake(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Handshake {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds a handshake failure caused by an I/O error.
    pub(crate) fn handshake_io(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::Handshake {
            path: path.into(),
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Returns `true` when the failure came from the RPC channel.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
