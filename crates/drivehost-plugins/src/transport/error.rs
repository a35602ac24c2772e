//! Transport-layer errors.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Failures of the framed RPC channel to a plugin process.
///
/// Every remote call surfaces its channel-level problems through this type,
/// whether the process exited, replied with garbage or never replied.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The channel was closed or the plugin process exited.
    #[error("plugin channel is closed")]
    Closed,

    /// No reply arrived before the call deadline.
    #[error("call '{method}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Remote method that was invoked.
        method: String,
        /// Deadline that expired, in milliseconds.
        timeout_ms: u64,
    },

    /// Missing Content-Length header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// A header line could not be parsed.
    #[error("invalid header line: {line}")]
    InvalidHeader {
        /// Offending header line.
        line: String,
    },

    /// A frame exceeded the size limit.
    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Declared or actual frame length.
        length: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The plugin answered with a JSON-RPC error object.
    #[error("plugin rejected '{method}': {message} (code: {code})")]
    Remote {
        /// Remote method that was invoked.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the plugin.
        message: String,
    },

    /// The reply did not have the expected shape.
    #[error("malformed reply to '{method}': {message}")]
    MalformedReply {
        /// Remote method that was invoked.
        method: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The request could not be serialised.
    #[error("could not serialise request '{method}': {message}")]
    InvalidRequest {
        /// Remote method that was invoked.
        method: String,
        /// Serialiser message.
        message: String,
    },
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

impl TransportError {
    /// Builds a timeout error from a duration.
    #[must_use]
    pub fn timeout(method: &str, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            method: method.to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Returns `true` when the plugin can no longer be reached.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io(error) => matches!(
                error.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}
