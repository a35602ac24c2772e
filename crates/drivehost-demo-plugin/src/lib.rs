//! Reference plugin serving the in-memory `DemoFS` driver.
//!
//! The executable refuses to run unless the host's magic cookie is present in
//! its environment. It then writes its handshake announcement as the first
//! frame on standard output and answers JSON-RPC requests until the host
//! closes standard input.

mod backend;
mod dispatch;

#[cfg(test)]
mod tests;

use std::io::{Read, Write};

use drivehost_config::{DEFAULT_MAGIC_COOKIE_KEY, DEFAULT_MAGIC_COOKIE_VALUE};
use drivehost_plugins::protocol::{HandshakeAnnouncement, PROTOCOL_VERSION};
use drivehost_plugins::transport::{
    FrameReader, FrameWriter, JsonRpcError, JsonRpcRequest, JsonRpcResponse, TransportError,
};
use thiserror::Error;

pub use self::backend::DemoTree;
pub use self::dispatch::{DRIVER_FAILURE, DRIVER_NAME, Dispatcher, PLUGIN_NAME};

/// Overrides the protocol version the plugin announces.
pub const PROTOCOL_VERSION_OVERRIDE_ENV: &str = "DRIVEHOST_DEMO_PROTOCOL_VERSION";

/// Errors that stop the plugin.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The executable was not started by a drivehost host.
    #[error(
        "this executable is a drivehost plugin and must be started by the host \
         ({key} is missing or wrong)",
        key = DEFAULT_MAGIC_COOKIE_KEY
    )]
    NotLaunchedByHost,

    /// The protocol version override was not a number.
    #[error("invalid {env} value '{value}'", env = PROTOCOL_VERSION_OVERRIDE_ENV)]
    InvalidVersionOverride {
        /// Rejected value.
        value: String,
    },

    /// A frame could not be read from or written to the host.
    #[error("transport failure: {source}")]
    Transport {
        /// Underlying transport error.
        #[from]
        source: TransportError,
    },

    /// A message could not be serialised.
    #[error("failed to serialise message: {source}")]
    Serialize {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
}

/// Builds the handshake announcement from the environment.
///
/// `lookup` returns the value of an environment variable, if set.
///
/// # Errors
///
/// Returns [`ServeError::NotLaunchedByHost`] when the magic cookie is absent
/// or wrong, and [`ServeError::InvalidVersionOverride`] for a malformed
/// version override.
pub fn announcement_from<F>(lookup: F) -> Result<HandshakeAnnouncement, ServeError>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(DEFAULT_MAGIC_COOKIE_KEY).as_deref() != Some(DEFAULT_MAGIC_COOKIE_VALUE) {
        return Err(ServeError::NotLaunchedByHost);
    }
    let protocol_version = match lookup(PROTOCOL_VERSION_OVERRIDE_ENV) {
        Some(value) => {
            let parsed = value.trim().parse::<u32>();
            parsed.map_err(|_| ServeError::InvalidVersionOverride { value })?
        }
        None => PROTOCOL_VERSION,
    };
    Ok(HandshakeAnnouncement {
        protocol_version,
        magic_cookie_key: DEFAULT_MAGIC_COOKIE_KEY.to_owned(),
        magic_cookie_value: DEFAULT_MAGIC_COOKIE_VALUE.to_owned(),
    })
}

/// Announces the handshake on `output` and serves requests from `input` until
/// it reaches end of stream.
///
/// # Errors
///
/// Returns [`ServeError`] when a frame cannot be read or written.
pub fn serve<R: Read, W: Write>(
    input: R,
    output: W,
    announcement: &HandshakeAnnouncement,
    mut dispatcher: Dispatcher,
) -> Result<(), ServeError> {
    let mut writer = FrameWriter::new(output);
    writer.write_frame(&serde_json::to_vec(announcement)?)?;

    let mut reader = FrameReader::new(input);
    while let Some(frame) = reader.read_frame()? {
        let response = match serde_json::from_slice::<JsonRpcRequest>(&frame) {
            Ok(request) => dispatcher.respond(&request),
            Err(error) => JsonRpcResponse::failure(
                None,
                JsonRpcError::new(JsonRpcError::PARSE_ERROR, error.to_string()),
            ),
        };
        writer.write_frame(&serde_json::to_vec(&response)?)?;
    }
    Ok(())
}

/// Runs the plugin against the process environment.
///
/// # Errors
///
/// Returns [`ServeError`] when the handshake cannot be built or the host
/// connection fails.
pub fn run<R: Read, W: Write>(input: R, output: W) -> Result<(), ServeError> {
    let announcement = announcement_from(|key| std::env::var(key).ok())?;
    serve(
        input,
        output,
        &announcement,
        Dispatcher::new(DemoTree::sample()),
    )
}
