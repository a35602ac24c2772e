//! Framed JSON-RPC transport to plugin processes.
//!
//! Messages travel over the plugin's standard input and output using
//! `Content-Length` framing. [`RpcChannel`] multiplexes concurrent calls over
//! one process and enforces a deadline on each of them.

mod channel;
mod error;
mod framing;
mod jsonrpc;

pub use self::channel::RpcChannel;
pub use self::error::TransportError;
pub use self::framing::{FrameReader, FrameWriter, MAX_FRAME_BYTES};
pub use self::jsonrpc::{JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse};

#[cfg(test)]
mod tests;
