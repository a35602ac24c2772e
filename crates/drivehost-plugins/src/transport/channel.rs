//! Multiplexed request/response channel over a plugin's stdio.
//!
//! One writer is shared behind a mutex and one background thread reads
//! replies and hands each to the caller waiting on its id, so several host
//! threads can have calls in flight to the same plugin.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::error::TransportError;
use super::framing::{FrameReader, FrameWriter};
use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Log target for channel operations.
const CHANNEL_TARGET: &str = "drivehost_plugins::transport";

type Reply = Result<JsonRpcResponse, TransportError>;
type PendingCalls = Arc<Mutex<HashMap<i64, Sender<Reply>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A JSON-RPC channel to one plugin process.
pub struct RpcChannel {
    label: String,
    writer: Mutex<FrameWriter<Box<dyn Write + Send>>>,
    pending: PendingCalls,
    closed: Arc<AtomicBool>,
    next_id: AtomicI64,
    call_timeout: Duration,
}

impl RpcChannel {
    /// Starts the channel and its reader thread.
    ///
    /// `reader` may already have consumed frames (such as the handshake); the
    /// reader thread continues from wherever it stands.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when the reader thread cannot be spawned.
    pub fn start<R, W>(
        label: impl Into<String>,
        reader: FrameReader<R>,
        writer: W,
        call_timeout: Duration,
    ) -> Result<Self, TransportError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let channel_label = label.into();
        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let thread_label = channel_label.clone();
        let thread_pending = Arc::clone(&pending);
        let thread_closed = Arc::clone(&closed);
        thread::Builder::new()
            .name(format!("drivehost-rpc-{channel_label}"))
            .spawn(move || read_replies(&thread_label, reader, &thread_pending, &thread_closed))?;

        let boxed: Box<dyn Write + Send> = Box::new(writer);
        Ok(Self {
            label: channel_label,
            writer: Mutex::new(FrameWriter::new(boxed)),
            pending,
            closed,
            next_id: AtomicI64::new(1),
            call_timeout,
        })
    }

    /// Name used in logs for this channel.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Deadline applied to each call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Returns `true` once the channel can no longer carry calls.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Invokes `method` and waits for its result within the call timeout.
    ///
    /// A `null` result is returned as [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the channel is closed,
    /// [`TransportError::Timeout`] when no reply arrives in time,
    /// [`TransportError::Remote`] when the plugin answers with an error and
    /// [`TransportError::Io`] when the request cannot be written.
    pub fn call(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel();
        lock(&self.pending).insert(id, sender);
        // The reader marks the channel closed before draining waiters, so a
        // waiter registered after the drain is caught here.
        if self.is_closed() {
            lock(&self.pending).remove(&id);
            return Err(TransportError::Closed);
        }

        let request = JsonRpcRequest::new(id, method, params);
        let payload = serde_json::to_vec(&request).map_err(|error| {
            lock(&self.pending).remove(&id);
            TransportError::InvalidRequest {
                method: method.to_owned(),
                message: error.to_string(),
            }
        })?;

        debug!(
            target: CHANNEL_TARGET,
            plugin = %self.label,
            method,
            id,
            "sending request"
        );

        let written = lock(&self.writer).write_frame(&payload);
        if let Err(error) = written {
            lock(&self.pending).remove(&id);
            if error.is_disconnect() {
                self.close();
                return Err(TransportError::Closed);
            }
            return Err(error);
        }

        match receiver.recv_timeout(self.call_timeout) {
            Ok(reply) => reply.and_then(|response| into_result(method, response)),
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.pending).remove(&id);
                warn!(
                    target: CHANNEL_TARGET,
                    plugin = %self.label,
                    method,
                    id,
                    timeout_ms = u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX),
                    "call timed out; marking plugin channel dead"
                );
                self.close();
                Err(TransportError::timeout(method, self.call_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    /// Closes the channel.
    ///
    /// Waiting callers receive [`TransportError::Closed`], later calls fail
    /// immediately and the plugin's input stream is closed. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(target: CHANNEL_TARGET, plugin = %self.label, "closing channel");
        let sink: Box<dyn Write + Send> = Box::new(io::sink());
        *lock(&self.writer) = FrameWriter::new(sink);
        fail_pending(&self.label, &self.pending);
    }
}

impl fmt::Debug for RpcChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChannel")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

fn into_result(method: &str, response: JsonRpcResponse) -> Result<Value, TransportError> {
    match response.error {
        Some(error) => Err(TransportError::Remote {
            method: method.to_owned(),
            code: error.code,
            message: error.message,
        }),
        None => Ok(response.result.unwrap_or(Value::Null)),
    }
}

fn read_replies<R: Read>(
    label: &str,
    mut reader: FrameReader<R>,
    pending: &PendingCalls,
    closed: &AtomicBool,
) {
    loop {
        match reader.read_frame() {
            Ok(Some(frame)) => route_reply(label, &frame, pending),
            Ok(None) => {
                debug!(target: CHANNEL_TARGET, plugin = %label, "plugin closed its output");
                break;
            }
            Err(error) => {
                warn!(
                    target: CHANNEL_TARGET,
                    plugin = %label,
                    %error,
                    "failed to read from plugin; closing channel"
                );
                break;
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    fail_pending(label, pending);
}

fn route_reply(label: &str, frame: &[u8], pending: &PendingCalls) {
    let response: JsonRpcResponse = match serde_json::from_slice(frame) {
        Ok(response) => response,
        Err(error) => {
            warn!(
                target: CHANNEL_TARGET,
                plugin = %label,
                %error,
                "discarding unparseable frame"
            );
            return;
        }
    };
    let Some(id) = response.id else {
        warn!(target: CHANNEL_TARGET, plugin = %label, "discarding reply without id");
        return;
    };
    let waiter = lock(pending).remove(&id);
    let Some(sender) = waiter else {
        debug!(target: CHANNEL_TARGET, plugin = %label, id, "no caller waiting for reply");
        return;
    };
    if sender.send(Ok(response)).is_err() {
        debug!(target: CHANNEL_TARGET, plugin = %label, id, "caller stopped waiting");
    }
}

fn fail_pending(label: &str, pending: &PendingCalls) {
    let waiters: Vec<(i64, Sender<Reply>)> = lock(pending).drain().collect();
    for (id, sender) in waiters {
        if sender.send(Err(TransportError::Closed)).is_err() {
            debug!(target: CHANNEL_TARGET, plugin = %label, id, "caller stopped waiting");
        }
    }
}

