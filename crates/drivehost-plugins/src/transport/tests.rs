//! Unit tests for the multiplexed RPC channel.

use std::io::{self, PipeReader, PipeWriter};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rstest::rstest;
use serde_json::{Value, json};

use super::*;

type Handler = dyn Fn(&JsonRpcRequest) -> Option<JsonRpcResponse> + Send + Sync;

/// Serves requests from `input` on a background thread until the host hangs up.
fn serve(input: PipeReader, output: PipeWriter, handler: Arc<Handler>) {
    thread::spawn(move || {
        let mut frames = FrameReader::new(input);
        let mut replies = FrameWriter::new(output);
        while let Ok(Some(frame)) = frames.read_frame() {
            let request: JsonRpcRequest = serde_json::from_slice(&frame).expect("request");
            let Some(response) = handler(&request) else {
                continue;
            };
            let bytes = serde_json::to_vec(&response).expect("response");
            if replies.write_frame(&bytes).is_err() {
                break;
            }
        }
    });
}

fn channel_with(handler: Arc<Handler>, timeout: Duration) -> RpcChannel {
    let (host_reader, plugin_writer) = io::pipe().expect("pipe");
    let (plugin_reader, host_writer) = io::pipe().expect("pipe");
    serve(plugin_reader, plugin_writer, handler);
    RpcChannel::start("test", FrameReader::new(host_reader), host_writer, timeout)
        .expect("start channel")
}

fn echo() -> Arc<Handler> {
    Arc::new(|request: &JsonRpcRequest| {
        Some(JsonRpcResponse::success(
            request.id,
            request.params.clone().unwrap_or(Value::Null),
        ))
    })
}

#[rstest]
fn call_returns_result() {
    let channel = channel_with(echo(), Duration::from_secs(5));
    let result = channel
        .call("Plugin.Echo", Some(json!({"value": 42})))
        .expect("call succeeds");
    assert_eq!(result, json!({"value": 42}));
}

#[rstest]
fn null_result_is_returned_as_null() {
    let channel = channel_with(echo(), Duration::from_secs(5));
    let result = channel.call("Plugin.DropDriver", None).expect("call succeeds");
    assert_eq!(result, Value::Null);
}

#[rstest]
fn remote_error_is_surfaced() {
    let handler: Arc<Handler> = Arc::new(|request: &JsonRpcRequest| {
        Some(JsonRpcResponse::failure(
            Some(request.id),
            JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, "unknown method"),
        ))
    });
    let channel = channel_with(handler, Duration::from_secs(5));
    let error = channel.call("Plugin.Nope", None).expect_err("remote error");
    assert!(
        matches!(
            &error,
            TransportError::Remote { method, code, .. }
                if method == "Plugin.Nope" && *code == JsonRpcError::METHOD_NOT_FOUND
        ),
        "unexpected error: {error}"
    );
}

#[rstest]
fn silent_plugin_times_out_and_channel_is_marked_dead() {
    let channel = channel_with(Arc::new(|_: &JsonRpcRequest| None), Duration::from_millis(100));

    let error = channel.call("Plugin.List", None).expect_err("timeout");
    assert!(matches!(error, TransportError::Timeout { .. }), "got {error}");
    assert!(channel.is_closed());

    let next = channel.call("Plugin.List", None).expect_err("closed");
    assert!(matches!(next, TransportError::Closed), "got {next}");
}

#[rstest]
fn closed_channel_rejects_calls() {
    let channel = channel_with(echo(), Duration::from_secs(5));
    channel.close();
    channel.close();
    let error = channel.call("Plugin.GetInfo", None).expect_err("closed");
    assert!(matches!(error, TransportError::Closed));
}

#[rstest]
fn exited_plugin_yields_closed() {
    let (host_reader, plugin_writer) = io::pipe().expect("pipe");
    let (plugin_reader, host_writer) = io::pipe().expect("pipe");
    drop(plugin_writer);
    drop(plugin_reader);
    let channel = RpcChannel::start(
        "gone",
        FrameReader::new(host_reader),
        host_writer,
        Duration::from_secs(5),
    )
    .expect("start channel");

    let error = channel.call("Plugin.GetInfo", None).expect_err("closed");
    assert!(matches!(error, TransportError::Closed), "got {error}");
}

#[rstest]
fn concurrent_calls_receive_their_own_replies() {
    let channel = Arc::new(channel_with(echo(), Duration::from_secs(5)));
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let shared = Arc::clone(&channel);
            thread::spawn(move || {
                let result = shared
                    .call("Plugin.Echo", Some(json!({ "n": n })))
                    .expect("call succeeds");
                assert_eq!(result, json!({ "n": n }));
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("caller thread");
    }
}
