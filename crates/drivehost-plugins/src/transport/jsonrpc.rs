//! JSON-RPC 2.0 message types exchanged with plugin processes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version carried in every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// One call sent from the host to a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,
    /// Correlates the reply; unique per channel.
    pub id: i64,
    /// Remote method such as `Plugin.List`.
    pub method: String,
    /// Method arguments, absent for parameterless calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Builds a request stamped with the protocol version.
    #[must_use]
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A plugin's reply to one [`JsonRpcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always [`JSONRPC_VERSION`] for well-formed replies.
    pub jsonrpc: String,
    /// Id of the answered request; `None` when the request could not be parsed.
    pub id: Option<i64>,
    /// The result on success. A `null` result deserialises to `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure reported by the plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Reply carrying a result.
    #[must_use]
    pub fn success(id: i64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Reply carrying an error.
    #[must_use]
    pub fn failure(id: Option<i64>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Error object of a failed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric code; plugins may use codes outside the reserved range.
    pub code: i64,
    /// Diagnostic relayed into [`TransportError::Remote`](super::TransportError::Remote).
    pub message: String,
    /// Extra structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// The frame was not valid JSON.
    pub const PARSE_ERROR: i64 = -32_700;
    /// The method does not exist on the plugin.
    pub const METHOD_NOT_FOUND: i64 = -32_601;
    /// The parameters did not match the method.
    pub const INVALID_PARAMS: i64 = -32_602;
    /// The plugin failed while serving the call.
    pub const INTERNAL_ERROR: i64 = -32_603;

    /// Error object without extra detail.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}
