//! Host storage and object records passed to drivers.
//!
//! These records cross the process boundary as envelopes, so every field is
//! `serde`-visible and missing fields fall back to their defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A mounted storage backed by one driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Storage identifier.
    pub id: u32,
    /// Path the storage is mounted at.
    pub mount_path: String,
    /// Sort order among storages.
    pub order: i32,
    /// Driver name serving this storage.
    pub driver: String,
    /// Directory cache lifetime in minutes.
    pub cache_expiration: i32,
    /// Last reported status.
    pub status: String,
    /// Driver-specific settings serialised as JSON.
    pub addition: String,
    /// Free-form note.
    pub remark: String,
    /// Whether the storage is disabled.
    pub disabled: bool,
    /// Whether the storage is excluded from search indexing.
    pub disable_index: bool,
    /// Whether download links are signed.
    pub enable_sign: bool,
    /// Field used for local sorting.
    pub order_by: String,
    /// Direction used for local sorting.
    pub order_direction: String,
    /// Placement of folders in listings.
    pub extract_folder: String,
    /// Whether web downloads are proxied.
    pub web_proxy: bool,
    /// WebDAV download policy.
    pub webdav_policy: String,
    /// Whether ranged requests are proxied.
    pub proxy_range: bool,
    /// External download proxy address.
    pub down_proxy_url: String,
    /// Whether proxy URLs skip signing.
    pub disable_proxy_sign: bool,
}

/// A file or folder reported by a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Object {
    /// Driver-side identifier.
    pub id: String,
    /// Path within the storage.
    pub path: String,
    /// Display name.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// Modification time in seconds since the Unix epoch.
    pub modified: i64,
    /// Whether the object is a folder.
    pub is_folder: bool,
}

/// Arguments for listing a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListArgs {
    /// Path requested by the client.
    pub req_path: String,
    /// Whether cached listings should be bypassed.
    pub refresh: bool,
}

/// Arguments for producing a download link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkArgs {
    /// Client address.
    pub ip: String,
    /// Request headers forwarded by the client.
    pub header: BTreeMap<String, Vec<String>>,
    /// Kind of link requested.
    #[serde(rename = "type")]
    pub link_type: String,
    /// Whether the link will be used for a redirect.
    pub redirect: bool,
}

/// A resolved download link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    /// URL serving the content.
    pub url: String,
    /// Headers the client must send with the request.
    pub header: BTreeMap<String, Vec<String>>,
    /// Seconds until the link expires, when bounded.
    pub expiration_secs: Option<u64>,
}
