use std::path::PathBuf;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Directories searched for plugin executables, in scan order.
pub const DEFAULT_PLUGIN_DIRS: [&str; 4] = [
    "./plugins",
    "./data/plugins",
    "/usr/local/share/drivehost/plugins",
    "/opt/drivehost/plugins",
];

/// Deadline applied to every remote plugin call.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Time a freshly spawned plugin has to announce its handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Environment variable a plugin must observe before it speaks the protocol.
pub const DEFAULT_MAGIC_COOKIE_KEY: &str = "DRIVEHOST_PLUGIN";

/// Value paired with [`DEFAULT_MAGIC_COOKIE_KEY`].
pub const DEFAULT_MAGIC_COOKIE_VALUE: &str = "driver-plugin";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// The plugin directories searched when none are configured.
#[must_use]
pub fn default_plugin_dirs() -> Vec<PathBuf> {
    DEFAULT_PLUGIN_DIRS.iter().map(PathBuf::from).collect()
}

/// Owned magic cookie key.
#[must_use]
pub fn default_magic_cookie_key() -> String {
    DEFAULT_MAGIC_COOKIE_KEY.to_owned()
}

/// Owned magic cookie value.
#[must_use]
pub fn default_magic_cookie_value() -> String {
    DEFAULT_MAGIC_COOKIE_VALUE.to_owned()
}
