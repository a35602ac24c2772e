//! Static descriptors a driver reports about itself.

use serde::{Deserialize, Serialize};

/// Capabilities and defaults declared by a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Unique driver name.
    pub name: String,
    /// Listings are sorted by the host rather than the backend.
    pub local_sort: bool,
    /// Downloads must always go through the host proxy.
    pub only_proxy: bool,
    /// Listings must not be cached.
    pub no_cache: bool,
    /// The backend does not accept uploads.
    pub no_upload: bool,
    /// Root folder used when a storage does not set one.
    pub default_root: String,
    /// The host should check the backend's status.
    pub check_status: bool,
    /// Notice shown when configuring a storage.
    pub alert: String,
    /// Ranged downloads may be proxied.
    pub proxy_range_option: bool,
    /// The backend cannot produce direct links.
    pub no_link_url: bool,
}

impl DriverConfig {
    /// Creates a descriptor with defaults for everything but the name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when downloads can only be served through the proxy.
    #[must_use]
    pub const fn must_proxy(&self) -> bool {
        self.only_proxy || self.no_link_url
    }
}

/// Widget type of a configuration item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Single-line text.
    #[default]
    String,
    /// Numeric input.
    Number,
    /// Multi-line text.
    Text,
    /// Checkbox.
    Bool,
    /// One of a fixed set of options.
    Select,
}

/// One configurable field of a storage, as shown to administrators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigItem {
    /// Field name.
    pub name: String,
    /// Widget type.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Default value.
    pub default: String,
    /// Comma-separated options for [`ItemType::Select`].
    pub options: String,
    /// Whether a value must be supplied.
    pub required: bool,
    /// Help text.
    pub help: String,
}

impl ConfigItem {
    /// Creates an optional item without default or help.
    #[must_use]
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            item_type,
            ..Self::default()
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    /// Sets the select options.
    #[must_use]
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Marks the item as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
