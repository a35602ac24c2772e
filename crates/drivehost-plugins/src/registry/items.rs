//! Configuration items the registry derives for each driver.

use crate::driver::{Addition, ConfigItem, DriverConfig, ItemType};

const ROOT_FOLDER_ITEMS: [&str; 2] = ["root_folder_id", "root_folder_path"];

/// Items every storage offers, shaped by the driver's capabilities.
#[must_use]
pub fn common_items(config: &DriverConfig) -> Vec<ConfigItem> {
    let mut items = vec![
        ConfigItem::new("mount_path", ItemType::String)
            .required()
            .with_help("The path you want to mount to, it is unique and cannot be repeated"),
        ConfigItem::new("order", ItemType::Number).with_help("use to sort"),
        ConfigItem::new("remark", ItemType::Text),
    ];

    if !config.no_cache {
        items.push(
            ConfigItem::new("cache_expiration", ItemType::Number)
                .with_default("30")
                .required()
                .with_help("The cache expiration time for this storage"),
        );
    }

    if config.must_proxy() {
        items.push(
            ConfigItem::new("webdav_policy", ItemType::Select)
                .with_options("native_proxy,use_proxy_url")
                .with_default("native_proxy")
                .required(),
        );
    } else {
        items.push(
            ConfigItem::new("web_proxy", ItemType::Bool)
                .with_help("Whether to proxy web downloads through the host"),
        );
        items.push(
            ConfigItem::new("webdav_policy", ItemType::Select)
                .with_options("302_redirect,use_proxy_url,native_proxy")
                .with_default("302_redirect")
                .required(),
        );
    }

    if config.proxy_range_option {
        items.push(
            ConfigItem::new("proxy_range", ItemType::Bool)
                .with_help("Need to enable proxy"),
        );
    }

    items.push(
        ConfigItem::new("down_proxy_url", ItemType::Text)
            .with_help("External proxy address for downloads"),
    );
    items.push(
        ConfigItem::new("disable_proxy_sign", ItemType::Bool)
            .with_default("false")
            .with_help("Disable sign for Download proxy URL"),
    );

    if config.local_sort {
        items.push(
            ConfigItem::new("order_by", ItemType::Select).with_options("name,size,modified"),
        );
        items.push(ConfigItem::new("order_direction", ItemType::Select).with_options("asc,desc"));
    }

    items.push(ConfigItem::new("extract_folder", ItemType::Select).with_options("front,back"));
    items.push(
        ConfigItem::new("disable_index", ItemType::Bool)
            .with_default("false")
            .required(),
    );
    items.push(
        ConfigItem::new("enable_sign", ItemType::Bool)
            .with_default("false")
            .required(),
    );
    items
}

/// Items specific to one driver.
///
/// Opaque additions contribute nothing. Root folder items default to the
/// driver's root and become required once they carry a default.
#[must_use]
pub fn additional_items(config: &DriverConfig, addition: &Addition) -> Vec<ConfigItem> {
    let Addition::Structured(declared) = addition else {
        return Vec::new();
    };
    declared
        .iter()
        .cloned()
        .map(|mut item| {
            if ROOT_FOLDER_ITEMS.contains(&item.name.as_str()) {
                if item.default.is_empty() {
                    item.default.clone_from(&config.default_root);
                }
                if !item.default.is_empty() {
                    item.required = true;
                }
            }
            item
        })
        .collect()
}
