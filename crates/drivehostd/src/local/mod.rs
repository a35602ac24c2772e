//! The built-in `Local` driver serving a directory of the host filesystem.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use drivehost_plugins::{
    Addition, CallContext, ConfigItem, Driver, DriverConfig, DriverError, DriverRegistry,
    HostDriverRegistry, ItemType, Link, LinkArgs, ListArgs, Meta, Object, Reader, RegistryError,
    Storage,
};
use serde::Deserialize;

/// Registry name of the built-in driver.
pub const LOCAL_DRIVER: &str = "Local";

/// Registers the built-in driver under [`LOCAL_DRIVER`].
///
/// # Errors
///
/// Returns [`RegistryError::NameConflict`] if the name is already taken.
pub fn register_local(registry: &HostDriverRegistry) -> Result<(), RegistryError> {
    registry.register(
        LOCAL_DRIVER,
        Arc::new(|| -> Box<dyn Driver> { Box::new(LocalDriver::new()) }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalAddition {
    root_folder_path: String,
}

/// Serves files below a root folder named in the storage's addition.
#[derive(Debug, Clone, Default)]
pub struct LocalDriver {
    storage: Option<Storage>,
    root: Option<PathBuf>,
}

impl LocalDriver {
    /// Creates an unbound instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: None,
            root: None,
        }
    }

    /// Root folder resolved by [`Meta::init`].
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn backend_error(message: impl Into<String>, source: Option<io::Error>) -> DriverError {
        DriverError::Backend {
            driver: LOCAL_DRIVER.to_owned(),
            message: message.into(),
            source: source.map(Arc::new),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, DriverError> {
        let root = self.root.as_ref().ok_or_else(|| DriverError::StorageNotSet {
            driver: LOCAL_DRIVER.to_owned(),
        })?;
        let mut resolved = root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(Self::backend_error(
                        format!("path '{path}' escapes the storage root"),
                        None,
                    ));
                }
            }
        }
        Ok(resolved)
    }
}

impl Meta for LocalDriver {
    fn config(&self) -> DriverConfig {
        DriverConfig {
            local_sort: true,
            no_cache: true,
            ..DriverConfig::named(LOCAL_DRIVER)
        }
    }

    fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    fn set_storage(&mut self, storage: Storage) {
        self.storage = Some(storage);
    }

    fn addition(&self) -> Addition {
        Addition::Structured(vec![
            ConfigItem::new("root_folder_path", ItemType::String)
                .required()
                .with_help("Directory on the host served by this storage"),
        ])
    }

    fn init(&mut self, _ctx: &CallContext) -> Result<(), DriverError> {
        let storage = self.storage.as_ref().ok_or_else(|| DriverError::StorageNotSet {
            driver: LOCAL_DRIVER.to_owned(),
        })?;
        let addition: LocalAddition = if storage.addition.trim().is_empty() {
            LocalAddition::default()
        } else {
            serde_json::from_str(&storage.addition).map_err(|error| {
                Self::backend_error(format!("invalid addition: {error}"), None)
            })?
        };
        if addition.root_folder_path.is_empty() {
            return Err(Self::backend_error("root_folder_path is required", None));
        }
        let root = PathBuf::from(addition.root_folder_path);
        let metadata = fs::metadata(&root).map_err(|error| {
            Self::backend_error(format!("cannot open {}", root.display()), Some(error))
        })?;
        if !metadata.is_dir() {
            return Err(Self::backend_error(
                format!("{} is not a directory", root.display()),
                None,
            ));
        }
        self.root = Some(root);
        Ok(())
    }

    fn drop_driver(&mut self, _ctx: &CallContext) -> Result<(), DriverError> {
        self.root = None;
        Ok(())
    }
}

impl Reader for LocalDriver {
    fn list(
        &self,
        _ctx: &CallContext,
        dir: &Object,
        _args: &ListArgs,
    ) -> Result<Vec<Object>, DriverError> {
        let folder = self.resolve(&dir.path)?;
        let entries = fs::read_dir(&folder).map_err(|error| {
            Self::backend_error(format!("cannot list {}", folder.display()), Some(error))
        })?;
        let parent = dir.path.trim_end_matches('/');
        let mut objects = Vec::new();
        for item in entries {
            let entry = item.map_err(|error| {
                Self::backend_error(format!("cannot list {}", folder.display()), Some(error))
            })?;
            let metadata = entry.metadata().map_err(|error| {
                Self::backend_error(
                    format!("cannot stat {}", entry.path().display()),
                    Some(error),
                )
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            objects.push(Object {
                id: String::new(),
                path: format!("{parent}/{name}"),
                size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
                modified: modified_secs(&metadata),
                is_folder: metadata.is_dir(),
                name,
            });
        }
        objects.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(objects)
    }

    fn link(
        &self,
        _ctx: &CallContext,
        file: &Object,
        _args: &LinkArgs,
    ) -> Result<Link, DriverError> {
        let path = self.resolve(&file.path)?;
        if !path.is_file() {
            return Err(Self::backend_error(
                format!("{} is not a file", file.path),
                None,
            ));
        }
        Ok(Link {
            url: format!("file://{}", path.display()),
            ..Link::default()
        })
    }
}

fn modified_secs(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .and_then(|elapsed| i64::try_from(elapsed.as_secs()).ok())
        .unwrap_or_default()
}
