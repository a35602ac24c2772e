//! Plugin executable discovery.
//!
//! A candidate is a regular file directly inside a plugin directory whose
//! name has no extension or the `.exe` extension. Dot files count like any
//! other name. Subdirectories are skipped; a missing directory simply yields
//! no candidates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::PluginError;

/// Log target for discovery operations.
const DISCOVERY_TARGET: &str = "drivehost_plugins::discovery";

/// Lists plugin candidates in `dir`, sorted by path.
///
/// # Errors
///
/// Returns [`PluginError::Discovery`] when the directory exists but cannot be
/// read.
pub fn plugin_candidates(dir: &Path) -> Result<Vec<PathBuf>, PluginError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(
                target: DISCOVERY_TARGET,
                path = %dir.display(),
                "plugin directory does not exist"
            );
            return Ok(Vec::new());
        }
        Err(error) => return Err(discovery_error(dir, error)),
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let path = entry.map_err(|error| discovery_error(dir, error))?.path();
        if is_candidate(&path) {
            candidates.push(path);
        }
    }
    candidates.sort();
    debug!(
        target: DISCOVERY_TARGET,
        path = %dir.display(),
        count = candidates.len(),
        "scanned plugin directory"
    );
    Ok(candidates)
}

/// Returns `true` if `path` looks like a plugin executable.
#[must_use]
pub fn is_candidate(path: &Path) -> bool {
    let has_executable_extension = path.extension().is_none_or(|extension| extension == "exe");
    has_executable_extension && fs::metadata(path).is_ok_and(|metadata| metadata.is_file())
}

fn discovery_error(dir: &Path, error: io::Error) -> PluginError {
    PluginError::Discovery {
        path: dir.to_path_buf(),
        source: Arc::new(error),
    }
}
