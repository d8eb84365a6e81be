//! Directory-of-files loader

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use super::{merge_layers, read_config_file};
use crate::error::{ConfigError, ConfigResult};

/// Load every file in `dir`, sorted by file name, and merge them in order.
///
/// Later files override earlier ones. Sub-directories are skipped. Any file
/// that fails to parse aborts the whole load.
pub fn load_directory(dir: impl AsRef<Path>) -> ConfigResult<Value> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    info!("Loading {} config files from {}", files.len(), dir.display());
    let layers = files
        .iter()
        .map(|path| read_config_file(path))
        .collect::<ConfigResult<Vec<_>>>()?;
    Ok(merge_layers(layers))
}
