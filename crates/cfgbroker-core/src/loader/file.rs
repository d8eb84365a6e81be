//! Single-file loader with `extends` inheritance

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::{merge_layers, read_config_file, type_name};
use crate::error::{ConfigError, ConfigResult};

/// Default directory for resolving bare `extends` references
pub const DEFAULT_CONFIG_DIR: &str = "./config";

/// Key naming the parent file of a config file
pub const EXTENDS_KEY: &str = "extends";

/// Loads a config file and the chain of files it `extends`.
///
/// An `extends` value starting with `./` or `../` is resolved against the
/// directory of the file declaring it. Anything else is resolved against the
/// base directory (absolute paths stay absolute).
///
/// # Example
///
/// ```no_run
/// use cfgbroker_core::loader::FileLoader;
///
/// let data = FileLoader::new()
///     .base_dir("/etc/myapp")
///     .load("/etc/myapp/production.json")
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileLoader {
    base_dir: PathBuf,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLoader {
    /// Loader using `./config` as the base directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
        }
    }

    /// Set the directory used for bare `extends` references
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Load `path` and everything it extends, merged parent-first
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let mut layers = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(path.as_ref().to_path_buf());

        while let Some(current) = next.take() {
            let current = absolute(&current)?;
            if !seen.insert(current.clone()) {
                return Err(ConfigError::ExtendsCycle(current));
            }

            let mut layer = read_config_file(&current)?;
            let extends = layer
                .as_object_mut()
                .and_then(|map| map.remove(EXTENDS_KEY));

            match extends {
                None | Some(Value::Null) => {}
                Some(Value::String(parent)) => {
                    let resolved = self.resolve_extends(&current, &parent);
                    debug!("{} extends {}", current.display(), resolved.display());
                    next = Some(resolved);
                }
                Some(other) => {
                    return Err(ConfigError::parse(
                        &current,
                        format!(
                            "the {} section should be a string, got {}",
                            EXTENDS_KEY,
                            type_name(&other)
                        ),
                    ));
                }
            }
            layers.push(layer);
        }

        layers.reverse();
        Ok(merge_layers(layers))
    }

    fn resolve_extends(&self, child: &Path, parent: &str) -> PathBuf {
        if parent.starts_with("./") || parent.starts_with("../") {
            let dir = child.parent().unwrap_or_else(|| Path::new("."));
            dir.join(parent)
        } else {
            self.base_dir.join(parent)
        }
    }
}

fn absolute(path: &Path) -> ConfigResult<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let cwd = std::env::current_dir().map_err(|e| ConfigError::io(path, e))?;
    Ok(normalize(&cwd.join(path)))
}

// Lexical cleanup of `.` and `..` so cycle detection compares like with like
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_single_file_without_extends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, r#"{"a": 1}"#).unwrap();

        assert_eq!(FileLoader::new().load(&path).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_relative_extends_chain() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("base.json"),
            r#"{"db": {"host": "localhost", "port": 5432}, "debug": false}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("child.json"),
            r#"{"extends": "./base.json", "db": {"host": "db.prod"}, "debug": null}"#,
        )
        .unwrap();

        let merged = FileLoader::new().load(dir.path().join("child.json")).unwrap();
        assert_eq!(merged, json!({"db": {"host": "db.prod", "port": 5432}}));
        assert!(merged.get(EXTENDS_KEY).is_none());
    }

    #[test]
    fn test_parent_directory_extends() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("envs")).unwrap();
        fs::write(dir.path().join("common.yaml"), "name: app\nlevel: info\n").unwrap();
        fs::write(
            dir.path().join("envs").join("dev.yaml"),
            "extends: ../common.yaml\nlevel: debug\n",
        )
        .unwrap();

        let merged = FileLoader::new()
            .load(dir.path().join("envs").join("dev.yaml"))
            .unwrap();
        assert_eq!(merged, json!({"name": "app", "level": "debug"}));
    }

    #[test]
    fn test_bare_extends_uses_base_dir() {
        let base = tempdir().unwrap();
        let other = tempdir().unwrap();
        fs::write(base.path().join("defaults.json"), r#"{"a": 1, "b": 1}"#).unwrap();
        fs::write(
            other.path().join("app.json"),
            r#"{"extends": "defaults.json", "b": 2}"#,
        )
        .unwrap();

        let merged = FileLoader::new()
            .base_dir(base.path())
            .load(other.path().join("app.json"))
            .unwrap();
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_three_level_chain_strips_every_extends() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"level": "a", "from_a": true}"#).unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"{"extends": "./a.json", "level": "b", "from_b": true}"#,
        )
        .unwrap();
        fs::write(dir.path().join("c.json"), r#"{"extends": "./b.json", "level": "c"}"#).unwrap();

        let merged = FileLoader::new().load(dir.path().join("c.json")).unwrap();
        assert_eq!(merged, json!({"level": "c", "from_a": true, "from_b": true}));
    }

    #[test]
    fn test_non_string_extends_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"extends": ["a.json"]}"#).unwrap();

        let err = FileLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("should be a string"));
    }

    #[test]
    fn test_extends_cycle_detected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"extends": "./b.json"}"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"extends": "./a.json"}"#).unwrap();

        let err = FileLoader::new().load(dir.path().join("a.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ExtendsCycle(_)));
    }

    #[test]
    fn test_missing_parent_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("child.json");
        fs::write(&path, r#"{"extends": "./missing.json"}"#).unwrap();

        let err = FileLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
