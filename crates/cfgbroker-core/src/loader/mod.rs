//! Loading layered configuration files into a single object
//!
//! Two layouts are supported:
//! - a directory of files merged in file-name order (`load_directory`)
//! - a single file that may `extends` a parent file (`FileLoader`)
//!
//! Layers are combined with RFC 7386 merge patch: later layers override
//! scalars, explicit `null` deletes a key, objects merge recursively and
//! arrays are replaced wholesale.

mod directory;
mod file;

use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

pub use directory::load_directory;
pub use file::{FileLoader, DEFAULT_CONFIG_DIR, EXTENDS_KEY};

/// Merge layers in order; each layer is applied as a patch over the previous
pub fn merge_layers<I>(layers: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    layers
        .into_iter()
        .fold(Value::Object(Map::new()), |mut merged, layer| {
            json_patch::merge(&mut merged, &layer);
            merged
        })
}

/// Read and parse one config file.
///
/// `.json` files are parsed as JSON, everything else as YAML. An empty file
/// is an empty object; any other non-object document is rejected.
pub(crate) fn read_config_file(path: &Path) -> ConfigResult<Value> {
    debug!("Reading config file: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let value: Value = if is_json {
        serde_json::from_str(&content).map_err(|e| ConfigError::parse(path, e))?
    } else {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?
    };

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(ConfigError::parse(
            path,
            format!("expected a mapping at the top level, got {}", type_name(&other)),
        )),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
