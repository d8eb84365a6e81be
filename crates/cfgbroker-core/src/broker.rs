//! Precedence-ordered view over a list of sources

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{self, FileLoader};
use crate::source::{Lookup, ObjectSource, Source};
use crate::vault::{VaultSettings, VaultSource};

/// Name given to the object source built from config files
const FILE_SOURCE_NAME: &str = "config";

/// Composes sources into one queryable configuration
///
/// Sources are ordered highest precedence first:
/// - `get` returns the value from the first source that defines the key
/// - `get_object` merges the mappings of every source that defines the key,
///   higher precedence winning on overlapping entries
///
/// # Example
///
/// ```
/// use cfgbroker_core::ConfigBroker;
/// use serde_json::json;
///
/// let broker = ConfigBroker::from_configs(vec![
///     json!({"db": {"host": "localhost", "port": 5432}}),
///     json!({"db": {"host": "db.internal"}}),
/// ]);
/// assert_eq!(broker.get("db.host").unwrap(), Some(json!("db.internal")));
/// assert_eq!(broker.get_int("db.port").unwrap(), Some(5432));
/// ```
pub struct ConfigBroker {
    sources: Vec<Box<dyn Source>>,
    vault_included: bool,
}

impl ConfigBroker {
    /// Create a broker over `sources`, highest precedence first
    pub fn new(sources: Vec<Box<dyn Source>>) -> Self {
        Self {
            sources,
            vault_included: false,
        }
    }

    /// Merge `configs` in order (later entries override earlier ones) into a
    /// single object source.
    ///
    /// This is file-layering order, the reverse of the broker's source order:
    /// the last config here wins, while in [`new`](Self::new) the first
    /// source wins.
    pub fn from_configs(configs: Vec<Value>) -> Self {
        let merged = loader::merge_layers(configs);
        Self::new(vec![Box::new(ObjectSource::with_name(FILE_SOURCE_NAME, merged))])
    }

    /// Load every file in `dir`, merged in file-name order
    pub fn from_directory(dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let merged = loader::load_directory(dir)?;
        Ok(Self::new(vec![Box::new(ObjectSource::with_name(FILE_SOURCE_NAME, merged))]))
    }

    /// Load `path` and its `extends` chain.
    ///
    /// Bare `extends` references resolve against `base_dir`, or `./config`
    /// when `None`.
    pub fn from_file(path: impl AsRef<Path>, base_dir: Option<&Path>) -> ConfigResult<Self> {
        let mut file_loader = FileLoader::new();
        if let Some(dir) = base_dir {
            file_loader = file_loader.base_dir(dir);
        }
        let merged = file_loader.load(path)?;
        Ok(Self::new(vec![Box::new(ObjectSource::with_name(FILE_SOURCE_NAME, merged))]))
    }

    /// Append a Vault source if the `vault` section enables it.
    ///
    /// Settings are read from the sources already in the broker, so an
    /// environment source can supply `vault.token`. The Vault source goes last
    /// (lowest precedence). `allowed_keys` is the complete list of secrets to
    /// fetch; `None` allows everything under the prefix.
    pub fn with_vault(mut self, allowed_keys: Option<Vec<String>>) -> ConfigResult<Self> {
        if self.vault_included {
            return Err(ConfigError::VaultAlreadyIncluded);
        }
        if !self.get_bool("vault.enabled")?.unwrap_or(false) {
            debug!("Vault not enabled, skipping");
            return Ok(self);
        }

        let mut section = self.get_object_or("vault", Value::Object(Map::new()))?;
        if let Some(map) = section.as_object_mut() {
            map.remove("enabled");
        }
        let mut settings: VaultSettings = serde_json::from_value(section)
            .map_err(|e| ConfigError::VaultConfig(format!("invalid vault section: {}", e)))?;
        settings.enabled = true;
        if let Some(token) = self.get_string("vault.token")? {
            settings.token = Some(token);
        }

        let source = VaultSource::new(&settings, allowed_keys)?;
        info!("Including Vault source: {:?}", source);
        self.sources.push(Box::new(source));
        self.vault_included = true;
        Ok(self)
    }

    /// The sources, highest precedence first
    pub fn sources(&self) -> &[Box<dyn Source>] {
        &self.sources
    }

    /// Initialize every source in order. The first failure stops the walk.
    pub async fn initialize(&mut self) -> ConfigResult<()> {
        for source in self.sources.iter_mut() {
            debug!("Initializing source '{}'", source.name());
            source.initialize().await?;
        }
        info!("Initialized {} config sources", self.sources.len());
        Ok(())
    }

    /// First non-absent scalar for `key`, along with whether the defining
    /// source keeps JSON types
    fn lookup(&self, key: &str) -> ConfigResult<Option<(Value, bool)>> {
        for source in &self.sources {
            match source.get(key) {
                Lookup::Absent => continue,
                Lookup::Blocked => return Err(ConfigError::NotAvailable(key.to_string())),
                Lookup::Found(value) if value.is_object() => {
                    return Err(ConfigError::UnsafeObjectGet(key.to_string()))
                }
                Lookup::Found(value) => return Ok(Some((value, source.supports_types()))),
            }
        }
        Ok(None)
    }

    /// Value of `key` from the highest-precedence source defining it.
    ///
    /// A mapping is rejected: part of it could live in lower sources, use
    /// [`get_object`](Self::get_object) instead.
    pub fn get(&self, key: &str) -> ConfigResult<Option<Value>> {
        Ok(self.lookup(key)?.map(|(value, _)| value))
    }

    pub fn get_or(&self, key: &str, default: Value) -> ConfigResult<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Like [`get`](Self::get), but a missing key is an error
    pub fn require(&self, key: &str) -> ConfigResult<Value> {
        self.get(key)?
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Merge the mapping at `key` from every source defining it
    pub fn get_object(&self, key: &str) -> ConfigResult<Option<Value>> {
        let mut found = Vec::new();
        for source in &self.sources {
            match source.get(key) {
                Lookup::Absent => {}
                Lookup::Blocked => return Err(ConfigError::NotAvailable(key.to_string())),
                Lookup::Found(Value::Object(map)) => found.push(map),
                Lookup::Found(_) => return Err(ConfigError::NotAnObject(key.to_string())),
            }
        }
        if found.is_empty() {
            return Ok(None);
        }

        let merged = found
            .into_iter()
            .rev()
            .fold(Map::new(), |mut merged, map| {
                merged.extend(map);
                merged
            });
        Ok(Some(Value::Object(merged)))
    }

    pub fn get_object_or(&self, key: &str, default: Value) -> ConfigResult<Value> {
        Ok(self.get_object(key)?.unwrap_or(default))
    }

    pub fn get_string(&self, key: &str) -> ConfigResult<Option<String>> {
        match self.lookup(key)? {
            None | Some((Value::Null, _)) => Ok(None),
            Some((Value::String(s), _)) => Ok(Some(s)),
            Some(_) => Err(mismatch(key, "string")),
        }
    }

    /// Integer at `key`; string values from untyped sources are parsed
    pub fn get_int(&self, key: &str) -> ConfigResult<Option<i64>> {
        match self.lookup(key)? {
            None | Some((Value::Null, _)) => Ok(None),
            Some((Value::String(s), false)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| mismatch(key, "integer")),
            Some((value, _)) => value.as_i64().map(Some).ok_or_else(|| mismatch(key, "integer")),
        }
    }

    /// Boolean at `key`; string values from untyped sources accept
    /// `true/yes/on/1` and `false/no/off/0/""`
    pub fn get_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        match self.lookup(key)? {
            None | Some((Value::Null, _)) => Ok(None),
            Some((Value::String(s), false)) => parse_bool(&s)
                .map(Some)
                .ok_or_else(|| mismatch(key, "boolean")),
            Some((Value::Bool(b), _)) => Ok(Some(b)),
            Some(_) => Err(mismatch(key, "boolean")),
        }
    }

    /// Array at `key`; string values from untyped sources must hold a JSON array
    pub fn get_array(&self, key: &str) -> ConfigResult<Option<Vec<Value>>> {
        match self.lookup(key)? {
            None | Some((Value::Null, _)) => Ok(None),
            Some((Value::String(s), false)) => match serde_json::from_str(&s) {
                Ok(Value::Array(items)) => Ok(Some(items)),
                _ => Err(mismatch(key, "array")),
            },
            Some((Value::Array(items), _)) => Ok(Some(items)),
            Some(_) => Err(mismatch(key, "array")),
        }
    }

    /// Each source's own log-safe description, in precedence order
    pub fn describe_for_logging(&self) -> Vec<Value> {
        self.sources
            .iter()
            .map(|source| source.describe_for_logging())
            .collect()
    }

    /// Emit one log event per source with its log-safe description
    pub fn log_configs(&self) {
        for source in &self.sources {
            info!(
                source = source.name(),
                "{} {}",
                source.name(),
                source.describe_for_logging()
            );
        }
    }
}

impl std::fmt::Debug for ConfigBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("ConfigBroker")
            .field("sources", &names)
            .field("vault_included", &self.vault_included)
            .finish()
    }
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

/// Interpret user-supplied text as a boolean
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}
