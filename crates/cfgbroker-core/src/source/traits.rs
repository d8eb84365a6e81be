//! Core trait and lookup type for configuration sources

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConfigResult;

/// Result of looking a key up in a single source
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The source defines the key (an explicit `null` is still a value)
    Found(Value),
    /// The source does not define the key
    Absent,
    /// The key exists but was deliberately withheld (e.g. a Vault secret
    /// outside the allow-list). Must never be treated as absent.
    Blocked,
}

impl From<Option<&Value>> for Lookup {
    fn from(value: Option<&Value>) -> Self {
        match value {
            Some(value) => Lookup::Found(value.clone()),
            None => Lookup::Absent,
        }
    }
}

/// A provider of configuration values
///
/// Implementations:
/// - `ObjectSource`: in-memory nested data (usually parsed from files)
/// - `EnvironmentSource`: process environment variables
/// - `VaultSource`: secrets pre-fetched from HashiCorp Vault
///
/// A source is constructed, initialized at most once, and then queried any
/// number of times. Queries never perform I/O except reading the process
/// environment.
#[async_trait]
pub trait Source: Send + Sync {
    /// Human-readable name of this source, used in logs
    fn name(&self) -> &str;

    /// Look up a dotted key
    fn get(&self, key: &str) -> Lookup;

    /// Prepare the source for queries (network/filesystem work happens here)
    async fn initialize(&mut self) -> ConfigResult<()> {
        Ok(())
    }

    /// Snapshot of the source's data that is safe to write to logs
    fn describe_for_logging(&self) -> Value;

    /// Whether values keep their JSON types.
    ///
    /// Sources that only hold strings (environment variables) return `false`,
    /// and the broker's typed getters coerce their values instead.
    fn supports_types(&self) -> bool {
        true
    }
}
