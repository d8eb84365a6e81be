//! Environment variable source

use std::collections::BTreeSet;
use std::env;

use serde_json::{Map, Value};

use super::traits::{Lookup, Source};
use crate::vault::REDACTED;

/// Keys whose values are always masked in log output
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &["vault.token"];

/// Source that reads process environment variables at query time
///
/// Dotted keys map to variable names by uppercasing and replacing `.` with
/// `_`, after an optional prefix:
/// - `vault.token` → `VAULT_TOKEN`
/// - `vault.token` with prefix `APP_` → `APP_VAULT_TOKEN`
///
/// Values are always strings, so the broker coerces them in typed getters.
///
/// `describe_for_logging` masks sensitive keys (`vault.token` by default) and
/// every variable below them.
///
/// # Example
///
/// ```
/// use cfgbroker_core::source::{EnvironmentSource, Source};
///
/// let source = EnvironmentSource::with_prefix("MYAPP_");
/// assert_eq!(source.var_name("db.host"), "MYAPP_DB_HOST");
/// ```
#[derive(Debug, Clone)]
pub struct EnvironmentSource {
    prefix: String,
    keys: Option<BTreeSet<String>>,
    sensitive: BTreeSet<String>,
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        Self::with_prefix("")
    }
}

impl EnvironmentSource {
    /// Source over the whole environment, no prefix
    pub fn new() -> Self {
        Self::default()
    }

    /// Source over variables starting with `prefix`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            keys: None,
            sensitive: DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Restrict the source to an explicit set of dotted keys
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Mask these dotted keys, and everything below them, in log output
    pub fn with_sensitive_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Environment variable name for a dotted key
    pub fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase().replace('.', "_"))
    }

    fn exposes(&self, key: &str) -> bool {
        self.keys.as_ref().map_or(true, |keys| keys.contains(key))
    }

    fn is_sensitive(&self, name: &str) -> bool {
        self.sensitive.iter().any(|key| {
            let var = self.var_name(key);
            name == var
                || name
                    .strip_prefix(var.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
        })
    }

    fn logged_value(&self, name: &str, value: String) -> Value {
        if self.is_sensitive(name) {
            Value::String(REDACTED.to_string())
        } else {
            Value::String(value)
        }
    }
}

impl Source for EnvironmentSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Lookup {
        if !self.exposes(key) {
            return Lookup::Absent;
        }
        match env::var(self.var_name(key)) {
            Ok(value) => Lookup::Found(Value::String(value)),
            Err(_) => Lookup::Absent,
        }
    }

    fn describe_for_logging(&self) -> Value {
        let mut exposed = Map::new();
        if let Some(keys) = &self.keys {
            for key in keys {
                let name = self.var_name(key);
                if let Ok(value) = env::var(&name) {
                    let logged = self.logged_value(&name, value);
                    exposed.insert(name, logged);
                }
            }
        } else if !self.prefix.is_empty() {
            for (name, value) in env::vars() {
                if name.starts_with(&self.prefix) {
                    let logged = self.logged_value(&name, value);
                    exposed.insert(name, logged);
                }
            }
        }
        Value::Object(exposed)
    }

    fn supports_types(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_env_source_name() {
        let source = EnvironmentSource::new();
        assert_eq!(source.name(), "environment");
        assert!(!source.supports_types());
    }

    #[test]
    fn test_var_name_mapping() {
        assert_eq!(EnvironmentSource::new().var_name("vault.token"), "VAULT_TOKEN");
        assert_eq!(
            EnvironmentSource::with_prefix("APP_").var_name("db.pool.size"),
            "APP_DB_POOL_SIZE"
        );
    }

    #[test]
    fn test_env_source_reads_at_query_time() {
        let source = EnvironmentSource::with_prefix("CFGB_TEST_QT_");
        assert_eq!(source.get("db.host"), Lookup::Absent);

        env::set_var("CFGB_TEST_QT_DB_HOST", "db.internal");
        assert_eq!(source.get("db.host"), Lookup::Found(json!("db.internal")));

        env::remove_var("CFGB_TEST_QT_DB_HOST");
        assert_eq!(source.get("db.host"), Lookup::Absent);
    }

    #[test]
    fn test_env_source_key_allow_list() {
        env::set_var("CFGB_TEST_AL_PUBLIC", "yes");
        env::set_var("CFGB_TEST_AL_HIDDEN", "no");

        let source = EnvironmentSource::with_prefix("CFGB_TEST_AL_").with_keys(["public"]);
        assert_eq!(source.get("public"), Lookup::Found(json!("yes")));
        assert_eq!(source.get("hidden"), Lookup::Absent);
        assert_eq!(
            source.describe_for_logging(),
            json!({"CFGB_TEST_AL_PUBLIC": "yes"})
        );

        env::remove_var("CFGB_TEST_AL_PUBLIC");
        env::remove_var("CFGB_TEST_AL_HIDDEN");
    }

    #[test]
    fn test_describe_only_prefixed_vars() {
        env::set_var("CFGB_TEST_DESC_LEVEL", "debug");

        let described = EnvironmentSource::with_prefix("CFGB_TEST_DESC_").describe_for_logging();
        assert_eq!(described, json!({"CFGB_TEST_DESC_LEVEL": "debug"}));

        // Without a prefix or key list nothing is dumped
        assert_eq!(EnvironmentSource::new().describe_for_logging(), json!({}));

        env::remove_var("CFGB_TEST_DESC_LEVEL");
    }

    #[test]
    fn test_describe_masks_vault_token() {
        env::set_var("CFGB_TEST_MASK_VAULT_TOKEN", "s.live-token");
        env::set_var("CFGB_TEST_MASK_VAULT_HOST", "http://vault:8200");

        let source = EnvironmentSource::with_prefix("CFGB_TEST_MASK_");
        let described = source.describe_for_logging();

        // Lookups still see the real value
        assert_eq!(source.get("vault.token"), Lookup::Found(json!("s.live-token")));
        env::remove_var("CFGB_TEST_MASK_VAULT_TOKEN");
        env::remove_var("CFGB_TEST_MASK_VAULT_HOST");

        assert_eq!(
            described,
            json!({
                "CFGB_TEST_MASK_VAULT_TOKEN": "***",
                "CFGB_TEST_MASK_VAULT_HOST": "http://vault:8200",
            })
        );
        assert!(!described.to_string().contains("s.live-token"));
    }

    #[test]
    fn test_describe_masks_extra_sensitive_keys() {
        env::set_var("CFGB_TEST_SENS_DB", "whole");
        env::set_var("CFGB_TEST_SENS_DB_PASSWORD", "pw");
        env::set_var("CFGB_TEST_SENS_DBNAME", "app");

        let source = EnvironmentSource::with_prefix("CFGB_TEST_SENS_")
            .with_keys(["db", "db.password", "dbname"])
            .with_sensitive_keys(["db"]);
        let described = source.describe_for_logging();

        env::remove_var("CFGB_TEST_SENS_DB");
        env::remove_var("CFGB_TEST_SENS_DB_PASSWORD");
        env::remove_var("CFGB_TEST_SENS_DBNAME");

        assert_eq!(
            described,
            json!({
                "CFGB_TEST_SENS_DB": "***",
                "CFGB_TEST_SENS_DB_PASSWORD": "***",
                "CFGB_TEST_SENS_DBNAME": "app",
            })
        );
    }
}
