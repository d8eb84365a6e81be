//! In-memory object source

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::traits::{Lookup, Source};
use crate::path;

/// Source backed by a nested JSON object
///
/// Keys listed with [`ObjectSource::set_not_available`] resolve to
/// [`Lookup::Blocked`], as does every key below them.
///
/// # Example
///
/// ```
/// use cfgbroker_core::source::{Lookup, ObjectSource, Source};
/// use serde_json::json;
///
/// let source = ObjectSource::new(json!({"vault": {"host": "http://localhost:8200"}}));
/// assert_eq!(source.get("vault.host"), Lookup::Found(json!("http://localhost:8200")));
/// assert_eq!(source.get("vault.port"), Lookup::Absent);
/// ```
#[derive(Debug, Clone)]
pub struct ObjectSource {
    name: String,
    data: Value,
    blocked: BTreeSet<String>,
}

impl ObjectSource {
    /// Create a source over `data`
    pub fn new(data: Value) -> Self {
        Self::with_name("object", data)
    }

    /// Create a source with a custom name (shown in logs)
    pub fn with_name(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            blocked: BTreeSet::new(),
        }
    }

    /// Create an empty source
    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    /// Mark a key as existing but unavailable
    pub fn set_not_available(&mut self, key: impl Into<String>) {
        self.blocked.insert(key.into());
    }

    /// Keys marked unavailable
    pub fn blocked_keys(&self) -> impl Iterator<Item = &str> {
        self.blocked.iter().map(String::as_str)
    }

    fn is_blocked(&self, key: &str) -> bool {
        self.blocked.iter().any(|blocked| {
            key == blocked
                || key
                    .strip_prefix(blocked.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

impl Default for ObjectSource {
    fn default() -> Self {
        Self::empty()
    }
}

impl Source for ObjectSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Lookup {
        if self.is_blocked(key) {
            return Lookup::Blocked;
        }
        path::resolve(&self.data, key).into()
    }

    fn describe_for_logging(&self) -> Value {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_source_get() {
        let source = ObjectSource::new(json!({"a": {"b": "c", "n": null}}));
        assert_eq!(source.name(), "object");
        assert_eq!(source.get("a.b"), Lookup::Found(json!("c")));
        assert_eq!(source.get("a.n"), Lookup::Found(Value::Null));
        assert_eq!(source.get("a"), Lookup::Found(json!({"b": "c", "n": null})));
        assert_eq!(source.get("a.missing"), Lookup::Absent);
        assert_eq!(source.get("c.d"), Lookup::Absent);
    }

    #[test]
    fn test_not_available_keys() {
        let mut source = ObjectSource::new(json!({"allowed": {"user": "admin"}}));
        source.set_not_available("secret");

        assert_eq!(source.get("secret"), Lookup::Blocked);
        assert_eq!(source.get("secret.password"), Lookup::Blocked);
        assert_eq!(source.get("secretive"), Lookup::Absent);
        assert_eq!(source.get("allowed.user"), Lookup::Found(json!("admin")));
        assert_eq!(source.blocked_keys().collect::<Vec<_>>(), vec!["secret"]);
    }

    #[test]
    fn test_describe_returns_data_verbatim() {
        let data = json!({"db": {"password": "hunter2"}});
        let source = ObjectSource::new(data.clone());
        assert_eq!(source.describe_for_logging(), data);
    }

    #[tokio::test]
    async fn test_initialize_is_noop() {
        let mut source = ObjectSource::empty();
        source.initialize().await.unwrap();
        assert_eq!(source.get("anything"), Lookup::Absent);
    }
}
