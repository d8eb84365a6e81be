//! Dotted-key resolution inside nested JSON values

use serde_json::Value;

/// Split a dotted key into its segments
pub fn key_parts(key: &str) -> std::str::Split<'_, char> {
    key.split('.')
}

/// Resolve a dotted key (`"vault.host"`) inside `root`.
///
/// Returns `None` as soon as a segment is missing or an intermediate value is
/// not an object. Absence is a normal outcome, never an error.
pub fn resolve<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key_parts(key).try_fold(root, |current, part| current.as_object()?.get(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested() {
        let data = json!({"vault": {"host": "http://vault:8200", "port": 8200}});
        assert_eq!(resolve(&data, "vault.host"), Some(&json!("http://vault:8200")));
        assert_eq!(
            resolve(&data, "vault"),
            Some(&json!({"host": "http://vault:8200", "port": 8200}))
        );
    }

    #[test]
    fn test_resolve_missing_intermediate() {
        let data = json!({"a": {"b": 0}});
        assert_eq!(resolve(&data, "c.d"), None);
        assert_eq!(resolve(&data, "a.x.y"), None);
    }

    #[test]
    fn test_resolve_through_scalar_is_absent() {
        let data = json!({"a": "scalar", "list": [1, 2]});
        assert_eq!(resolve(&data, "a.b"), None);
        assert_eq!(resolve(&data, "list.0"), None);
    }

    #[test]
    fn test_resolve_explicit_null_is_present() {
        let data = json!({"a": {"b": null}});
        assert_eq!(resolve(&data, "a.b"), Some(&Value::Null));
    }

    #[test]
    fn test_resolve_non_object_root() {
        assert_eq!(resolve(&json!(5), "a"), None);
    }
}
