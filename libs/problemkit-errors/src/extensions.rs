//! Size and shape limits applied to problem extensions before serialization

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::problem::is_reserved;

/// Caller-supplied veto over a single extension entry. Returning `false` drops the entry.
pub type ExtensionPredicate = Arc<dyn Fn(&str, &Value) -> bool + Send + Sync>;

/// Limits enforced by [`validate_extensions`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionValidationOptions {
    /// Entries beyond this count are removed, keeping the first ones inserted.
    pub max_extensions: usize,
    /// Longer strings are truncated to this many characters.
    pub max_string_length: usize,
    /// Deepest allowed nesting of arrays and objects inside one entry.
    pub max_depth: usize,
    #[serde(skip)]
    pub custom_validator: Option<ExtensionPredicate>,
}

impl Default for ExtensionValidationOptions {
    fn default() -> Self {
        Self {
            max_extensions: 20,
            max_string_length: 2048,
            max_depth: 2,
            custom_validator: None,
        }
    }
}

impl fmt::Debug for ExtensionValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionValidationOptions")
            .field("max_extensions", &self.max_extensions)
            .field("max_string_length", &self.max_string_length)
            .field("max_depth", &self.max_depth)
            .field("custom_validator", &self.custom_validator.is_some())
            .finish()
    }
}

impl ExtensionValidationOptions {
    #[must_use]
    pub fn with_custom_validator(mut self, predicate: ExtensionPredicate) -> Self {
        self.custom_validator = Some(predicate);
        self
    }
}

/// Enforces `options` on `extensions` in place.
///
/// Order of checks: trim to the first `max_extensions` entries, then per entry the custom
/// predicate, reserved member names, and finally the value shape. Oversized strings are
/// truncated wherever they appear; an entry nested deeper than `max_depth` is dropped whole.
pub fn validate_extensions(extensions: &mut Map<String, Value>, options: &ExtensionValidationOptions) {
    let entries = std::mem::take(extensions);
    let dropped = entries.len().saturating_sub(options.max_extensions);

    for (key, mut value) in entries.into_iter().take(options.max_extensions) {
        if let Some(predicate) = &options.custom_validator
            && !predicate(&key, &value)
        {
            tracing::debug!(key = %key, "extension vetoed by custom validator");
            continue;
        }
        if is_reserved(&key) {
            continue;
        }
        if !sanitize_value(&mut value, 0, options) {
            tracing::debug!(key = %key, max_depth = options.max_depth, "extension dropped: unsupported shape");
            continue;
        }
        extensions.insert(key, value);
    }

    if dropped > 0 {
        tracing::debug!(dropped, limit = options.max_extensions, "extensions trimmed");
    }
}

/// Returns `false` when the value must be dropped. `depth` counts enclosing collections.
fn sanitize_value(value: &mut Value, depth: usize, options: &ExtensionValidationOptions) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => {
            truncate_chars(s, options.max_string_length);
            true
        }
        Value::Array(items) => {
            depth < options.max_depth
                && items
                    .iter_mut()
                    .all(|item| sanitize_value(item, depth + 1, options))
        }
        Value::Object(map) => {
            depth < options.max_depth
                && map
                    .values_mut()
                    .all(|item| sanitize_value(item, depth + 1, options))
        }
    }
}

fn truncate_chars(s: &mut String, max_chars: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn trims_to_first_entries_in_insertion_order() {
        let mut ext = Map::new();
        for i in 0..25 {
            ext.insert(format!("k{i:02}"), json!(i));
        }
        validate_extensions(&mut ext, &ExtensionValidationOptions::default());

        assert_eq!(ext.len(), 20);
        let keys: Vec<_> = ext.keys().cloned().collect();
        let expected: Vec<_> = (0..20).map(|i| format!("k{i:02}")).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn long_strings_are_truncated_not_dropped() {
        let mut ext = map(json!({
            "note": "x".repeat(5000),
            "nested": { "inner": "é".repeat(3000) },
        }));
        validate_extensions(&mut ext, &ExtensionValidationOptions::default());

        assert_eq!(ext["note"].as_str().map(|s| s.chars().count()), Some(2048));
        assert_eq!(
            ext["nested"]["inner"].as_str().map(|s| s.chars().count()),
            Some(2048)
        );
    }

    #[test]
    fn too_deep_entries_are_dropped_whole() {
        let mut ext = map(json!({
            "deep": { "a": { "b": { "c": 1 } } },
            "ok": { "a": { "b": 1 } },
            "errors": { "amount": ["must be > 0"] },
        }));
        validate_extensions(&mut ext, &ExtensionValidationOptions::default());

        assert!(ext.get("deep").is_none());
        assert_eq!(ext["ok"], json!({ "a": { "b": 1 } }));
        assert_eq!(ext["errors"], json!({ "amount": ["must be > 0"] }));
    }

    #[test]
    fn custom_validator_and_reserved_names_drop_entries() {
        let options = ExtensionValidationOptions::default()
            .with_custom_validator(Arc::new(|key, _| !key.starts_with("internal")));
        let mut ext = map(json!({
            "internalHost": "db-01",
            "category": "Lookup",
            "traceId": "spoofed",
        }));
        validate_extensions(&mut ext, &options);

        assert_eq!(ext.len(), 1);
        assert_eq!(ext["category"], json!("Lookup"));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: ExtensionValidationOptions =
            serde_json::from_value(json!({ "max_extensions": 5 })).unwrap();
        assert_eq!(opts.max_extensions, 5);
        assert_eq!(opts.max_string_length, 2048);
        assert_eq!(opts.max_depth, 2);
        assert!(opts.custom_validator.is_none());
    }
}
