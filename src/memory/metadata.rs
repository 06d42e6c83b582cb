// src/memory/metadata.rs
// Typed path API over the nested-JSON metadata maps, replacing
// stringly-typed `jsonb_set` path builders.

use serde_json::{Map, Value};

/// A path into a nested metadata map, e.g. `["system", "entities"]`.
#[derive(Debug, Clone)]
pub struct MetadataPath(pub Vec<String>);

impl MetadataPath {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn top_level(&self) -> Option<&str> {
        self.0.first().map(|s| s.as_str())
    }
}

/// Merge semantics:
/// - a nested mapping is merged recursively
/// - a leaf value in `incoming` overwrites the existing leaf
/// - a leaf value of explicit `null` deletes the existing path
/// - missing intermediate mappings are created
pub fn merge(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Object(existing_map), Value::Object(incoming_map)) => {
            let mut merged = existing_map.clone();
            for (key, incoming_value) in incoming_map {
                match incoming_value {
                    Value::Null => {
                        merged.remove(key);
                    }
                    Value::Object(_) => {
                        let child_existing = merged
                            .get(key)
                            .cloned()
                            .unwrap_or_else(|| Value::Object(Map::new()));
                        merged.insert(key.clone(), merge(&child_existing, incoming_value));
                    }
                    leaf => {
                        merged.insert(key.clone(), leaf.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        // Incoming is not an object (or existing isn't) — incoming wins
        // wholesale, matching "a leaf value in the incoming map overwrites
        // the existing leaf".
        (_, incoming) => incoming.clone(),
    }
}

/// Drops the entire top-level `system` sub-tree from an incoming update,
/// for non-privileged callers.
pub fn strip_system(incoming: &Value) -> Value {
    match incoming {
        Value::Object(map) => {
            let mut stripped = map.clone();
            stripped.remove("system");
            Value::Object(stripped)
        }
        other => other.clone(),
    }
}

/// Set a single leaf value at `path`, creating missing intermediate maps.
pub fn set_path(root: &mut Value, path: &MetadataPath, value: Value) {
    let mut cursor = root;
    let segments = &path.0;
    if segments.is_empty() {
        return;
    }
    for segment in &segments[..segments.len() - 1] {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let map = cursor.as_object_mut().expect("just ensured object");
        cursor = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    let map = cursor.as_object_mut().expect("just ensured object");
    let last = segments.last().expect("checked non-empty above");
    map.insert(last.clone(), value);
}

/// Remove the leaf at `path`, if present.
pub fn remove_path(root: &mut Value, path: &MetadataPath) {
    let segments = &path.0;
    if segments.is_empty() {
        return;
    }
    let mut cursor = root;
    for segment in &segments[..segments.len() - 1] {
        match cursor.get_mut(segment) {
            Some(next) => cursor = next,
            None => return,
        }
    }
    if let Some(map) = cursor.as_object_mut() {
        map.remove(segments.last().expect("checked non-empty above"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merging_empty_into_existing_is_identity() {
        let existing = json!({"a": 1, "b": {"c": 2}});
        let merged = merge(&existing, &json!({}));
        assert_eq!(merged, existing);
    }

    #[test]
    fn merging_existing_into_empty_yields_existing() {
        let existing = json!({"a": 1, "b": {"c": 2}});
        let merged = merge(&json!({}), &existing);
        assert_eq!(merged, existing);
    }

    #[test]
    fn null_leaf_deletes_path() {
        let existing = json!({"a": 1, "b": 2});
        let merged = merge(&existing, &json!({"a": null}));
        assert_eq!(merged, json!({"b": 2}));
    }

    #[test]
    fn nested_maps_merge_recursively() {
        let existing = json!({"system": {"x": 1, "y": 2}});
        let incoming = json!({"system": {"y": 3, "z": 4}});
        let merged = merge(&existing, &incoming);
        assert_eq!(merged, json!({"system": {"x": 1, "y": 3, "z": 4}}));
    }

    #[test]
    fn disjoint_key_merges_are_associative() {
        let base = json!({});
        let left = merge(&merge(&base, &json!({"a": 1})), &json!({"b": 2}));
        let right = merge(&base, &merge(&json!({"a": 1}), &json!({"b": 2})));
        assert_eq!(left, right);
    }

    #[test]
    fn strip_system_removes_top_level_only() {
        let incoming = json!({"system": {"x": 1}, "other": 2});
        let stripped = strip_system(&incoming);
        assert_eq!(stripped, json!({"other": 2}));
    }

    #[test]
    fn set_path_creates_missing_intermediates() {
        let mut root = json!({});
        set_path(&mut root, &MetadataPath::new(["system", "entities"]), json!(["a", "b"]));
        assert_eq!(root, json!({"system": {"entities": ["a", "b"]}}));
    }

    #[test]
    fn remove_path_drops_leaf() {
        let mut root = json!({"system": {"entities": ["a"], "intent": "x"}});
        remove_path(&mut root, &MetadataPath::new(["system", "intent"]));
        assert_eq!(root, json!({"system": {"entities": ["a"]}}));
    }
}
