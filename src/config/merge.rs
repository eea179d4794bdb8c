//! Deep merge for configuration layers and document fragments.
//!
//! The override side always wins for scalars and for shape mismatches.
//! Mappings merge key by key; sequences under the same key are concatenated
//! (base first, then override) without deduplication.

use serde_json::Value;

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// - Both mappings: keys in overlay are merged into a copy of base, recursing
///   into nested mappings
/// - Both sequences under the same key: base items followed by overlay items
/// - Anything else (including a non-mapping at the top level): overlay verbatim
///
/// Inputs are taken by value, so caller-held copies are never modified.
///
/// # Example
/// ```
/// use serde_json::json;
/// use provision_builder::config::deep_merge;
///
/// let base = json!({
///     "network": { "hostname": "box", "dns": ["1.1.1.1"] },
///     "packages": ["curl"]
/// });
/// let overlay = json!({
///     "network": { "hostname": "node-1" },
///     "packages": ["git"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result, json!({
///     "network": { "hostname": "node-1", "dns": ["1.1.1.1"] },
///     "packages": ["curl", "git"]
/// }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                // Merge in place so existing keys keep their position.
                match base_map.get_mut(&key) {
                    Some(slot) => {
                        let base_value = slot.take();
                        *slot = merge_entry(base_value, overlay_value);
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge two values found under the same key of two mappings.
fn merge_entry(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (base @ Value::Object(_), overlay @ Value::Object(_)) => deep_merge(base, overlay),
        (Value::Array(mut base_items), Value::Array(overlay_items)) => {
            base_items.extend(overlay_items);
            Value::Array(base_items)
        }
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
///
/// Starts from an empty mapping so that an empty input yields `{}`.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values
        .into_iter()
        .fold(Value::Object(Default::default()), deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_simple_objects() {
        let base = json!({"a": 1, "b": 2});
        let overlay = json!({"b": 3, "c": 4});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_nested_objects() {
        let base = json!({
            "network": {"hostname": "localhost", "port": 8080},
            "debug": true
        });
        let overlay = json!({
            "network": {"port": 9000}
        });
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "network": {"hostname": "localhost", "port": 9000},
                "debug": true
            })
        );
    }

    #[test]
    fn test_arrays_concatenated() {
        let base = json!({"packages": ["a", "b"]});
        let overlay = json!({"packages": ["b", "c"]});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"packages": ["a", "b", "b", "c"]}));
    }

    #[test]
    fn test_nested_arrays_concatenated() {
        let base = json!({"users": {"groups": ["sudo"]}});
        let overlay = json!({"users": {"groups": ["docker"]}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"users": {"groups": ["sudo", "docker"]}}));
    }

    #[test]
    fn test_null_replaces_base() {
        let base = json!({"a": 1});
        let overlay = json!({"a": null});
        assert_eq!(deep_merge(base, overlay), json!({"a": null}));
    }

    #[test]
    fn test_top_level_non_mapping_returns_overlay() {
        assert_eq!(deep_merge(json!({"a": 1}), json!([1, 2])), json!([1, 2]));
        assert_eq!(deep_merge(json!([1]), json!([2])), json!([2]));
        assert_eq!(deep_merge(json!("x"), json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn test_empty_identities() {
        let a = json!({"k": [1, 2], "m": {"x": "y"}});
        assert_eq!(deep_merge(json!({}), a.clone()), a);
        assert_eq!(deep_merge(a.clone(), json!({})), a);
    }

    #[test]
    fn test_self_merge_of_mappings_without_lists() {
        let a = json!({"a": 1, "b": {"c": "d", "e": {"f": false}}});
        assert_eq!(deep_merge(a.clone(), a.clone()), a);
    }

    #[test]
    fn test_three_way_list_concat_keeps_input_order() {
        let a = json!({"k": [1]});
        let b = json!({"k": [2]});
        let c = json!({"k": [3]});
        let left = deep_merge(deep_merge(a.clone(), b.clone()), c.clone());
        assert_eq!(left, json!({"k": [1, 2, 3]}));
        let right = deep_merge(a, deep_merge(b, c));
        assert_eq!(right, json!({"k": [1, 2, 3]}));
    }

    #[test]
    fn test_merge_all() {
        let values = vec![json!({"a": 1}), json!({"b": [1]}), json!({"a": 3, "b": [2]})];
        let result = deep_merge_all(values);
        assert_eq!(result, json!({"a": 3, "b": [1, 2]}));
    }

    #[test]
    fn test_merge_all_empty() {
        assert_eq!(deep_merge_all(Vec::new()), json!({}));
    }

    #[test]
    fn test_overlay_replaces_primitive_with_object() {
        let base = json!({"value": 42});
        let overlay = json!({"value": {"nested": true}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": {"nested": true}}));
    }

    #[test]
    fn test_overlay_replaces_object_with_primitive() {
        let base = json!({"value": {"nested": true}});
        let overlay = json!({"value": 42});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": 42}));
    }

    #[test]
    fn test_list_vs_mapping_replaced() {
        let base = json!({"value": [1]});
        let overlay = json!({"value": {"a": 1}});
        assert_eq!(deep_merge(base, overlay), json!({"value": {"a": 1}}));
    }

    #[test]
    fn test_key_order_preserved() {
        let base = json!({"z": 1, "a": 2});
        let overlay = json!({"m": 3, "z": 4});
        let result = deep_merge(base, overlay);
        let keys: Vec<&str> = result
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(result["z"], 4);
    }
}
