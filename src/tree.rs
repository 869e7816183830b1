//! Structural comparison and deep merge over nested JSON trees
//!
//! Every desired/observed comparison in the reconciler goes through these
//! helpers. Typed records are serialized to `serde_json::Value` first, so
//! fields this crate does not model pass through untouched.
//!
//! Diffs are shallow: a change anywhere below a top-level key reports the
//! whole subtree under that key.

use serde_json::{Map, Value};

/// Deep copy of a tree.
pub fn copy(tree: &Value) -> Value {
    tree.clone()
}

/// Deep structural equality.
///
/// Sequences compare element by element in order; mappings compare by key
/// regardless of insertion order.
pub fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| equal(value, other)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal(x, y))
        }
        _ => a == b,
    }
}

/// Merge `overlay` into `base`.
///
/// Mappings merge recursively. An explicit `null` in the overlay removes the
/// key from `base`. Anything else replaces the value in `base`. A non-mapping
/// overlay replaces `base` entirely.
pub fn merge(base: &mut Value, overlay: &Value) {
    match (base.as_object_mut(), overlay.as_object()) {
        (Some(base_obj), Some(overlay_obj)) => merge_maps(base_obj, overlay_obj),
        _ => *base = overlay.clone(),
    }
}

/// Map-level form of [`merge`].
pub fn merge_maps(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        if value.is_null() {
            base.remove(key);
            continue;
        }
        match base.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => merge(existing, value),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Top-level keys whose values differ between `a` and `b`, mapped to the
/// value in `b`. A key present in `a` but not in `b` maps to `null`.
///
/// When both sides of a changed key are mappings, keys that `b` dropped below
/// the top level are carried as `null` so that [`merge`] removes them.
pub fn diff(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut changes = Map::new();
    for (key, new_value) in b {
        match a.get(key) {
            Some(old) if equal(old, new_value) => {}
            Some(old) => {
                changes.insert(key.clone(), with_removals(old, new_value));
            }
            None => {
                changes.insert(key.clone(), new_value.clone());
            }
        }
    }
    for key in a.keys() {
        if !b.contains_key(key) {
            changes.insert(key.clone(), Value::Null);
        }
    }
    changes
}

fn with_removals(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => {
            let mut value = Map::new();
            for (key, new_child) in new {
                let child = match old.get(key) {
                    Some(old_child) => with_removals(old_child, new_child),
                    None => new_child.clone(),
                };
                value.insert(key.clone(), child);
            }
            for key in old.keys() {
                if !new.contains_key(key) {
                    value.insert(key.clone(), Value::Null);
                }
            }
            Value::Object(value)
        }
        _ => new.clone(),
    }
}
