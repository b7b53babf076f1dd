//! Deep merge of configuration values.
//!
//! Mappings combine key by key, recursively. Every other value present in the
//! overlay (scalars, sequences, `null`) replaces the target wholesale. Keys the
//! overlay does not mention are left alone.

use serde_json::Value;

/// Merge `overlay` into `target` in place.
pub fn deep_merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}
