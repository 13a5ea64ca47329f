//! Override overlay applied on top of merged declarations

use adcsync_deployer::OverlayMerger;
use adcsync_types::Declaration;
use serde_json::Value;
use tracing::warn;

/// Deep-merges a JSON object overlay into the declaration.
///
/// Objects merge key by key; any other value in the overlay replaces the
/// base value outright.
pub struct JsonMergeOverlay;

impl OverlayMerger for JsonMergeOverlay {
    fn merge(&self, overlay: &str, base: &Declaration) -> Option<Declaration> {
        let overlay: Value = match serde_json::from_str(overlay) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Override overlay is not valid JSON");
                return None;
            }
        };

        if !overlay.is_object() {
            warn!("Override overlay must be a JSON object");
            return None;
        }

        let mut merged = base.as_value().clone();
        deep_merge(&mut merged, overlay);
        Some(Declaration::from_value(merged))
    }
}

pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                deep_merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}
