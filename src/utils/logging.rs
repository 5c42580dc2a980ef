use serde::Serialize;
use tracing::Level;

/// Hands `value` to `emit` as indented JSON, only when DEBUG is enabled.
pub(crate) fn with_pretty_json_debug<T, F>(value: &T, emit: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }

    match serde_json::to_string_pretty(value) {
        Ok(json) => emit(&json),
        Err(e) => emit(&format!("<unserializable: {e}>")),
    }
}
