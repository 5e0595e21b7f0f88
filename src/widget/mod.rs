//! Widget payload extraction
//!
//! The backend sometimes hands back the `{template, payload}` envelope buried
//! under a `workflow_widget_json` key, and anything on the way down may have
//! been JSON-encoded into a string one or more times. [`extract_widget`]
//! peels those layers and returns the first envelope found.
//!
//! Nothing here fails loudly: every parse error or shape mismatch collapses
//! to `None`.

use serde_json::Value;

use crate::conversation::Widget;

/// Key under which the backend nests the widget envelope
pub const WIDGET_KEY: &str = "workflow_widget_json";

/// Maximum nesting depth walked before giving up on a branch
const MAX_DEPTH: usize = 64;

/// Maximum number of string-encoding layers peeled off a single value
const MAX_DECODE_LAYERS: usize = 16;

/// Locate the widget envelope inside an arbitrary string.
pub fn extract_widget(input: &str) -> Option<Widget> {
    let root = decode_layers(input)?;
    find_widget(&root, 0)
}

/// Parse `input` as JSON, then keep parsing while the result is still a
/// string. A failed re-parse keeps the last good value.
fn decode_layers(input: &str) -> Option<Value> {
    let mut value: Value = serde_json::from_str(input).ok()?;

    for _ in 0..MAX_DECODE_LAYERS {
        let Value::String(inner) = &value else {
            break;
        };
        match serde_json::from_str::<Value>(inner) {
            Ok(parsed) => value = parsed,
            Err(_) => break,
        }
    }

    Some(value)
}

fn find_widget(value: &Value, depth: usize) -> Option<Widget> {
    if depth > MAX_DEPTH {
        tracing::debug!("Widget search exceeded depth {}", MAX_DEPTH);
        return None;
    }

    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(WIDGET_KEY).and_then(widget_from_entry) {
                return Some(found);
            }
            map.values().find_map(|child| descend(child, depth))
        }
        Value::Array(items) => items.iter().find_map(|child| descend(child, depth)),
        _ => None,
    }
}

/// Step into a child of an object or array. Strings only count when they
/// parse as JSON.
fn descend(child: &Value, depth: usize) -> Option<Widget> {
    match child {
        Value::String(raw) => {
            let parsed = decode_layers(raw)?;
            find_widget(&parsed, depth + 1)
        }
        Value::Object(_) | Value::Array(_) => find_widget(child, depth + 1),
        _ => None,
    }
}

/// Resolve the value stored under the widget key.
fn widget_from_entry(entry: &Value) -> Option<Widget> {
    match entry {
        Value::String(raw) => decode_layers(raw).as_ref().and_then(Widget::from_value),
        Value::Object(_) => Widget::from_value(entry),
        _ => None,
    }
}
