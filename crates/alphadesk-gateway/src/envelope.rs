//! Response-envelope extraction for the workflow-engine proxy.
//!
//! The proxy nests the analysis result differently depending on backend
//! version: `message.message.content.content`, `message.content.content`,
//! or an array whose first element carries one of those shapes. The
//! extraction tries each path in order and falls back to the raw body, so
//! an unrecognized shape degrades to "show what we got" instead of losing
//! the result.

use serde_json::Value;

/// Pull the analysis result out of a trigger response body.
///
/// Returns `None` only for bodies with no content at all (null or empty),
/// which the resolver treats as a parse failure and defers to the
/// change-feed path.
pub fn extract_result(body: &Value) -> Option<Value> {
    if body.is_null() {
        return None;
    }

    let candidates = [
        path(body, &["message", "message", "content", "content"]).cloned(),
        path(body, &["message", "content", "content"]).cloned(),
        body.as_array()
            .and_then(|a| a.first())
            .and_then(extract_result),
    ];

    for found in candidates.into_iter().flatten() {
        if !is_empty(&found) {
            return Some(found);
        }
    }

    if is_empty(body) {
        None
    } else {
        // Raw fallback: hand the whole body through untouched.
        Some(body.clone())
    }
}

fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in keys {
        current = current.get(key)?;
    }
    Some(current)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}
