//! Lossy JSON extraction from model output

use serde_json::Value;

/// Recover a JSON object from free-form model output
///
/// Tries the whole text first, then the span from the first `{` to the last
/// `}` (which strips code fences and surrounding commentary). Anything that
/// is not a JSON object yields `None`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
