//! Schema-validated decoding of LLM text output.
//!
//! Models frequently wrap JSON in markdown fences or add prose around it.
//! [`decode_json_block`] extracts the first JSON object or array from the
//! raw text and decodes it into a typed value; any failure yields `None` so
//! callers can apply their documented default-and-continue behavior instead
//! of propagating a parse error.

use serde::de::DeserializeOwned;

/// Extract and decode the first JSON value found in raw LLM output.
pub fn decode_json_block<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let stripped = strip_fences(raw);

    // Fast path: the whole thing is valid JSON.
    if let Ok(value) = serde_json::from_str::<T>(stripped.trim()) {
        return Some(value);
    }

    // Otherwise locate the outermost object or array.
    for (open, close) in [('{', '}'), ('[', ']')] {
        let (Some(start), Some(end)) = (stripped.find(open), stripped.rfind(close)) else {
            continue;
        };
        if end > start {
            if let Ok(value) = serde_json::from_str::<T>(&stripped[start..=end]) {
                return Some(value);
            }
        }
    }
    None
}

/// Remove markdown code fences, keeping the fenced body.
fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }
    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}
