//! Result probes: decide whether a poll response carries finished output.

use serde::Serialize;
use serde_json::Value;

use super::JobResult;

/// Describes where an agent's result endpoint puts its output.
///
/// A result is present when the body is a non-empty array whose first element
/// has a non-blank `field`, or an object whose `field` is non-blank and not the
/// `pending_sentinel` ("no output yet") value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultProbe {
    pub field: &'static str,
    pub pending_sentinel: Option<&'static str>,
}

impl ResultProbe {
    pub const fn field(field: &'static str) -> Self {
        Self {
            field,
            pending_sentinel: None,
        }
    }

    pub const fn with_sentinel(self, sentinel: &'static str) -> Self {
        Self {
            pending_sentinel: Some(sentinel),
            ..self
        }
    }

    /// Returns the result if `body` carries one. `None` means "not ready yet".
    pub fn extract(&self, body: &Value) -> Option<JobResult> {
        let value = match body {
            Value::Array(items) => items.first()?.get(self.field)?,
            Value::Object(map) => map.get(self.field)?,
            _ => return None,
        };

        if let (Some(sentinel), Value::String(text)) = (self.pending_sentinel, value) {
            if text.trim().eq_ignore_ascii_case(sentinel) {
                return None;
            }
        }

        to_result(value)
    }
}

fn to_result(value: &Value) -> Option<JobResult> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => {
            Some(structured_text(text).unwrap_or_else(|| JobResult::Text(text.clone())))
        }
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(JobResult::Structured(other.clone())),
    }
}

/// Agents often return JSON documents as a string, sometimes wrapped in a
/// markdown code fence. Those are surfaced as structured results.
fn structured_text(text: &str) -> Option<JobResult> {
    let inner = strip_json_fences(text);
    if !(inner.starts_with('{') || inner.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(inner)
        .ok()
        .map(JobResult::Structured)
}

/// Strips ```json ... ``` or ``` ... ``` code fences.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
