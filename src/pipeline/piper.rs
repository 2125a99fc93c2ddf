//! Splices the previous stage's JSON into `{{ expr }}` placeholders.

use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::jq::{self, Filter};

/// Decodes a stage payload. Only arrays and objects are accepted.
pub fn decode_subject(payload: &[u8]) -> Result<Value> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(value @ (Value::Array(_) | Value::Object(_))) => Ok(value),
        Ok(other) => Err(PipelineError::InvalidJSON(format!(
            "expected an array or object, got {}",
            other
        ))),
        Err(e) => Err(PipelineError::InvalidJSON(e.to_string())),
    }
}

/// Runs `expr` against `subject` and keeps the last emitted value.
pub fn evaluate(expr: &str, subject: &Value) -> Result<Value> {
    let filter = Filter::parse(expr).map_err(|e| PipelineError::QueryEvalError(e.to_string()))?;
    filter
        .last_value(subject)
        .map_err(|e| PipelineError::QueryEvalError(e.to_string()))
}

/// A `{{ ... }}` occurrence: byte range of the whole marker plus its inner text.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder<'a> {
    pub start: usize,
    pub end: usize,
    pub expr: &'a str,
}

/// Finds the first placeholder at or after byte offset `from`. The inner text
/// must be non-empty and free of braces.
pub fn find_placeholder(text: &str, from: usize) -> Option<Placeholder<'_>> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            let inner_start = i + 2;
            let mut j = inner_start;
            while j < bytes.len() && bytes[j] != b'{' && bytes[j] != b'}' {
                j += 1;
            }
            let closes = j + 1 < bytes.len() && bytes[j] == b'}' && bytes[j + 1] == b'}';
            if closes && j > inner_start {
                return Some(Placeholder {
                    start: i,
                    end: j + 2,
                    expr: &text[inner_start..j],
                });
            }
        }
        i += 1;
    }
    None
}

/// Replaces every placeholder in `text`, left to right, with the stringified
/// result of its expression evaluated against `payload`.
pub fn pipe_data(text: &str, payload: &[u8]) -> Result<String> {
    let subject = decode_subject(payload)?;
    let mut out = text.to_string();
    let mut cursor = 0;

    while let Some(placeholder) = find_placeholder(&out, cursor) {
        let value = evaluate(placeholder.expr, &subject)?;
        let replacement = jq::to_plain_string(&value);
        let (start, end) = (placeholder.start, placeholder.end);
        out.replace_range(start..end, &replacement);
        cursor = start + replacement.len();
    }

    Ok(out)
}
