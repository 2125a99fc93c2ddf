use serde_json::Value;

use crate::error::Result;
use crate::pipeline::{decode_subject, evaluate};

/// Applies the expression directly to the previous stage's payload.
pub fn execute(expr: &str, previous: &[u8]) -> Result<Value> {
    let subject = decode_subject(previous)?;
    evaluate(expr, &subject)
}
