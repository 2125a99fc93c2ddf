use serde_json::Value;

use crate::db::KeyValueDriver;
use crate::error::{PipelineError, Result};

/// Splits command text into the command name and its arguments.
pub fn tokenize(text: &str) -> Result<(String, Vec<String>)> {
    let mut parts = text.split_whitespace().map(str::to_string);
    let name = parts.next().ok_or(PipelineError::EmptyQuery)?;
    Ok((name, parts.collect()))
}

pub async fn execute(driver: &dyn KeyValueDriver, uri: &str, text: &str) -> Result<Value> {
    let (name, args) = tokenize(text)?;
    driver
        .command(uri, &name, &args)
        .await
        .map_err(|e| PipelineError::backend(text, e))
}
