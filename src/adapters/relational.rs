//! Relational adapter: SQL text in, rows of inferred scalars out.

use serde_json::{json, Map, Value};

use crate::db::{SqlDriver, TextRows};
use crate::error::{PipelineError, Result};
use crate::pipeline::QueryKind;

const LIST_TABLES: &str = "SELECT table_name FROM information_schema.tables \
WHERE table_schema = 'public' AND table_type = 'BASE TABLE'";

/// `update`, `delete` and `insert` are writes; everything else reads.
pub fn classify(text: &str) -> QueryKind {
    let first = text.split_whitespace().next().unwrap_or("");
    match first.to_ascii_lowercase().as_str() {
        "update" | "delete" | "insert" => QueryKind::Write,
        _ => QueryKind::Read,
    }
}

pub fn is_admin(text: &str) -> bool {
    text.trim_start().starts_with("\\d")
}

/// Integer, then float, then boolean, then the text itself.
pub fn infer_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Value::Bool(true),
        "false" | "0" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Builds the row objects, keeping at most `max_rows` rows and the server's
/// column order.
pub fn rows_to_json(result: TextRows, max_rows: usize) -> Value {
    let total = result.rows.len();
    if total > max_rows {
        tracing::debug!(total, kept = max_rows, "row limit reached, dropping rows");
    }
    let rows = result
        .rows
        .into_iter()
        .take(max_rows)
        .map(|cells| {
            let row: Map<String, Value> = result
                .columns
                .iter()
                .zip(cells)
                .map(|(column, cell)| {
                    let value = match cell {
                        Some(raw) => infer_value(&raw),
                        None => Value::String("NULL".to_string()),
                    };
                    (column.clone(), value)
                })
                .collect();
            Value::Object(row)
        })
        .collect();
    Value::Array(rows)
}

pub async fn read(driver: &dyn SqlDriver, uri: &str, sql: &str, max_rows: usize) -> Result<Value> {
    let result = driver
        .query(uri, sql)
        .await
        .map_err(|e| PipelineError::backend(sql, e))?;
    Ok(rows_to_json(result, max_rows))
}

pub async fn write(driver: &dyn SqlDriver, uri: &str, sql: &str) -> Result<Value> {
    let affected = driver
        .execute(uri, sql)
        .await
        .map_err(|e| PipelineError::backend(sql, e))?;
    Ok(json!({ "rows_affected": affected }))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `\dt` lists tables; `\d <table>` describes one.
pub async fn admin(driver: &dyn SqlDriver, uri: &str, text: &str, max_rows: usize) -> Result<Value> {
    let text = text.trim();
    if text == "\\dt" {
        return read(driver, uri, LIST_TABLES, max_rows).await;
    }

    let table = text
        .strip_prefix("\\d ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PipelineError::ParseError(format!("invalid admin command '{}'", text)))?;
    let table = quote_literal(table);

    let columns = read(
        driver,
        uri,
        &format!(
            "SELECT column_name, data_type, is_nullable, column_default \
             FROM information_schema.columns WHERE table_name = {}",
            table
        ),
        max_rows,
    )
    .await?;
    let indices = read(
        driver,
        uri,
        &format!(
            "SELECT indexname, indexdef FROM pg_indexes WHERE tablename = {}",
            table
        ),
        max_rows,
    )
    .await?;
    let constraints = read(
        driver,
        uri,
        &format!(
            "SELECT tc.constraint_name, tc.constraint_type, ccu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.constraint_column_usage ccu \
             ON tc.constraint_name = ccu.constraint_name \
             WHERE tc.table_name = {}",
            table
        ),
        max_rows,
    )
    .await?;

    Ok(json!({
        "column_definitions": columns,
        "indices": indices,
        "constraints": constraints,
    }))
}

pub async fn execute(
    driver: &dyn SqlDriver,
    uri: &str,
    text: &str,
    kind: QueryKind,
    max_rows: usize,
) -> Result<Value> {
    match kind {
        QueryKind::Write => write(driver, uri, text).await,
        _ if is_admin(text) => admin(driver, uri, text, max_rows).await,
        _ => read(driver, uri, text, max_rows).await,
    }
}
