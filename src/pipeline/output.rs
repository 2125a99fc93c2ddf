use serde_json::{json, Map, Value};

use crate::error::{PipelineError, Result};

use super::executor::{RunOutcome, StageRecord};

/// Indents a payload with two spaces. An empty payload renders as "".
pub fn pretty(payload: &[u8]) -> Result<String> {
    if payload.is_empty() {
        return Ok(String::new());
    }
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| PipelineError::InvalidJSON(e.to_string()))?;
    serde_json::to_string_pretty(&value).map_err(|e| PipelineError::InvalidJSON(e.to_string()))
}

fn stage_entry(record: &StageRecord) -> Result<Value> {
    let mut entry = Map::new();
    entry.insert(
        "stage".to_string(),
        json!({
            "index": record.index,
            "connection_type": record.conn_type,
            "uri": record.uri,
            "query": record.query,
            "kind": record.kind,
            "elapsed_ms": record.elapsed_ms as u64,
        }),
    );
    if !record.payload.is_empty() {
        let result: Value = serde_json::from_slice(&record.payload)
            .map_err(|e| PipelineError::InvalidJSON(e.to_string()))?;
        entry.insert("result".to_string(), result);
    }
    Ok(Value::Object(entry))
}

/// A comment line followed by every stage's metadata and result.
pub fn debug_trace(records: &[StageRecord]) -> Result<String> {
    let entries = records.iter().map(stage_entry).collect::<Result<Vec<_>>>()?;
    let body = serde_json::to_string_pretty(&Value::Array(entries))
        .map_err(|e| PipelineError::InvalidJSON(e.to_string()))?;
    Ok(format!("// debug: {} stage(s)\n{}", records.len(), body))
}

pub fn render(outcome: &RunOutcome, debug: bool) -> Result<String> {
    if debug {
        debug_trace(&outcome.records)
    } else {
        pretty(&outcome.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ConnType, QueryKind};

    fn record(index: usize, payload: &[u8]) -> StageRecord {
        StageRecord {
            index,
            conn_type: ConnType::Relational,
            uri: "postgresql://u:****@h/db".to_string(),
            query: "select 1".to_string(),
            kind: QueryKind::Read,
            elapsed_ms: 3,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_pretty_indents_two_spaces() {
        assert_eq!(pretty(br#"[{"a":1}]"#).unwrap(), "[\n  {\n    \"a\": 1\n  }\n]");
    }

    #[test]
    fn test_pretty_keeps_key_order() {
        assert_eq!(pretty(br#"{"b":1,"a":2}"#).unwrap(), "{\n  \"b\": 1,\n  \"a\": 2\n}");
    }

    #[test]
    fn test_pretty_empty_payload() {
        assert_eq!(pretty(b"").unwrap(), "");
    }

    #[test]
    fn test_render_normal_mode_shows_only_final_payload() {
        let outcome = RunOutcome {
            payload: br#"{"x":1}"#.to_vec(),
            records: vec![record(0, br#"[{"y":2}]"#), record(1, br#"{"x":1}"#)],
        };
        assert_eq!(render(&outcome, false).unwrap(), "{\n  \"x\": 1\n}");
    }

    #[test]
    fn test_debug_trace() {
        let outcome = RunOutcome {
            payload: Vec::new(),
            records: vec![record(0, br#"[{"id":1}]"#), record(1, b"")],
        };
        let out = render(&outcome, true).unwrap();
        let (header, body) = out.split_once('\n').unwrap();
        assert_eq!(header, "// debug: 2 stage(s)");

        let entries: Value = serde_json::from_str(body).unwrap();
        assert_eq!(entries[0]["stage"]["connection_type"], "relational");
        assert_eq!(entries[0]["stage"]["kind"], "read");
        assert_eq!(entries[0]["stage"]["uri"], "postgresql://u:****@h/db");
        assert_eq!(entries[0]["result"], json!([{"id": 1}]));
        assert!(entries[1].get("result").is_none());
    }
}
