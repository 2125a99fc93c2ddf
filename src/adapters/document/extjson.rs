//! Shell-flavoured JSON to BSON.
//!
//! The shell accepts bare keys, single-quoted strings and `ObjectId(...)`
//! calls. These are rewritten to strict extended JSON before parsing.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use serde_json::Value;

use super::split::split_args;
use crate::error::{PipelineError, Result};

const OBJECT_ID: &str = "ObjectId";

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Rewrites shell syntax to strict JSON: bare keys are quoted, single-quoted
/// strings become double-quoted and `ObjectId("hex")` becomes `{"$oid": "hex"}`.
pub fn relax_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = string_end(&chars, i, '"');
                out.extend(&chars[i..end]);
                i = end;
            }
            '\'' => {
                let end = string_end(&chars, i, '\'');
                out.push('"');
                let body_end = if end > i + 1 && chars[end - 1] == '\'' {
                    end - 1
                } else {
                    end
                };
                let mut j = i + 1;
                while j < body_end {
                    match chars[j] {
                        '\\' if j + 1 < body_end && chars[j + 1] == '\'' => {
                            out.push('\'');
                            j += 2;
                            continue;
                        }
                        '\\' if j + 1 < body_end => {
                            out.push('\\');
                            out.push(chars[j + 1]);
                            j += 2;
                            continue;
                        }
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                    j += 1;
                }
                out.push('"');
                i = end;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let next = next_significant(&chars, i);

                if ident == OBJECT_ID && next.map(|(_, c)| c) == Some('(') {
                    let open = next.map(|(at, _)| at).unwrap_or(i);
                    let close = chars[open..]
                        .iter()
                        .position(|&c| c == ')')
                        .map(|p| open + p)
                        .unwrap_or(chars.len());
                    let hex: String = chars[open + 1..close]
                        .iter()
                        .filter(|c| !matches!(c, '\'' | '"') && !c.is_whitespace())
                        .collect();
                    out.push_str(&format!("{{\"$oid\":\"{}\"}}", hex));
                    i = (close + 1).min(chars.len());
                } else if next.map(|(_, c)| c) == Some(':') && follows_key_position(&out) {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    out
}

/// Index one past the closing quote of the string opened at `start`, or the
/// end of input when it never closes.
fn string_end(chars: &[char], start: usize, quote: char) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        if chars[j] == '\\' {
            j += 2;
            continue;
        }
        if chars[j] == quote {
            return j + 1;
        }
        j += 1;
    }
    chars.len()
}

fn next_significant(chars: &[char], from: usize) -> Option<(usize, char)> {
    chars[from..]
        .iter()
        .enumerate()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(offset, &c)| (from + offset, c))
}

fn follows_key_position(out: &str) -> bool {
    matches!(out.trim_end().chars().last(), Some('{') | Some(','))
}

/// Parses one shell-style object into a BSON document.
///
/// A string `_id` of the form `ObjectId('hex')` is replaced by the typed id.
pub fn parse_document(input: &str) -> Result<Document> {
    let input = input.trim();
    if input == "{}" {
        return Ok(Document::new());
    }

    let relaxed = relax_json(input);
    let value: Value = serde_json::from_str(&relaxed).map_err(|e| {
        PipelineError::ParseError(format!(
            "{}: {}. Hint: are all the key-value string fields enclosed by quotes?",
            e, input
        ))
    })?;
    if !value.is_object() {
        return Err(PipelineError::ParseError(format!(
            "expected an object, got: {}",
            input
        )));
    }

    let mut document = match Bson::try_from(value) {
        Ok(Bson::Document(document)) => document,
        Ok(_) => {
            return Err(PipelineError::ParseError(format!(
                "expected an object, got: {}",
                input
            )))
        }
        Err(e) => return Err(PipelineError::ParseError(format!("{}: {}", e, input))),
    };

    replace_object_id(&mut document)?;
    Ok(document)
}

fn replace_object_id(document: &mut Document) -> Result<()> {
    let Some(Bson::String(raw)) = document.get("_id") else {
        return Ok(());
    };
    let Some(rest) = raw.strip_prefix(OBJECT_ID) else {
        return Ok(());
    };
    let hex: String = rest
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '(' | ')') && !c.is_whitespace())
        .collect();
    let oid = ObjectId::parse_str(&hex)
        .map_err(|e| PipelineError::ParseError(format!("{}: {}", e, hex)))?;
    document.insert("_id", oid);
    Ok(())
}

/// Parses a bracketed list of objects, e.g. an aggregation pipeline.
pub fn parse_document_array(input: &str) -> Result<Vec<Document>> {
    let input = input.trim();
    let inner = input
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| PipelineError::ParseError(format!("expected an array, got: {}", input)))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_args(inner)?
        .iter()
        .map(|item| parse_document(item))
        .collect()
}

/// Parses a scalar argument such as a field name, removing its quotes.
pub fn parse_string(input: &str) -> String {
    let input = input.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = input
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    input.to_string()
}
