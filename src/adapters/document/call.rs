//! Parsing of `db.<collection>.<method>(<args>)[.<cursor>(<arg>)]*` and
//! `show <subject>`.

use crate::error::{PipelineError, Result};

/// A chained cursor modifier such as `.limit(5)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorCall {
    pub name: String,
    pub arg: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellCall {
    pub collection: String,
    pub method: String,
    /// Raw text between the method's parentheses.
    pub args: String,
    pub cursor: Vec<CursorCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentQuery {
    Show(String),
    Call(ShellCall),
}

fn parse_error(text: &str) -> PipelineError {
    PipelineError::ParseError(format!("invalid document query: '{}'", text))
}

/// Splits off a `show <subject>` admin command.
pub fn show_subject(text: &str) -> Option<&str> {
    let rest = text.trim().strip_prefix("show")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

/// Returns the method name of a `db.x.method(...)` call without parsing the
/// arguments.
pub fn method_name(text: &str) -> Option<&str> {
    let rest = text.trim().strip_prefix("db.")?;
    let open = rest.find('(')?;
    let head = &rest[..open];
    let dot = head.rfind('.')?;
    let method = head[dot + 1..].trim();
    (!method.is_empty() && dot > 0).then_some(method)
}

/// Byte index of the `)` matching the `(` at `open`. Quoted text is skipped.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_query(text: &str) -> Result<DocumentQuery> {
    let trimmed = text.trim().trim_end_matches(';').trim_end();
    if let Some(subject) = show_subject(trimmed) {
        return Ok(DocumentQuery::Show(subject.to_string()));
    }

    let rest = trimmed.strip_prefix("db.").ok_or_else(|| parse_error(text))?;
    let open = rest.find('(').ok_or_else(|| parse_error(text))?;
    let head = &rest[..open];
    let dot = head.rfind('.').ok_or_else(|| parse_error(text))?;
    let collection = head[..dot].trim();
    let method = head[dot + 1..].trim();
    if collection.is_empty() || method.is_empty() {
        return Err(parse_error(text));
    }

    let close = matching_paren(rest, open).ok_or_else(|| {
        PipelineError::ParseError(format!("unbalanced parentheses in '{}'", text))
    })?;
    let args = rest[open + 1..close].trim().to_string();
    let cursor = parse_cursor_chain(&rest[close + 1..])?;

    Ok(DocumentQuery::Call(ShellCall {
        collection: collection.to_string(),
        method: method.to_string(),
        args,
        cursor,
    }))
}

/// Parses `.name(arg).name(arg)...`; an empty chain is valid.
pub fn parse_cursor_chain(chain: &str) -> Result<Vec<CursorCall>> {
    let mut calls = Vec::new();
    let mut rest = chain.trim();

    while !rest.is_empty() {
        let after_dot = rest.strip_prefix('.').ok_or_else(|| {
            PipelineError::ParseError(format!("invalid cursor options: '{}'", chain))
        })?;
        let open = after_dot.find('(').ok_or_else(|| {
            PipelineError::ParseError(format!("invalid cursor options: '{}'", chain))
        })?;
        let name = after_dot[..open].trim();
        if name.is_empty() {
            return Err(PipelineError::ParseError(format!(
                "invalid cursor options: '{}'",
                chain
            )));
        }
        let close = matching_paren(after_dot, open).ok_or_else(|| {
            PipelineError::ParseError(format!("unbalanced parentheses in '{}'", chain))
        })?;
        calls.push(CursorCall {
            name: name.to_string(),
            arg: after_dot[open + 1..close].trim().to_string(),
        });
        rest = after_dot[close + 1..].trim_start();
    }

    Ok(calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(text: &str) -> ShellCall {
        match parse_query(text).unwrap() {
            DocumentQuery::Call(call) => call,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_call() {
        let parsed = call(r#"db.users.find({"age": {"$gt": 18}})"#);
        assert_eq!(parsed.collection, "users");
        assert_eq!(parsed.method, "find");
        assert_eq!(parsed.args, r#"{"age": {"$gt": 18}}"#);
        assert!(parsed.cursor.is_empty());
    }

    #[test]
    fn test_parse_dotted_collection() {
        let parsed = call("db.audit.events.countDocuments({})");
        assert_eq!(parsed.collection, "audit.events");
        assert_eq!(parsed.method, "countDocuments");
    }

    #[test]
    fn test_parse_cursor_chain() {
        let parsed = call(r#"db.users.find({}).sort({"name": 1}).limit(5);"#);
        assert_eq!(
            parsed.cursor,
            vec![
                CursorCall {
                    name: "sort".to_string(),
                    arg: r#"{"name": 1}"#.to_string()
                },
                CursorCall {
                    name: "limit".to_string(),
                    arg: "5".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parens_inside_strings() {
        let parsed = call(r#"db.notes.find({"text": "a (b) )"}).limit(1)"#);
        assert_eq!(parsed.args, r#"{"text": "a (b) )"}"#);
        assert_eq!(parsed.cursor.len(), 1);
    }

    #[test]
    fn test_parse_show() {
        assert_eq!(
            parse_query("show collections").unwrap(),
            DocumentQuery::Show("collections".to_string())
        );
        assert_eq!(show_subject("showcase"), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_query("users.find({})").is_err());
        assert!(parse_query("db.find({})").is_err());
        assert!(parse_query("db.users.find({}").is_err());
        assert!(parse_query("db.users.find({}) limit(5)").is_err());
        assert!(parse_query("db.users.find({}).limit").is_err());
    }

    #[test]
    fn test_method_name() {
        assert_eq!(method_name("db.users.insertOne({})"), Some("insertOne"));
        assert_eq!(method_name("db.a.b.find()"), Some("find"));
        assert_eq!(method_name("show collections"), None);
        assert_eq!(method_name("db.find()"), None);
    }
}
