//! jq filters over `serde_json::Value`, evaluated by jaq.
//!
//! A filter is compiled once with the core, std and JSON definitions loaded,
//! and can then be run against many inputs.

use jaq_core::load::{self, Arena, File, Loader};
use jaq_core::{data, Compiler, Ctx, Vars};
use jaq_json::{Num, Val};
use serde_json::{Number, Value};
use thiserror::Error;

type Data = data::JustLut<Val>;

#[derive(Debug, Error, PartialEq)]
pub enum JqError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("{0}")]
    Runtime(String),
}

pub struct Filter {
    inner: jaq_core::Filter<Data>,
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

impl Filter {
    pub fn parse(source: &str) -> Result<Self, JqError> {
        let defs = jaq_core::defs()
            .chain(jaq_std::defs())
            .chain(jaq_json::defs());
        let funs = jaq_core::funs()
            .chain(jaq_std::funs())
            .chain(jaq_json::funs());

        let loader = Loader::new(defs);
        let arena = Arena::default();
        let modules = loader
            .load(&arena, File { code: source, path: () })
            .map_err(|errors| JqError::Syntax(describe_load_errors(errors)))?;
        let inner: jaq_core::Filter<Data> = Compiler::default()
            .with_funs(funs)
            .compile(modules)
            .map_err(|errors| {
                let names: Vec<String> = errors
                    .into_iter()
                    .flat_map(|(_, undefined)| undefined)
                    .map(|(name, kind)| format!("undefined {} `{}`", kind.as_str(), name))
                    .collect();
                JqError::Syntax(names.join(", "))
            })?;
        Ok(Filter { inner })
    }

    /// Returns the last value the filter emits. `halt` ends the stream early
    /// and keeps whatever came before it; an error fails the whole run. A
    /// filter that emits nothing yields `null`.
    pub fn last_value(&self, input: &Value) -> Result<Value, JqError> {
        let input: Val = serde_json::from_value(input.clone())
            .map_err(|e| JqError::Runtime(e.to_string()))?;
        let ctx = Ctx::<Data>::new(&self.inner.lut, Vars::new([]));

        let mut last = Val::Null;
        for item in self.inner.id.run((ctx, input)) {
            match item {
                Ok(value) => last = value,
                Err(exn) => match exn.get_err() {
                    Ok(error) => return Err(JqError::Runtime(error.to_string())),
                    Err(exn) => match exn.get_halt() {
                        Ok(_) => break,
                        Err(_) => {
                            return Err(JqError::Runtime(
                                "filter escaped its control flow".to_string(),
                            ))
                        }
                    },
                },
            }
        }
        Ok(to_json(&last))
    }
}

fn describe_load_errors(errors: load::Errors<&str, ()>) -> String {
    let mut messages = Vec::new();
    for (_, error) in errors {
        match error {
            load::Error::Io(failures) => {
                messages.extend(failures.into_iter().map(|(path, e)| format!("{}: {}", path, e)))
            }
            load::Error::Lex(failures) => messages.extend(
                failures
                    .into_iter()
                    .map(|(expected, found)| format!("expected {:?} near `{}`", expected, snippet(found))),
            ),
            load::Error::Parse(failures) => messages.extend(
                failures
                    .into_iter()
                    .map(|(expected, found)| format!("expected {} near `{}`", expected.as_str(), snippet(found))),
            ),
        }
    }
    messages.join("; ")
}

fn snippet(text: &str) -> String {
    text.chars().take(20).collect()
}

/// Converts a jaq value back to JSON. Byte strings are read as lossy UTF-8
/// and non-string object keys are rendered as compact JSON.
fn to_json(value: &Val) -> Value {
    match value {
        Val::Null => Value::Null,
        Val::Bool(b) => Value::Bool(*b),
        Val::Num(n) => number_to_json(n),
        Val::TStr(s) | Val::BStr(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        Val::Arr(items) => Value::Array(items.iter().map(to_json).collect()),
        Val::Obj(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (key_to_string(k), to_json(v)))
                .collect(),
        ),
    }
}

fn key_to_string(key: &Val) -> String {
    match key {
        Val::TStr(s) => String::from_utf8_lossy(s).into_owned(),
        other => to_json(other).to_string(),
    }
}

/// NaN and infinities become `null`, as jq prints them.
fn number_to_json(n: &Num) -> Value {
    match n {
        Num::Int(i) => Value::from(*i),
        Num::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        other => {
            let text = other.to_string();
            text.parse::<Number>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
                .map_or(Value::Null, Value::Number)
        }
    }
}

/// Renders a value for splicing into query text: strings lose their quotes,
/// whole numbers print without a fractional part, and everything else is
/// compact JSON.
pub fn to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
