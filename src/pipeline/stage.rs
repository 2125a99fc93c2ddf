use serde::Serialize;
use std::fmt;

use crate::error::{PipelineError, Result};

/// Label that routes a stage to the local JSON transform. It never needs a
/// registry entry.
pub const TRANSFORM_LABEL: &str = "jq";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnType {
    Relational,
    DocumentStore,
    KeyValue,
    LocalTransform,
}

impl fmt::Display for ConnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnType::Relational => write!(f, "relational"),
            ConnType::DocumentStore => write!(f, "document_store"),
            ConnType::KeyValue => write!(f, "key_value"),
            ConnType::LocalTransform => write!(f, "local_transform"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Read,
    Write,
    /// Sent to the store as-is; the store decides what it does.
    Command,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Read => write!(f, "read"),
            QueryKind::Write => write!(f, "write"),
            QueryKind::Command => write!(f, "command"),
        }
    }
}

/// Decides the backend for a URI from its scheme.
pub fn classify_uri(uri: &str) -> Result<ConnType> {
    let scheme = uri.split_once("://").map(|(s, _)| s).unwrap_or("");
    let scheme = scheme.to_ascii_lowercase();
    if scheme.contains("postgres") {
        Ok(ConnType::Relational)
    } else if scheme.contains("mongodb") {
        Ok(ConnType::DocumentStore)
    } else if scheme.contains("redis") {
        Ok(ConnType::KeyValue)
    } else {
        Err(PipelineError::UnknownConnectionType(uri.to_string()))
    }
}

/// One `label> query` segment bound to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStage {
    pub uri: String,
    pub conn_type: ConnType,
    pub text: String,
}

impl QueryStage {
    pub fn new(uri: impl Into<String>, conn_type: ConnType, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            conn_type,
            text: text.into(),
        }
    }

    pub fn transform(text: impl Into<String>) -> Self {
        Self::new(String::new(), ConnType::LocalTransform, text)
    }

    /// The URI with any password replaced, safe to print.
    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.uri)
    }
}

pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let Some(at) = authority.rfind('@') else {
        return uri.to_string();
    };
    let userinfo = &authority[..at];
    let Some((user, _)) = userinfo.split_once(':') else {
        return uri.to_string();
    };
    format!("{}://{}:****{}", scheme, user, &rest[at..])
}
