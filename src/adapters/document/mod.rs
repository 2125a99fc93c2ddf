//! Document-store adapter: shell-style calls to driver operations.

mod call;
mod extjson;
mod methods;
mod split;

use serde_json::Value;

use crate::db::{DocumentDriver, DocumentOp};
use crate::error::{PipelineError, Result};
use crate::pipeline::QueryKind;

pub use call::{parse_query, CursorCall, DocumentQuery, ShellCall};
pub use extjson::{parse_document, parse_document_array, relax_json};
pub use methods::{READ_METHODS, WRITE_METHODS};
pub use split::split_args;

/// `show ...` is always a read; otherwise the method name decides. `None`
/// means neither table knows the method.
pub fn classify(text: &str) -> Option<QueryKind> {
    if call::show_subject(text).is_some() {
        return Some(QueryKind::Read);
    }
    let method = call::method_name(text)?;
    if methods::lookup(READ_METHODS, method).is_some() {
        Some(QueryKind::Read)
    } else if methods::lookup(WRITE_METHODS, method).is_some() {
        Some(QueryKind::Write)
    } else {
        None
    }
}

/// Turns query text into the operation for `kind`.
pub fn build_op(text: &str, kind: QueryKind, max_rows: usize) -> Result<DocumentOp> {
    match parse_query(text)? {
        DocumentQuery::Show(subject) => match (kind, subject.as_str()) {
            (QueryKind::Read, "collections") => Ok(DocumentOp::ListCollections),
            _ => Err(PipelineError::UnsupportedMethod(format!("show {}", subject))),
        },
        DocumentQuery::Call(call) => {
            let table = match kind {
                QueryKind::Read => READ_METHODS,
                QueryKind::Write => WRITE_METHODS,
                QueryKind::Command => {
                    return Err(PipelineError::UnsupportedMethod(call.method.clone()))
                }
            };
            let builder = methods::lookup(table, &call.method)
                .ok_or_else(|| PipelineError::UnsupportedMethod(call.method.clone()))?;
            builder(&call, max_rows)
        }
    }
}

pub async fn execute(
    driver: &dyn DocumentDriver,
    uri: &str,
    text: &str,
    kind: QueryKind,
    max_rows: usize,
) -> Result<Value> {
    let op = build_op(text, kind, max_rows)?;
    tracing::debug!(method = op.name(), "running document operation");
    driver
        .run(uri, op)
        .await
        .map_err(|e| PipelineError::backend(text, e))
}
