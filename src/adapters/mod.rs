//! One adapter per backend family. Each turns a stage's text into a JSON value.

pub mod document;
pub mod key_value;
pub mod relational;
pub mod transform;

use serde_json::Value;

use crate::db::Drivers;
use crate::error::{PipelineError, Result};
use crate::pipeline::{ConnType, QueryKind, QueryStage};

pub fn classify(stage: &QueryStage) -> Result<QueryKind> {
    match stage.conn_type {
        ConnType::Relational => Ok(relational::classify(&stage.text)),
        ConnType::DocumentStore => document::classify(&stage.text)
            .ok_or_else(|| PipelineError::UnsupportedMethod(stage.text.clone())),
        ConnType::KeyValue => Ok(QueryKind::Command),
        ConnType::LocalTransform => Ok(QueryKind::Read),
    }
}

/// Runs `stage` on its backend. `previous` is the prior stage's raw payload,
/// used only by the local transform.
pub async fn execute(
    stage: &QueryStage,
    kind: QueryKind,
    previous: &[u8],
    drivers: &Drivers,
    max_rows: usize,
) -> Result<Value> {
    match stage.conn_type {
        ConnType::Relational => {
            relational::execute(drivers.sql.as_ref(), &stage.uri, &stage.text, kind, max_rows).await
        }
        ConnType::DocumentStore => {
            document::execute(
                drivers.document.as_ref(),
                &stage.uri,
                &stage.text,
                kind,
                max_rows,
            )
            .await
        }
        ConnType::KeyValue => {
            key_value::execute(drivers.key_value.as_ref(), &stage.uri, &stage.text).await
        }
        ConnType::LocalTransform => transform::execute(&stage.text, previous),
    }
}
