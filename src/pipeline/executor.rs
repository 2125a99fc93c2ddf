use serde_json::Value;
use std::time::Instant;

use crate::adapters;
use crate::config::Settings;
use crate::db::Drivers;
use crate::error::{PipelineError, Result};

use super::parser::Pipeline;
use super::piper::pipe_data;
use super::stage::{ConnType, QueryKind};

/// What one stage did, kept for the debug trace.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub index: usize,
    pub conn_type: ConnType,
    pub uri: String,
    /// Query text after placeholder substitution.
    pub query: String,
    pub kind: QueryKind,
    pub elapsed_ms: u128,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    /// The final stage's JSON, empty when it produced nothing.
    pub payload: Vec<u8>,
    pub records: Vec<StageRecord>,
}

/// Serialises a stage result. `null` and `[]` count as no output.
pub fn encode_payload(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        other => serde_json::to_vec(other).map_err(|e| PipelineError::InvalidJSON(e.to_string())),
    }
}

/// Runs a pipeline's stages strictly in order, feeding each stage the output
/// of the one before it.
pub struct Executor<'a> {
    drivers: &'a Drivers,
    settings: &'a Settings,
}

impl<'a> Executor<'a> {
    pub fn new(drivers: &'a Drivers, settings: &'a Settings) -> Self {
        Self { drivers, settings }
    }

    pub async fn run(&self, pipeline: Pipeline) -> Result<RunOutcome> {
        let mut previous: Vec<u8> = Vec::new();
        let mut records = Vec::with_capacity(pipeline.len());

        for (index, mut stage) in pipeline.into_stages().into_iter().enumerate() {
            if index > 0 && previous.is_empty() {
                return Err(PipelineError::NoArgumentsForPipeline(index));
            }

            let started = Instant::now();
            if index > 0 && stage.conn_type != ConnType::LocalTransform {
                stage.text = pipe_data(&stage.text, &previous)?;
            }

            let kind = adapters::classify(&stage)?;
            tracing::info!(
                stage = index,
                connection_type = %stage.conn_type,
                kind = %kind,
                "running stage"
            );

            let value = adapters::execute(
                &stage,
                kind,
                &previous,
                self.drivers,
                self.settings.max_row_limit,
            )
            .await?;
            let payload = encode_payload(&value)?;

            records.push(StageRecord {
                index,
                conn_type: stage.conn_type,
                uri: stage.redacted_uri(),
                query: stage.text,
                kind,
                elapsed_ms: started.elapsed().as_millis(),
                payload: payload.clone(),
            });
            previous = payload;
        }

        Ok(RunOutcome {
            payload: previous,
            records,
        })
    }
}
