use crate::error::{PipelineError, Result};
use crate::registry::Registry;

use super::stage::{classify_uri, QueryStage, TRANSFORM_LABEL};

/// Ordered, non-empty list of stages. Insertion order is execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<QueryStage>,
}

impl Pipeline {
    pub fn new(stages: Vec<QueryStage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[QueryStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn into_stages(self) -> Vec<QueryStage> {
        self.stages
    }
}

/// Splits `line` into `(label, rest)` when it opens a new stage.
///
/// A boundary is a run of non-whitespace characters without `>` at the start
/// of the line, followed by `>` and then whitespace or the end of the line.
pub fn split_boundary(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    let gt = trimmed.find(|c: char| c == '>' || c.is_whitespace())?;
    if gt == 0 || !trimmed[gt..].starts_with('>') {
        return None;
    }
    let rest = &trimmed[gt + 1..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((&trimmed[..gt], rest))
}

fn is_skipped(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("//")
}

struct PendingStage {
    label: String,
    uri: String,
    text: String,
}

/// Parses an input that may span several lines.
pub fn parse_input(input: &str, registry: &Registry) -> Result<Pipeline> {
    let lines: Vec<&str> = input.lines().collect();
    parse_lines(&lines, registry)
}

pub fn parse_lines<S: AsRef<str>>(lines: &[S], registry: &Registry) -> Result<Pipeline> {
    let mut stages = Vec::new();
    let mut pending: Option<PendingStage> = None;

    for line in lines.iter().map(|l| l.as_ref()) {
        if is_skipped(line) {
            continue;
        }

        match split_boundary(line) {
            Some((label, rest)) => {
                let uri = resolve_label(label, registry)?;
                let text = rest.trim();
                if text.is_empty() {
                    return Err(PipelineError::EmptyQuery);
                }
                if let Some(done) = pending.take() {
                    stages.push(finish(done)?);
                }
                pending = Some(PendingStage {
                    label: label.to_string(),
                    uri,
                    text: text.to_string(),
                });
            }
            None => match pending.as_mut() {
                Some(stage) => {
                    stage.text.push(' ');
                    stage.text.push_str(line.trim());
                }
                None => tracing::debug!(line, "ignoring text before the first stage"),
            },
        }
    }

    if let Some(done) = pending.take() {
        stages.push(finish(done)?);
    }

    tracing::debug!(stages = stages.len(), "parsed pipeline");
    Pipeline::new(stages)
}

fn resolve_label(label: &str, registry: &Registry) -> Result<String> {
    if label == TRANSFORM_LABEL {
        return Ok(String::new());
    }
    registry
        .lookup(label)
        .map(str::to_string)
        .ok_or_else(|| PipelineError::UnknownConnection(label.to_string()))
}

fn finish(stage: PendingStage) -> Result<QueryStage> {
    if stage.label == TRANSFORM_LABEL {
        return Ok(QueryStage::transform(stage.text));
    }
    let conn_type = classify_uri(&stage.uri)?;
    Ok(QueryStage::new(stage.uri, conn_type, stage.text))
}
