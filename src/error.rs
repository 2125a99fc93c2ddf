use thiserror::Error;

/// Everything that can abort a pipeline run. The first failure wins; nothing
/// retries.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("Connection key '{0}' not found.")]
    UnknownConnection(String),

    #[error("No query on the right hand side of connection.")]
    EmptyQuery,

    #[error("no pipeline stages found in input")]
    NoStages,

    #[error("stage {0} expects input from the previous stage, but it returned nothing")]
    NoArgumentsForPipeline(usize),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid JSON: {0}")]
    InvalidJSON(String),

    #[error("query evaluation error: {0}")]
    QueryEvalError(String),

    #[error("unknown connection type for URI '{0}'")]
    UnknownConnectionType(String),

    #[error("invalid option '{0}'")]
    InvalidOption(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Wraps a driver failure together with the query text that triggered it.
    pub fn backend(context: impl Into<String>, err: anyhow::Error) -> Self {
        PipelineError::Backend {
            context: context.into(),
            source: err.into(),
        }
    }
}
