//! Network backends. Each driver opens its own connection per call and tears
//! it down before returning.

mod mongo;
mod postgres;
mod redis;

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::Document;
use serde_json::Value;

pub use self::mongo::{bson_to_json, MongoDriver};
pub use self::postgres::{PgFailure, PostgresDriver};
pub use self::redis::{reply_to_json, RedisDriver};

/// Rows as the server sent them over the simple-query protocol: every cell is
/// text, `None` for SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[async_trait]
pub trait SqlDriver: Send + Sync {
    async fn query(&self, uri: &str, sql: &str) -> Result<TextRows>;
    /// Runs a statement and returns the number of rows it touched.
    async fn execute(&self, uri: &str, sql: &str) -> Result<u64>;
}

/// One document-store operation, fully parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOp {
    Find {
        collection: String,
        filter: Document,
        projection: Option<Document>,
        sort: Option<Document>,
        limit: Option<i64>,
        max_rows: usize,
    },
    FindOne {
        collection: String,
        filter: Document,
        projection: Option<Document>,
    },
    Aggregate {
        collection: String,
        pipeline: Vec<Document>,
        max_rows: usize,
    },
    Distinct {
        collection: String,
        field: String,
        filter: Document,
    },
    Count {
        collection: String,
        filter: Document,
    },
    EstimatedCount {
        collection: String,
    },
    ListCollections,
    InsertOne {
        collection: String,
        document: Document,
    },
    InsertMany {
        collection: String,
        documents: Vec<Document>,
    },
    UpdateOne {
        collection: String,
        filter: Document,
        update: Document,
    },
    UpdateMany {
        collection: String,
        filter: Document,
        update: Document,
    },
    DeleteOne {
        collection: String,
        filter: Document,
    },
    DeleteMany {
        collection: String,
        filter: Document,
    },
}

impl DocumentOp {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentOp::Find { .. } => "find",
            DocumentOp::FindOne { .. } => "findOne",
            DocumentOp::Aggregate { .. } => "aggregate",
            DocumentOp::Distinct { .. } => "distinct",
            DocumentOp::Count { .. } => "count",
            DocumentOp::EstimatedCount { .. } => "estimatedDocumentCount",
            DocumentOp::ListCollections => "show collections",
            DocumentOp::InsertOne { .. } => "insertOne",
            DocumentOp::InsertMany { .. } => "insertMany",
            DocumentOp::UpdateOne { .. } => "updateOne",
            DocumentOp::UpdateMany { .. } => "updateMany",
            DocumentOp::DeleteOne { .. } => "deleteOne",
            DocumentOp::DeleteMany { .. } => "deleteMany",
        }
    }
}

#[async_trait]
pub trait DocumentDriver: Send + Sync {
    /// Runs `op` against the database named in `uri` and returns its result as
    /// JSON.
    async fn run(&self, uri: &str, op: DocumentOp) -> Result<Value>;
}

#[async_trait]
pub trait KeyValueDriver: Send + Sync {
    async fn command(&self, uri: &str, name: &str, args: &[String]) -> Result<Value>;
}

/// The drivers a pipeline run can reach.
pub struct Drivers {
    pub sql: Box<dyn SqlDriver>,
    pub document: Box<dyn DocumentDriver>,
    pub key_value: Box<dyn KeyValueDriver>,
}

impl Drivers {
    pub fn native() -> Self {
        Self {
            sql: Box::new(PostgresDriver),
            document: Box::new(MongoDriver),
            key_value: Box::new(RedisDriver),
        }
    }
}
