use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::{Client, Cursor, Database};
use serde_json::{json, Value};

use super::{DocumentDriver, DocumentOp};

/// MongoDB through the official async driver.
pub struct MongoDriver;

#[async_trait]
impl DocumentDriver for MongoDriver {
    async fn run(&self, uri: &str, op: DocumentOp) -> Result<Value> {
        let client = Client::with_uri_str(uri)
            .await
            .context("Failed to connect to MongoDB")?;
        let result = match client.default_database() {
            Some(db) => run_op(&db, op).await,
            None => Err(anyhow!("connection URI does not name a database: {}", uri)),
        };
        client.shutdown().await;
        tracing::debug!("mongodb disconnected");
        result
    }
}

async fn run_op(db: &Database, op: DocumentOp) -> Result<Value> {
    db.run_command(doc! { "ping": 1 }, None)
        .await
        .context("MongoDB ping failed")?;

    match op {
        DocumentOp::Find {
            collection,
            filter,
            projection,
            sort,
            limit,
            max_rows,
        } => {
            let mut options = FindOptions::default();
            options.projection = projection;
            options.sort = sort;
            options.limit = limit;
            let cursor = db
                .collection::<Document>(&collection)
                .find(filter, options)
                .await?;
            drain(cursor, max_rows).await
        }
        DocumentOp::FindOne {
            collection,
            filter,
            projection,
        } => {
            let mut options = FindOneOptions::default();
            options.projection = projection;
            let found = db
                .collection::<Document>(&collection)
                .find_one(filter, options)
                .await?;
            match found {
                Some(document) => Ok(bson_to_json(Bson::Document(document))),
                None => Err(anyhow!("no document matched")),
            }
        }
        DocumentOp::Aggregate {
            collection,
            pipeline,
            max_rows,
        } => {
            let cursor = db
                .collection::<Document>(&collection)
                .aggregate(pipeline, None)
                .await?;
            drain(cursor, max_rows).await
        }
        DocumentOp::Distinct {
            collection,
            field,
            filter,
        } => {
            let values = db
                .collection::<Document>(&collection)
                .distinct(&field, filter, None)
                .await?;
            Ok(Value::Array(values.into_iter().map(bson_to_json).collect()))
        }
        DocumentOp::Count { collection, filter } => {
            let count = db
                .collection::<Document>(&collection)
                .count_documents(filter, None)
                .await?;
            Ok(json!(count))
        }
        DocumentOp::EstimatedCount { collection } => {
            let count = db
                .collection::<Document>(&collection)
                .estimated_document_count(None)
                .await?;
            Ok(json!(count))
        }
        DocumentOp::ListCollections => {
            let names = db.list_collection_names(None).await?;
            Ok(json!(names))
        }
        DocumentOp::InsertOne {
            collection,
            document,
        } => {
            let result = db
                .collection::<Document>(&collection)
                .insert_one(document, None)
                .await?;
            Ok(json!({ "inserted_id": bson_to_json(result.inserted_id) }))
        }
        DocumentOp::InsertMany {
            collection,
            documents,
        } => {
            let result = db
                .collection::<Document>(&collection)
                .insert_many(documents, None)
                .await?;
            let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
            ids.sort_by_key(|(index, _)| *index);
            let ids: Vec<Value> = ids.into_iter().map(|(_, id)| bson_to_json(id)).collect();
            Ok(json!({ "inserted_ids": ids }))
        }
        DocumentOp::UpdateOne {
            collection,
            filter,
            update,
        } => {
            let result = db
                .collection::<Document>(&collection)
                .update_one(filter, update, None)
                .await?;
            Ok(update_summary(
                result.matched_count,
                result.modified_count,
                result.upserted_id,
            ))
        }
        DocumentOp::UpdateMany {
            collection,
            filter,
            update,
        } => {
            let result = db
                .collection::<Document>(&collection)
                .update_many(filter, update, None)
                .await?;
            Ok(update_summary(
                result.matched_count,
                result.modified_count,
                result.upserted_id,
            ))
        }
        DocumentOp::DeleteOne { collection, filter } => {
            let result = db
                .collection::<Document>(&collection)
                .delete_one(filter, None)
                .await?;
            Ok(json!({ "deleted_count": result.deleted_count }))
        }
        DocumentOp::DeleteMany { collection, filter } => {
            let result = db
                .collection::<Document>(&collection)
                .delete_many(filter, None)
                .await?;
            Ok(json!({ "deleted_count": result.deleted_count }))
        }
    }
}

/// Reads at most `max_rows` documents; the rest of the cursor is dropped.
async fn drain(mut cursor: Cursor<Document>, max_rows: usize) -> Result<Value> {
    let mut documents = Vec::new();
    while documents.len() < max_rows {
        match cursor.try_next().await? {
            Some(document) => documents.push(bson_to_json(Bson::Document(document))),
            None => break,
        }
    }
    Ok(Value::Array(documents))
}

fn update_summary(matched: u64, modified: u64, upserted_id: Option<Bson>) -> Value {
    let upserted_count = u64::from(upserted_id.is_some());
    json!({
        "matched_count": matched,
        "modified_count": modified,
        "upserted_count": upserted_count,
        "upserted_id": upserted_id.map(bson_to_json),
    })
}

/// ObjectIds become their hex string; everything else uses relaxed extended
/// JSON.
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(k, v)| (k, bson_to_json(v)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}
