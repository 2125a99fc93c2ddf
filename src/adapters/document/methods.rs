//! Method tables mapping shell method names to driver operations.

use mongodb::bson::Document;

use super::call::{CursorCall, ShellCall};
use super::extjson::{parse_document, parse_document_array, parse_string};
use super::split::split_args;
use crate::db::DocumentOp;
use crate::error::{PipelineError, Result};

type Builder = fn(&ShellCall, usize) -> Result<DocumentOp>;

pub static READ_METHODS: &[(&str, Builder)] = &[
    ("find", build_find),
    ("findOne", build_find_one),
    ("aggregate", build_aggregate),
    ("distinct", build_distinct),
    ("count", build_count),
    ("estimatedDocumentCount", build_estimated_count),
];

pub static WRITE_METHODS: &[(&str, Builder)] = &[
    ("insertOne", build_insert_one),
    ("insertMany", build_insert_many),
    ("updateOne", build_update_one),
    ("updateMany", build_update_many),
    ("deleteOne", build_delete_one),
    ("deleteMany", build_delete_many),
];

pub fn lookup(table: &[(&str, Builder)], method: &str) -> Option<Builder> {
    table
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, builder)| *builder)
}

fn args(call: &ShellCall) -> Result<Vec<String>> {
    if call.args.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_args(&call.args)
}

fn required<'a>(call: &ShellCall, args: &'a [String], index: usize) -> Result<&'a str> {
    args.get(index).map(String::as_str).ok_or_else(|| {
        PipelineError::ParseError(format!(
            "{} expects at least {} argument(s)",
            call.method,
            index + 1
        ))
    })
}

fn optional_document(args: &[String], index: usize) -> Result<Option<Document>> {
    args.get(index).map(|arg| parse_document(arg)).transpose()
}

fn filter_or_empty(args: &[String]) -> Result<Document> {
    Ok(optional_document(args, 0)?.unwrap_or_default())
}

fn reject_cursor(call: &ShellCall) -> Result<()> {
    if call.cursor.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::ParseError(format!(
            "cursor options are only supported after find, not {}",
            call.method
        )))
    }
}

/// Sort and limit collected from a `find` cursor chain, applied in order.
#[derive(Debug, Default, PartialEq)]
struct CursorOptions {
    sort: Option<Document>,
    limit: Option<i64>,
}

fn cursor_options(chain: &[CursorCall]) -> Result<CursorOptions> {
    let mut options = CursorOptions::default();
    for call in chain {
        match call.name.as_str() {
            "sort" => options.sort = Some(parse_document(&call.arg)?),
            "limit" => {
                let limit = call.arg.trim().parse::<i64>().map_err(|e| {
                    PipelineError::ParseError(format!(
                        "Failed to parse param {} to int: {}",
                        call.arg, e
                    ))
                })?;
                options.limit = Some(limit);
            }
            other => {
                return Err(PipelineError::UnsupportedMethod(format!(
                    "cursor option {}",
                    other
                )))
            }
        }
    }
    Ok(options)
}

fn build_find(call: &ShellCall, max_rows: usize) -> Result<DocumentOp> {
    let args = args(call)?;
    let options = cursor_options(&call.cursor)?;
    Ok(DocumentOp::Find {
        collection: call.collection.clone(),
        filter: filter_or_empty(&args)?,
        projection: optional_document(&args, 1)?,
        sort: options.sort,
        limit: options.limit,
        max_rows,
    })
}

fn build_find_one(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::FindOne {
        collection: call.collection.clone(),
        filter: filter_or_empty(&args)?,
        projection: optional_document(&args, 1)?,
    })
}

fn build_aggregate(call: &ShellCall, max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::Aggregate {
        collection: call.collection.clone(),
        pipeline: parse_document_array(required(call, &args, 0)?)?,
        max_rows,
    })
}

fn build_distinct(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::Distinct {
        collection: call.collection.clone(),
        field: parse_string(required(call, &args, 0)?),
        filter: optional_document(&args, 1)?.unwrap_or_default(),
    })
}

fn build_count(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::Count {
        collection: call.collection.clone(),
        filter: filter_or_empty(&args)?,
    })
}

fn build_estimated_count(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    Ok(DocumentOp::EstimatedCount {
        collection: call.collection.clone(),
    })
}

fn build_insert_one(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::InsertOne {
        collection: call.collection.clone(),
        document: parse_document(required(call, &args, 0)?)?,
    })
}

fn build_insert_many(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::InsertMany {
        collection: call.collection.clone(),
        documents: parse_document_array(required(call, &args, 0)?)?,
    })
}

fn filter_and_update(call: &ShellCall) -> Result<(Document, Document)> {
    reject_cursor(call)?;
    let args = args(call)?;
    let filter = parse_document(required(call, &args, 0)?)?;
    let update = parse_document(required(call, &args, 1)?)?;
    Ok((filter, update))
}

fn build_update_one(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    let (filter, update) = filter_and_update(call)?;
    Ok(DocumentOp::UpdateOne {
        collection: call.collection.clone(),
        filter,
        update,
    })
}

fn build_update_many(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    let (filter, update) = filter_and_update(call)?;
    Ok(DocumentOp::UpdateMany {
        collection: call.collection.clone(),
        filter,
        update,
    })
}

fn build_delete_one(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::DeleteOne {
        collection: call.collection.clone(),
        filter: parse_document(required(call, &args, 0)?)?,
    })
}

fn build_delete_many(call: &ShellCall, _max_rows: usize) -> Result<DocumentOp> {
    reject_cursor(call)?;
    let args = args(call)?;
    Ok(DocumentOp::DeleteMany {
        collection: call.collection.clone(),
        filter: parse_document(required(call, &args, 0)?)?,
    })
}
