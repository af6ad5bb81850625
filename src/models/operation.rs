// Inputs and acknowledgments of the document operations
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::DbError;

/// Options for `find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn projection(projection: Document) -> Self {
        Self {
            projection: Some(projection),
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for `find_one`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

/// Which version of the document a find-and-modify call hands back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

/// Options for the find-and-modify verbs (`find_one_and_update`, `find_one_and_replace`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyOptions {
    pub projection: Option<Document>,
    pub upsert: bool,
    pub return_document: ReturnDocument,
}

/// One write inside a bulk write batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    InsertOne { document: Document },
    UpdateOne { filter: Document, update: Document },
    UpdateMany { filter: Document, update: Document },
    ReplaceOne { filter: Document, replacement: Document },
    DeleteOne { filter: Document },
    DeleteMany { filter: Document },
}

impl WriteOp {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::InsertOne { .. } => "insertOne",
            WriteOp::UpdateOne { .. } => "updateOne",
            WriteOp::UpdateMany { .. } => "updateMany",
            WriteOp::ReplaceOne { .. } => "replaceOne",
            WriteOp::DeleteOne { .. } => "deleteOne",
            WriteOp::DeleteMany { .. } => "deleteMany",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOneAck {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertManyAck {
    /// Generated identifiers keyed by the position of the input document
    pub inserted_ids: HashMap<usize, Bson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAck {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteAck {
    pub deleted_count: u64,
}

/// Aggregate acknowledgment of a bulk write
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteAck {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub deleted_count: u64,
}

impl BulkWriteAck {
    pub fn record_insert(&mut self) {
        self.inserted_count += 1;
    }

    pub fn record_update(&mut self, ack: &UpdateAck) {
        self.matched_count += ack.matched_count;
        self.modified_count += ack.modified_count;
        if ack.upserted_id.is_some() {
            self.upserted_count += 1;
        }
    }

    pub fn record_delete(&mut self, ack: &DeleteAck) {
        self.deleted_count += ack.deleted_count;
    }
}

/// A single failed operation of a bulk write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteFailure {
    /// Position of the operation in the submitted batch
    pub index: usize,
    pub message: String,
}

/// Outcome of a bulk write in which at least one operation failed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteFailure {
    /// Work that did complete before or besides the failures
    pub partial: BulkWriteAck,
    pub errors: Vec<WriteFailure>,
}

impl BulkWriteFailure {
    pub fn failed_indexes(&self) -> Vec<usize> {
        self.errors.iter().map(|e| e.index).collect()
    }
}

impl fmt::Display for BulkWriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) => write!(
                f,
                "{} operation(s) failed, first at index {}: {}",
                self.errors.len(),
                first.index,
                first.message
            ),
            None => write!(f, "bulk write failed"),
        }
    }
}

/// Parse a hex string into an `ObjectId`
pub fn parse_object_id(hex: &str) -> Result<ObjectId, DbError> {
    ObjectId::parse_str(hex)
        .map_err(|e| DbError::InvalidArgument(format!("Invalid ObjectId '{}': {}", hex, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_find_options_builder() {
        let options = FindOptions::projection(doc! { "password": 0 })
            .with_sort(doc! { "name": 1 })
            .with_limit(10);
        assert_eq!(options.projection, Some(doc! { "password": 0 }));
        assert_eq!(options.sort, Some(doc! { "name": 1 }));
        assert_eq!(options.limit, Some(10));
    }

    #[test]
    fn test_bulk_ack_accumulation() {
        let mut ack = BulkWriteAck::default();
        ack.record_insert();
        ack.record_update(&UpdateAck {
            matched_count: 2,
            modified_count: 1,
            upserted_id: None,
        });
        ack.record_update(&UpdateAck {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(Bson::Int32(7)),
        });
        ack.record_delete(&DeleteAck { deleted_count: 3 });

        assert_eq!(ack.inserted_count, 1);
        assert_eq!(ack.matched_count, 2);
        assert_eq!(ack.modified_count, 1);
        assert_eq!(ack.upserted_count, 1);
        assert_eq!(ack.deleted_count, 3);
    }

    #[test]
    fn test_bulk_failure_display() {
        let failure = BulkWriteFailure {
            partial: BulkWriteAck::default(),
            errors: vec![WriteFailure {
                index: 1,
                message: "duplicate key".to_string(),
            }],
        };
        assert_eq!(failure.failed_indexes(), vec![1]);
        assert!(failure.to_string().contains("index 1: duplicate key"));
    }

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex()).unwrap(), id);
        assert!(matches!(
            parse_object_id("not-an-id"),
            Err(DbError::InvalidArgument(_))
        ));
    }
}
