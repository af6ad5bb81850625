// Boundary between the cache/facade and the underlying document database client
use async_trait::async_trait;
use mongodb::bson::Document;
use std::any::Any;
use std::sync::Arc;

use crate::error::DbError;
use crate::models::{
    BulkWriteAck, BulkWriteFailure, ConnectOptions, DeleteAck, FindAndModifyOptions,
    FindOneOptions, FindOptions, InsertManyAck, InsertOneAck, UpdateAck, WriteFailure, WriteOp,
};

/// Opens pooled connections to the database service
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new pooled connection.
    /// Failures are reported as `DbError::Connection`.
    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn Connection>, DbError>;
}

/// An established, pooled connection. Safe for concurrent use.
pub trait Connection: Send + Sync {
    /// Resolve a handle to `collection` inside `database`
    fn collection(&self, database: &str, collection: &str) -> Box<dyn CollectionHandle>;
}

/// Document operations against a single collection
#[async_trait]
pub trait CollectionHandle: Send + Sync {
    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>, DbError>;

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>, DbError>;

    async fn insert_one(&self, document: Document) -> Result<InsertOneAck, DbError>;

    async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertManyAck, DbError>;

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateAck, DbError>;

    async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateAck, DbError>;

    async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
    ) -> Result<UpdateAck, DbError>;

    async fn delete_one(&self, filter: Document) -> Result<DeleteAck, DbError>;

    async fn delete_many(&self, filter: Document) -> Result<DeleteAck, DbError>;

    async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>, DbError>;

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>, DbError>;

    /// Execute a batch of writes.
    ///
    /// The provided implementation runs [`bulk_write_sequential`]. Drivers
    /// with a native batch command should override this.
    async fn bulk_write(&self, ops: Vec<WriteOp>, ordered: bool) -> Result<BulkWriteAck, DbError> {
        bulk_write_sequential(self, ops, ordered).await
    }

    /// Access the concrete handle, for operations the trait does not cover
    fn as_any(&self) -> &dyn Any;
}

/// Issue a batch of writes one at a time through the single-document verbs.
/// Ordered batches stop at the first failure; unordered batches run every
/// operation and collect all failures.
pub async fn bulk_write_sequential<H>(
    handle: &H,
    ops: Vec<WriteOp>,
    ordered: bool,
) -> Result<BulkWriteAck, DbError>
where
    H: CollectionHandle + ?Sized,
{
    let mut ack = BulkWriteAck::default();
    let mut errors = Vec::new();

    for (index, op) in ops.into_iter().enumerate() {
        let outcome = match op {
            WriteOp::InsertOne { document } => {
                handle.insert_one(document).await.map(|_| ack.record_insert())
            }
            WriteOp::UpdateOne { filter, update } => handle
                .update_one(filter, update)
                .await
                .map(|result| ack.record_update(&result)),
            WriteOp::UpdateMany { filter, update } => handle
                .update_many(filter, update)
                .await
                .map(|result| ack.record_update(&result)),
            WriteOp::ReplaceOne { filter, replacement } => handle
                .replace_one(filter, replacement)
                .await
                .map(|result| ack.record_update(&result)),
            WriteOp::DeleteOne { filter } => handle
                .delete_one(filter)
                .await
                .map(|result| ack.record_delete(&result)),
            WriteOp::DeleteMany { filter } => handle
                .delete_many(filter)
                .await
                .map(|result| ack.record_delete(&result)),
        };

        if let Err(err) = outcome {
            errors.push(WriteFailure {
                index,
                message: err.to_string(),
            });
            if ordered {
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(ack)
    } else {
        Err(DbError::BulkWrite(BulkWriteFailure {
            partial: ack,
            errors,
        }))
    }
}
