// MongoDB adapter over the official driver's pooled client
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{
    ClientOptions, DeleteManyModel, DeleteOneModel, InsertOneModel, ReplaceOneModel,
    UpdateManyModel, UpdateModifications, UpdateOneModel, WriteModel,
};
use mongodb::results::SummaryBulkWriteResult;
use mongodb::{Client, Collection, Namespace};
use std::any::Any;
use std::sync::Arc;

use crate::error::DbError;
use crate::models::{
    BulkWriteAck, ConnectOptions, DeleteAck, FindAndModifyOptions, FindOneOptions, FindOptions,
    InsertManyAck, InsertOneAck, ReturnDocument, UpdateAck, WriteOp,
};
use crate::services::database::adapter::{
    bulk_write_sequential, CollectionHandle, Connection, Connector,
};

/// Opens MongoDB client pools
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

impl MongoConnector {
    /// Translate connect options into driver client options
    async fn client_options(url: &str, options: &ConnectOptions) -> Result<ClientOptions, DbError> {
        let mut client_options = ClientOptions::parse(url)
            .await
            .map_err(|e| DbError::Connection(format!("Invalid MongoDB URL: {}", e)))?;

        client_options.max_pool_size = Some(options.pool_size);
        if let Some(min_pool_size) = options.min_pool_size {
            client_options.min_pool_size = Some(min_pool_size);
        }
        if !options.topology_discovery {
            client_options.direct_connection = Some(true);
        }
        if let Some(app_name) = &options.app_name {
            client_options.app_name = Some(app_name.clone());
        }
        if let Some(timeout) = options.connect_timeout() {
            client_options.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = options.server_selection_timeout() {
            client_options.server_selection_timeout = Some(timeout);
        }

        Ok(client_options)
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn Connection>, DbError> {
        let client_options = Self::client_options(url, options).await?;

        let client = Client::with_options(client_options)
            .map_err(|e| DbError::Connection(format!("Failed to create MongoDB client: {}", e)))?;

        // The driver connects lazily; ping so bad hosts and credentials fail here
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DbError::Connection(format!("Failed to reach MongoDB: {}", e)))?;

        Ok(Arc::new(MongoConnection { client }))
    }
}

/// A pooled MongoDB client
#[derive(Debug, Clone)]
pub struct MongoConnection {
    client: Client,
}

impl MongoConnection {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Connection for MongoConnection {
    fn collection(&self, database: &str, collection: &str) -> Box<dyn CollectionHandle> {
        Box::new(MongoCollection {
            client: self.client.clone(),
            inner: self.client.database(database).collection::<Document>(collection),
        })
    }
}

/// A MongoDB collection of raw documents
#[derive(Debug, Clone)]
pub struct MongoCollection {
    client: Client,
    inner: Collection<Document>,
}

impl MongoCollection {
    /// The driver collection, for operations not covered by [`CollectionHandle`]
    pub fn inner(&self) -> &Collection<Document> {
        &self.inner
    }

    fn write_model(namespace: &Namespace, op: WriteOp) -> WriteModel {
        let namespace = namespace.clone();
        match op {
            WriteOp::InsertOne { document } => InsertOneModel::builder()
                .namespace(namespace)
                .document(document)
                .build()
                .into(),
            WriteOp::UpdateOne { filter, update } => UpdateOneModel::builder()
                .namespace(namespace)
                .filter(filter)
                .update(UpdateModifications::Document(update))
                .build()
                .into(),
            WriteOp::UpdateMany { filter, update } => UpdateManyModel::builder()
                .namespace(namespace)
                .filter(filter)
                .update(UpdateModifications::Document(update))
                .build()
                .into(),
            WriteOp::ReplaceOne { filter, replacement } => ReplaceOneModel::builder()
                .namespace(namespace)
                .filter(filter)
                .replacement(replacement)
                .build()
                .into(),
            WriteOp::DeleteOne { filter } => DeleteOneModel::builder()
                .namespace(namespace)
                .filter(filter)
                .build()
                .into(),
            WriteOp::DeleteMany { filter } => DeleteManyModel::builder()
                .namespace(namespace)
                .filter(filter)
                .build()
                .into(),
        }
    }
}

fn driver_return_document(return_document: ReturnDocument) -> mongodb::options::ReturnDocument {
    match return_document {
        ReturnDocument::Before => mongodb::options::ReturnDocument::Before,
        ReturnDocument::After => mongodb::options::ReturnDocument::After,
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// The server predates the command (client bulk write needs 8.0+)
fn is_incompatible_server(err: &mongodb::error::Error) -> bool {
    matches!(*err.kind, mongodb::error::ErrorKind::IncompatibleServer { .. })
}

/// Aggregate counts reported by a client bulk write
pub(crate) fn summary_ack(summary: &SummaryBulkWriteResult) -> BulkWriteAck {
    BulkWriteAck {
        inserted_count: count(summary.inserted_count),
        matched_count: count(summary.matched_count),
        modified_count: count(summary.modified_count),
        upserted_count: count(summary.upserted_count),
        deleted_count: count(summary.deleted_count),
    }
}

#[async_trait]
impl CollectionHandle for MongoCollection {
    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>, DbError> {
        let limit = options
            .limit
            .map(i64::try_from)
            .transpose()
            .map_err(|_| DbError::InvalidArgument("find limit is out of range".to_string()))?;

        let find_options = mongodb::options::FindOptions::builder()
            .projection(options.projection)
            .sort(options.sort)
            .limit(limit)
            .build();

        let cursor = self.inner.find(filter).with_options(find_options).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>, DbError> {
        let find_options = mongodb::options::FindOneOptions::builder()
            .projection(options.projection)
            .sort(options.sort)
            .build();

        Ok(self.inner.find_one(filter).with_options(find_options).await?)
    }

    async fn insert_one(&self, document: Document) -> Result<InsertOneAck, DbError> {
        let result = self.inner.insert_one(document).await?;
        Ok(InsertOneAck {
            inserted_id: result.inserted_id,
        })
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertManyAck, DbError> {
        let result = self.inner.insert_many(documents).await?;
        Ok(InsertManyAck {
            inserted_ids: result.inserted_ids,
        })
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateAck, DbError> {
        let result = self.inner.update_one(filter, update).await?;
        Ok(UpdateAck {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateAck, DbError> {
        let result = self.inner.update_many(filter, update).await?;
        Ok(UpdateAck {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
    ) -> Result<UpdateAck, DbError> {
        let result = self.inner.replace_one(filter, replacement).await?;
        Ok(UpdateAck {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<DeleteAck, DbError> {
        let result = self.inner.delete_one(filter).await?;
        Ok(DeleteAck {
            deleted_count: result.deleted_count,
        })
    }

    async fn delete_many(&self, filter: Document) -> Result<DeleteAck, DbError> {
        let result = self.inner.delete_many(filter).await?;
        Ok(DeleteAck {
            deleted_count: result.deleted_count,
        })
    }

    async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>, DbError> {
        let replace_options = mongodb::options::FindOneAndReplaceOptions::builder()
            .projection(options.projection)
            .upsert(options.upsert)
            .return_document(driver_return_document(options.return_document))
            .build();

        Ok(self
            .inner
            .find_one_and_replace(filter, replacement)
            .with_options(replace_options)
            .await?)
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>, DbError> {
        let update_options = mongodb::options::FindOneAndUpdateOptions::builder()
            .projection(options.projection)
            .upsert(options.upsert)
            .return_document(driver_return_document(options.return_document))
            .build();

        Ok(self
            .inner
            .find_one_and_update(filter, update)
            .with_options(update_options)
            .await?)
    }

    /// Native client-level bulk write. Servers older than MongoDB 8.0 reject
    /// it, in which case the batch is issued one operation at a time.
    async fn bulk_write(&self, ops: Vec<WriteOp>, ordered: bool) -> Result<BulkWriteAck, DbError> {
        let namespace = self.inner.namespace();
        let models: Vec<WriteModel> = ops
            .iter()
            .cloned()
            .map(|op| Self::write_model(&namespace, op))
            .collect();

        match self.client.bulk_write(models).ordered(ordered).await {
            Ok(result) => Ok(summary_ack(&result)),
            Err(e) if is_incompatible_server(&e) => {
                tracing::debug!("Native bulk write unsupported, running sequentially: {}", e);
                bulk_write_sequential(self, ops, ordered).await
            }
            Err(e) => Err(e.into()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
