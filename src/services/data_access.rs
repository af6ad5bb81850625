use mongodb::bson::Document;
use std::sync::Arc;

use crate::error::DbError;
use crate::models::{
    BulkWriteAck, ConnectionConfig, DeleteAck, FindAndModifyOptions, FindOneOptions, FindOptions,
    InsertManyAck, InsertOneAck, ReturnDocument, UpdateAck, WriteOp,
};
use crate::services::connection_pool::ConnectionPoolCache;
use crate::services::database::{CollectionHandle, Connection, Connector, MongoConnector};

/// Document database access keyed by database and collection name.
///
/// Every operation acquires the pooled connection for `database` from the
/// shared [`ConnectionPoolCache`], resolves the collection and relays the
/// outcome unchanged. Cloning is cheap and shares the cache.
#[derive(Clone)]
pub struct DocumentDb {
    cache: Arc<ConnectionPoolCache>,
}

impl DocumentDb {
    pub fn new(cache: Arc<ConnectionPoolCache>) -> Self {
        Self { cache }
    }

    pub fn with_connector(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self::new(Arc::new(ConnectionPoolCache::new(config, connector)))
    }

    /// Facade over MongoDB
    pub fn mongo(config: ConnectionConfig) -> Self {
        Self::with_connector(config, Arc::new(MongoConnector))
    }

    pub fn cache(&self) -> &ConnectionPoolCache {
        &self.cache
    }

    /// Get the pooled connection for `database`, opening it on first use
    pub async fn connection(&self, database: &str) -> Result<Arc<dyn Connection>, DbError> {
        self.cache.acquire(database).await
    }

    /// Raw collection handle, for operations not covered below
    pub async fn collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Box<dyn CollectionHandle>, DbError> {
        DbError::require_name(collection, "collection name")?;
        let connection = self.cache.acquire(database).await?;
        Ok(connection.collection(database, collection))
    }

    pub async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, DbError> {
        self.collection(database, collection).await?.find(filter, options).await
    }

    /// Returns `None` when nothing matches
    pub async fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>, DbError> {
        self.collection(database, collection).await?.find_one(filter, options).await
    }

    pub async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> Result<InsertOneAck, DbError> {
        self.collection(database, collection).await?.insert_one(document).await
    }

    pub async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<InsertManyAck, DbError> {
        self.collection(database, collection).await?.insert_many(documents).await
    }

    /// Replace the first match, inserting `replacement` when nothing matches.
    /// Returns the stored document.
    pub async fn upsert(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<Option<Document>, DbError> {
        let options = FindAndModifyOptions {
            projection: None,
            upsert: true,
            return_document: ReturnDocument::After,
        };
        self.collection(database, collection)
            .await?
            .find_one_and_replace(filter, replacement, options)
            .await
    }

    pub async fn update_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateAck, DbError> {
        self.collection(database, collection).await?.update_one(filter, update).await
    }

    pub async fn update_many(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateAck, DbError> {
        self.collection(database, collection).await?.update_many(filter, update).await
    }

    pub async fn delete_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<DeleteAck, DbError> {
        self.collection(database, collection).await?.delete_one(filter).await
    }

    /// Alias of [`DocumentDb::delete_one`]
    pub async fn remove_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<DeleteAck, DbError> {
        self.delete_one(database, collection, filter).await
    }

    pub async fn delete_many(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<DeleteAck, DbError> {
        self.collection(database, collection).await?.delete_many(filter).await
    }

    /// Alias of [`DocumentDb::delete_many`]
    pub async fn remove_many(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<DeleteAck, DbError> {
        self.delete_many(database, collection, filter).await
    }

    /// Replace the first match. Never inserts.
    pub async fn replace_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<UpdateAck, DbError> {
        self.collection(database, collection)
            .await?
            .replace_one(filter, replacement)
            .await
    }

    pub async fn find_one_and_update(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>, DbError> {
        self.collection(database, collection)
            .await?
            .find_one_and_update(filter, update, options)
            .await
    }

    /// Run a batch of writes. Ordered batches stop at the first failure.
    ///
    /// Over MongoDB this uses the native client bulk write, which needs
    /// MongoDB 8.0+. Older servers get the operations issued one at a time.
    pub async fn bulk_write(
        &self,
        database: &str,
        collection: &str,
        ops: Vec<WriteOp>,
        ordered: bool,
    ) -> Result<BulkWriteAck, DbError> {
        if ops.is_empty() {
            return Err(DbError::InvalidArgument(
                "bulk write requires at least one operation".to_string(),
            ));
        }
        self.collection(database, collection).await?.bulk_write(ops, ordered).await
    }
}
