// In-memory stand-in for the database client, used by unit tests
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::DbError;
use crate::models::{
    ConnectOptions, DeleteAck, FindAndModifyOptions, FindOneOptions, FindOptions, InsertManyAck,
    InsertOneAck, UpdateAck,
};
use crate::services::database::adapter::{CollectionHandle, Connection, Connector};

/// Any document argument carrying this key makes the stub operation fail
pub const FAIL_KEY: &str = "$fail";

/// One operation received by a stub collection
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub database: String,
    pub collection: String,
    pub verb: &'static str,
    pub args: Vec<Document>,
}

/// State shared by every connection a [`StubConnector`] opens
#[derive(Debug, Default)]
pub struct StubBackend {
    documents: Mutex<Vec<Document>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubBackend {
    /// Documents returned by `find` and (first one) by `find_one`
    pub fn set_documents(&self, documents: Vec<Document>) {
        *self.documents.lock().unwrap() = documents;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn verbs(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|call| call.verb).collect()
    }
}

/// Connector that counts attempts and can fail or stall on demand
#[derive(Debug, Default)]
pub struct StubConnector {
    attempts: AtomicUsize,
    failures_remaining: AtomicUsize,
    delay: Duration,
    backend: Arc<StubBackend>,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `failures` connection attempts
    pub fn failing(failures: usize) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    /// Take `delay` to establish each connection
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> Arc<StubBackend> {
        Arc::clone(&self.backend)
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(
        &self,
        _url: &str,
        _options: &ConnectOptions,
    ) -> Result<Arc<dyn Connection>, DbError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(DbError::Connection(format!(
                "simulated connection failure (attempt {})",
                attempt
            )));
        }

        Ok(Arc::new(StubConnection {
            backend: Arc::clone(&self.backend),
        }))
    }
}

#[derive(Debug)]
pub struct StubConnection {
    backend: Arc<StubBackend>,
}

impl Connection for StubConnection {
    fn collection(&self, database: &str, collection: &str) -> Box<dyn CollectionHandle> {
        Box::new(StubCollection {
            database: database.to_string(),
            collection: collection.to_string(),
            backend: Arc::clone(&self.backend),
        })
    }
}

#[derive(Debug)]
pub struct StubCollection {
    pub database: String,
    pub collection: String,
    backend: Arc<StubBackend>,
}

impl StubCollection {
    /// Record the call, then fail if any argument asks for it
    fn record(&self, verb: &'static str, args: Vec<Document>) -> Result<(), DbError> {
        let fails = args.iter().any(|doc| doc.contains_key(FAIL_KEY));
        self.backend.calls.lock().unwrap().push(RecordedCall {
            database: self.database.clone(),
            collection: self.collection.clone(),
            verb,
            args,
        });

        if fails {
            return Err(DbError::Operation(format!("simulated {} failure", verb)));
        }
        Ok(())
    }

    fn documents(&self) -> Vec<Document> {
        self.backend.documents.lock().unwrap().clone()
    }

    fn single_update() -> UpdateAck {
        UpdateAck {
            matched_count: 1,
            modified_count: 1,
            upserted_id: None,
        }
    }
}

#[async_trait]
impl CollectionHandle for StubCollection {
    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>, DbError> {
        let mut args = vec![filter];
        args.extend(options.projection);
        args.extend(options.sort);
        self.record("find", args)?;

        let mut documents = self.documents();
        if let Some(limit) = options.limit {
            documents.truncate(limit as usize);
        }
        Ok(documents)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>, DbError> {
        let mut args = vec![filter];
        args.extend(options.projection);
        self.record("findOne", args)?;
        Ok(self.documents().into_iter().next())
    }

    async fn insert_one(&self, document: Document) -> Result<InsertOneAck, DbError> {
        self.record("insertOne", vec![document])?;
        Ok(InsertOneAck {
            inserted_id: Bson::Int32(1),
        })
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertManyAck, DbError> {
        let inserted_ids: HashMap<usize, Bson> = (0..documents.len())
            .map(|index| (index, Bson::Int64(index as i64 + 1)))
            .collect();
        self.record("insertMany", documents)?;
        Ok(InsertManyAck { inserted_ids })
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateAck, DbError> {
        self.record("updateOne", vec![filter, update])?;
        Ok(Self::single_update())
    }

    async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateAck, DbError> {
        self.record("updateMany", vec![filter, update])?;
        Ok(UpdateAck {
            matched_count: 2,
            modified_count: 2,
            upserted_id: None,
        })
    }

    async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
    ) -> Result<UpdateAck, DbError> {
        self.record("replaceOne", vec![filter, replacement])?;
        Ok(Self::single_update())
    }

    async fn delete_one(&self, filter: Document) -> Result<DeleteAck, DbError> {
        self.record("deleteOne", vec![filter])?;
        Ok(DeleteAck { deleted_count: 1 })
    }

    async fn delete_many(&self, filter: Document) -> Result<DeleteAck, DbError> {
        self.record("deleteMany", vec![filter])?;
        Ok(DeleteAck { deleted_count: 2 })
    }

    async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>, DbError> {
        let verb = if options.upsert {
            "findOneAndReplace(upsert)"
        } else {
            "findOneAndReplace"
        };
        self.record(verb, vec![filter, replacement.clone()])?;
        Ok(Some(replacement))
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        _options: FindAndModifyOptions,
    ) -> Result<Option<Document>, DbError> {
        self.record("findOneAndUpdate", vec![filter, update])?;
        Ok(self.documents().into_iter().next())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
